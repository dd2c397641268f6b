use crate::Error;
use std::collections::HashMap;
use std::str::FromStr;

/// Texture atlas description as exported next to a skeleton (`.atlas`).
#[derive(Clone, Debug, Default)]
pub struct Atlas {
    pub pages: Vec<AtlasPage>,
    pub regions: HashMap<String, AtlasRegion>,
}

impl Atlas {
    pub fn parse(input: &str) -> Result<Self, Error> {
        parse_atlas(input)
    }

    pub fn region(&self, name: &str) -> Option<&AtlasRegion> {
        self.regions.get(name)
    }

    pub fn page(&self, index: usize) -> Option<&AtlasPage> {
        self.pages.get(index)
    }

    /// `true` when every page declares premultiplied alpha.
    pub fn all_pages_pma(&self) -> bool {
        !self.pages.is_empty() && self.pages.iter().all(|p| p.pma)
    }
}

impl FromStr for Atlas {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_atlas(s)
    }
}

#[derive(Clone, Debug)]
pub struct AtlasPage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    pub pma: bool,
    pub filter: AtlasFilter,
    pub repeat: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum AtlasFilter {
    Nearest,
    #[default]
    Linear,
    MipMap,
}

#[derive(Clone, Debug, Default)]
pub struct AtlasRegion {
    pub name: String,
    pub page: usize,
    pub degrees: u16,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub original_width: u32,
    pub original_height: u32,
}

enum Section {
    Idle,
    Page,
    Region(AtlasRegion),
}

fn parse_atlas(input: &str) -> Result<Atlas, Error> {
    let mut atlas = Atlas::default();
    let mut section = Section::Idle;

    for raw_line in input.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            // A blank line ends the current page; the next header names a new page.
            flush_region(&mut atlas, &mut section);
            section = Section::Idle;
            continue;
        }

        let indented = raw_line.starts_with(' ') || raw_line.starts_with('\t');
        match line.split_once(':') {
            None if matches!(section, Section::Idle) => {
                atlas.pages.push(AtlasPage {
                    name: line.to_string(),
                    width: 0,
                    height: 0,
                    scale: 1.0,
                    pma: false,
                    filter: AtlasFilter::default(),
                    repeat: false,
                });
                section = Section::Page;
            }
            None if !indented => {
                flush_region(&mut atlas, &mut section);
                section = Section::Region(AtlasRegion {
                    name: line.to_string(),
                    page: atlas.pages.len() - 1,
                    ..AtlasRegion::default()
                });
            }
            None => {
                return Err(Error::AtlasParse {
                    message: format!("unexpected line: {line}"),
                });
            }
            Some((key, value)) => {
                let (key, value) = (key.trim(), value.trim());
                match &mut section {
                    Section::Idle => {
                        return Err(Error::AtlasParse {
                            message: format!("property '{key}' before any page header"),
                        });
                    }
                    Section::Page => {
                        let page = atlas.pages.last_mut().ok_or_else(|| Error::AtlasParse {
                            message: "page property without page".to_string(),
                        })?;
                        apply_page_property(page, key, value)?;
                    }
                    Section::Region(region) => apply_region_property(region, key, value)?,
                }
            }
        }
    }
    flush_region(&mut atlas, &mut section);

    if atlas.pages.is_empty() {
        return Err(Error::AtlasParse {
            message: "empty atlas".to_string(),
        });
    }
    Ok(atlas)
}

fn flush_region(atlas: &mut Atlas, section: &mut Section) {
    if !matches!(section, Section::Region(_)) {
        return;
    }
    if let Section::Region(mut region) = std::mem::replace(section, Section::Page) {
        if region.original_width == 0 {
            region.original_width = region.width;
        }
        if region.original_height == 0 {
            region.original_height = region.height;
        }
        atlas.regions.insert(region.name.clone(), region);
    }
}

fn apply_page_property(page: &mut AtlasPage, key: &str, value: &str) -> Result<(), Error> {
    match key {
        "size" => {
            let [w, h] = parse_numbers::<u32, 2>(value, "page size")?;
            page.width = w;
            page.height = h;
        }
        "scale" => {
            let [s] = parse_numbers::<f32, 1>(value, "page scale")?;
            page.scale = if s.is_finite() && s > 0.0 { s } else { 1.0 };
        }
        "pma" => page.pma = value == "true",
        "filter" => {
            let min = value.split(',').next().unwrap_or(value).trim();
            page.filter = match min {
                "Nearest" => AtlasFilter::Nearest,
                "Linear" => AtlasFilter::Linear,
                _ if min.starts_with("MipMap") => AtlasFilter::MipMap,
                _ => AtlasFilter::Linear,
            };
        }
        "repeat" => page.repeat = value != "none",
        // format, etc.
        _ => {}
    }
    Ok(())
}

fn apply_region_property(region: &mut AtlasRegion, key: &str, value: &str) -> Result<(), Error> {
    match key {
        "bounds" => {
            let [x, y, w, h] = parse_numbers::<u32, 4>(value, "region bounds")?;
            (region.x, region.y, region.width, region.height) = (x, y, w, h);
        }
        "xy" => [region.x, region.y] = parse_numbers::<u32, 2>(value, "region xy")?,
        "size" => [region.width, region.height] = parse_numbers::<u32, 2>(value, "region size")?,
        "orig" => {
            [region.original_width, region.original_height] =
                parse_numbers::<u32, 2>(value, "region orig")?
        }
        "offset" => {
            [region.offset_x, region.offset_y] = parse_numbers::<i32, 2>(value, "region offset")?
        }
        "offsets" => {
            let invalid = || Error::AtlasParse {
                message: format!("invalid region offsets: {value}"),
            };
            let (offset, orig) = value
                .match_indices(',')
                .nth(1)
                .map(|(i, _)| (&value[..i], &value[i + 1..]))
                .ok_or_else(invalid)?;
            [region.offset_x, region.offset_y] = parse_numbers::<i32, 2>(offset, "region offsets")?;
            [region.original_width, region.original_height] =
                parse_numbers::<u32, 2>(orig, "region offsets")?;
        }
        "rotate" => {
            region.degrees = match value {
                "true" => 90,
                "false" => 0,
                other => other.parse::<u16>().unwrap_or(0) % 360,
            };
        }
        _ => {}
    }
    Ok(())
}

fn parse_numbers<T: FromStr, const N: usize>(value: &str, what: &str) -> Result<[T; N], Error> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<T>().ok())
        .collect::<Option<Vec<T>>>()
        .ok_or_else(|| Error::AtlasParse {
            message: format!("invalid {what}: {value}"),
        })?;
    parts.try_into().map_err(|_| Error::AtlasParse {
        message: format!("invalid {what}: {value}"),
    })
}
