use crate::{Atlas, Error, SkeletonData};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Options accepted by `load`, deserializable from the host's `{scale, premultipliedAlpha,
/// debugMode}` object. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadOptions {
    pub scale: f32,
    pub premultiplied_alpha: bool,
    pub debug_mode: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            premultiplied_alpha: true,
            debug_mode: false,
        }
    }
}

impl LoadOptions {
    pub fn from_json_str(input: &str) -> Result<Self, Error> {
        let options: Self = serde_json::from_str(input).map_err(|e| Error::JsonParse {
            message: e.to_string(),
        })?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(Error::InvalidValue {
                message: format!("scale must be finite and > 0, got {}", self.scale),
            });
        }
        Ok(())
    }
}

/// Skeleton and atlas parsed for one instance, ready to be committed.
#[derive(Clone, Debug)]
pub struct LoadedAssets {
    pub skeleton: Arc<SkeletonData>,
    pub atlas: Arc<Atlas>,
}

/// Reads and parses both files. Nothing is returned unless both parse.
pub fn load_assets(
    skeleton_path: &Path,
    atlas_path: &Path,
    options: &LoadOptions,
) -> Result<LoadedAssets, Error> {
    options.validate()?;

    let is_json = skeleton_path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !is_json {
        return Err(Error::UnsupportedSkeletonFormat {
            path: skeleton_path.display().to_string(),
        });
    }

    let skeleton_source = read_to_string(skeleton_path)?;
    let atlas_source = read_to_string(atlas_path)?;

    let skeleton = SkeletonData::from_json_str_with_scale(&skeleton_source, options.scale)?;
    let atlas = Arc::new(Atlas::parse(&atlas_source)?);
    log::debug!(
        "parsed {} ({} animations, {} skins) with atlas {} ({} pages)",
        skeleton_path.display(),
        skeleton.animations.len(),
        skeleton.skins.len(),
        atlas_path.display(),
        atlas.pages.len()
    );
    Ok(LoadedAssets { skeleton, atlas })
}

fn read_to_string(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })
}
