use crate::{Error, InstanceId, PoseLayer, RenderFrame};
use glam::Mat4;
use std::sync::{Arc, Mutex, PoisonError};

/// Drawing target bound to one instance at creation.
pub trait Surface: Send {
    fn id(&self) -> &str;

    /// Initial view size in pixels.
    fn size(&self) -> (u32, u32);

    fn draw(&mut self, frame: &RenderFrame<'_>) -> Result<(), Error>;
}

/// Resolves the host's surface binding into a [`Surface`].
pub trait SurfaceProvider: Send + Sync {
    fn bind(&self, surface_id: &str) -> Result<Box<dyn Surface>, Error>;
}

pub const DEFAULT_OFFSCREEN_SIZE: (u32, u32) = (512, 512);

/// What an offscreen surface kept from one drawn frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameSummary {
    pub surface: String,
    pub instance: InstanceId,
    pub projection: Mat4,
    pub scale: f32,
    pub premultiplied_alpha: bool,
    pub skin: Option<String>,
    pub layers: Vec<PoseLayer>,
    pub has_debug_overlay: bool,
}

pub type FrameLog = Arc<Mutex<Vec<FrameSummary>>>;

/// Headless provider. Every non-blank id binds; frames are summarized into an optional shared log.
#[derive(Clone, Debug, Default)]
pub struct OffscreenSurfaceProvider {
    size: Option<(u32, u32)>,
    log: Option<FrameLog>,
}

impl OffscreenSurfaceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));
        self
    }

    pub fn with_log(mut self, log: FrameLog) -> Self {
        self.log = Some(log);
        self
    }
}

impl SurfaceProvider for OffscreenSurfaceProvider {
    fn bind(&self, surface_id: &str) -> Result<Box<dyn Surface>, Error> {
        if surface_id.trim().is_empty() {
            return Err(Error::Surface {
                surface: surface_id.to_string(),
                message: "surface id must not be empty".to_string(),
            });
        }
        Ok(Box::new(OffscreenSurface {
            id: surface_id.to_string(),
            size: self.size.unwrap_or(DEFAULT_OFFSCREEN_SIZE),
            log: self.log.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct OffscreenSurface {
    id: String,
    size: (u32, u32),
    log: Option<FrameLog>,
}

impl Surface for OffscreenSurface {
    fn id(&self) -> &str {
        &self.id
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn draw(&mut self, frame: &RenderFrame<'_>) -> Result<(), Error> {
        if let Some(log) = &self.log {
            log.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(FrameSummary {
                    surface: self.id.clone(),
                    instance: frame.instance,
                    projection: frame.projection,
                    scale: frame.scale,
                    premultiplied_alpha: frame.premultiplied_alpha,
                    skin: frame.skin.map(str::to_string),
                    layers: frame.layers.to_vec(),
                    has_debug_overlay: frame.debug.is_some(),
                });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_surface_ids_are_rejected() {
        let provider = OffscreenSurfaceProvider::new();
        assert!(matches!(provider.bind(""), Err(Error::Surface { .. })));
        assert!(matches!(provider.bind("   "), Err(Error::Surface { .. })));
    }

    #[test]
    fn bound_surface_reports_id_and_size() {
        let provider = OffscreenSurfaceProvider::new().with_size(320, 200);
        let surface = provider.bind("canvas-1").unwrap();
        assert_eq!(surface.id(), "canvas-1");
        assert_eq!(surface.size(), (320, 200));

        let surface = OffscreenSurfaceProvider::new().bind("canvas-2").unwrap();
        assert_eq!(surface.size(), DEFAULT_OFFSCREEN_SIZE);
    }
}
