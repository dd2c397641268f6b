use crate::{Atlas, Error, InstanceId, PoseLayer, SkeletonData};
use glam::{Mat4, Vec2, Vec3};

/// Per-instance presentation settings. None of them affect timelines.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderSettings {
    pub view_width: f32,
    pub view_height: f32,
    pub scale: f32,
    pub premultiplied_alpha: bool,
    pub debug_mode: bool,
}

impl RenderSettings {
    pub fn new(view_width: f32, view_height: f32) -> Self {
        Self {
            view_width,
            view_height,
            scale: 1.0,
            premultiplied_alpha: true,
            debug_mode: false,
        }
    }

    pub fn set_view_size(&mut self, width: f32, height: f32) -> Result<(), Error> {
        if !width.is_finite() || !height.is_finite() || width < 0.0 || height < 0.0 {
            return Err(Error::InvalidValue {
                message: format!("view size must be finite and >= 0, got {width}x{height}"),
            });
        }
        self.view_width = width;
        self.view_height = height;
        Ok(())
    }

    pub fn set_scale(&mut self, scale: f32) -> Result<(), Error> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::InvalidValue {
                message: format!("scale must be finite and > 0, got {scale}"),
            });
        }
        self.scale = scale;
        Ok(())
    }

    /// Clip-from-world matrix treating world units as pixels centered on the view.
    pub fn projection(&self) -> Mat4 {
        let half_w = self.view_width.max(1.0) * 0.5;
        let half_h = self.view_height.max(1.0) * 0.5;
        Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, -1.0, 1.0)
            * Mat4::from_scale(Vec3::new(self.scale, self.scale, 1.0))
    }
}

/// Diagnostic data attached to frames of instances loaded with `debugMode`.
#[derive(Clone, Debug, PartialEq)]
pub struct DebugOverlay {
    /// Setup-pose bone origins, accumulated along the parent chain.
    pub bone_origins: Vec<Vec2>,
    pub track_count: usize,
    pub layer_count: usize,
}

impl DebugOverlay {
    pub fn build(skeleton: &SkeletonData, layers: &[PoseLayer]) -> Self {
        let mut bone_origins: Vec<Vec2> = Vec::with_capacity(skeleton.bones.len());
        for bone in &skeleton.bones {
            let local = Vec2::new(bone.x, bone.y);
            let origin = match bone.parent.and_then(|p| bone_origins.get(p)) {
                Some(parent) => *parent + local,
                None => local,
            };
            bone_origins.push(origin);
        }
        let mut tracks = layers.iter().map(|l| l.track_index).collect::<Vec<_>>();
        tracks.dedup();
        Self {
            bone_origins,
            track_count: tracks.len(),
            layer_count: layers.len(),
        }
    }
}

/// Everything a surface needs to draw the pose captured by the last update.
#[derive(Debug)]
pub struct RenderFrame<'a> {
    pub instance: InstanceId,
    pub projection: Mat4,
    pub view_size: Vec2,
    pub scale: f32,
    pub premultiplied_alpha: bool,
    pub skin: Option<&'a str>,
    pub layers: &'a [PoseLayer],
    pub skeleton: &'a SkeletonData,
    pub atlas: &'a Atlas,
    pub debug: Option<DebugOverlay>,
}

impl<'a> RenderFrame<'a> {
    pub fn new(
        instance: InstanceId,
        settings: &RenderSettings,
        skin: Option<&'a str>,
        layers: &'a [PoseLayer],
        skeleton: &'a SkeletonData,
        atlas: &'a Atlas,
    ) -> Self {
        Self {
            instance,
            projection: settings.projection(),
            view_size: Vec2::new(settings.view_width, settings.view_height),
            scale: settings.scale,
            premultiplied_alpha: settings.premultiplied_alpha,
            skin,
            layers,
            skeleton,
            atlas,
            debug: settings
                .debug_mode
                .then(|| DebugOverlay::build(skeleton, layers)),
        }
    }
}
