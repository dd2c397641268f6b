use crate::{
    AnimationState, AnimationStateData, Error, EventRecord, InstanceId, LoadOptions, LoadedAssets,
    PoseLayer, RenderFrame, RenderSettings, Surface, TrackState,
};
use serde::Serialize;

struct Loaded {
    assets: LoadedAssets,
    state: AnimationState,
}

/// Snapshot returned by `getState`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceState {
    pub is_loaded: bool,
    pub is_paused: bool,
    pub time_scale: f32,
    pub skin: Option<String>,
    pub tracks: Vec<TrackState>,
}

impl InstanceState {
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::StateSerialize {
            message: e.to_string(),
        })
    }
}

/// One skeleton binding: loaded data, track state, clock settings and the bound surface.
pub struct Instance {
    id: InstanceId,
    surface: Box<dyn Surface>,
    render: RenderSettings,
    loaded: Option<Loaded>,
    skin: Option<String>,
    time_scale: f32,
    paused: bool,
    pose: Vec<PoseLayer>,
    default_mix: f32,
    faulted: bool,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("surface", &self.surface.id())
            .field("loaded", &self.loaded.is_some())
            .field("skin", &self.skin)
            .field("time_scale", &self.time_scale)
            .field("paused", &self.paused)
            .field("faulted", &self.faulted)
            .finish()
    }
}

impl Instance {
    pub fn new(id: InstanceId, surface: Box<dyn Surface>, default_mix: f32) -> Self {
        let (width, height) = surface.size();
        Self {
            id,
            surface,
            render: RenderSettings::new(width as f32, height as f32),
            loaded: None,
            skin: None,
            time_scale: 1.0,
            paused: false,
            pose: Vec::new(),
            default_mix,
            faulted: false,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn render_settings(&self) -> &RenderSettings {
        &self.render
    }

    pub fn pose(&self) -> &[PoseLayer] {
        &self.pose
    }

    fn loaded_mut(&mut self) -> Result<&mut Loaded, Error> {
        let id = self.id.as_raw();
        self.loaded.as_mut().ok_or(Error::NotLoaded { id })
    }

    fn ensure_unloaded(&self) -> Result<(), Error> {
        if self.loaded.is_some() {
            return Err(Error::AlreadyLoaded {
                id: self.id.as_raw(),
            });
        }
        Ok(())
    }

    /// Commits parsed assets. The track set starts empty and `default` becomes the active skin
    /// when the skeleton has one.
    pub fn load(&mut self, assets: LoadedAssets, options: &LoadOptions) -> Result<(), Error> {
        self.ensure_unloaded()?;
        options.validate()?;

        let data = AnimationStateData::with_default_mix(assets.skeleton.clone(), self.default_mix);
        self.skin = assets.skeleton.skin("default").map(|s| s.name.clone());
        self.render.premultiplied_alpha = options.premultiplied_alpha;
        self.render.debug_mode = options.debug_mode;
        self.pose.clear();
        self.loaded = Some(Loaded {
            assets,
            state: AnimationState::new(data),
        });
        Ok(())
    }

    /// Releases loaded data and track state; the instance can be loaded again.
    pub fn cleanup(&mut self) {
        self.loaded = None;
        self.skin = None;
        self.pose.clear();
        self.paused = false;
        self.time_scale = 1.0;
        self.render.debug_mode = false;
    }

    pub fn animations(&self) -> Vec<String> {
        self.loaded
            .as_ref()
            .map(|l| l.assets.skeleton.animation_names())
            .unwrap_or_default()
    }

    pub fn skins(&self) -> Vec<String> {
        self.loaded
            .as_ref()
            .map(|l| l.assets.skeleton.skin_names())
            .unwrap_or_default()
    }

    pub fn set_animation(&mut self, track: usize, name: &str, looped: bool) -> Result<(), Error> {
        self.loaded_mut()?.state.set_animation(track, name, looped)
    }

    pub fn add_animation(
        &mut self,
        track: usize,
        name: &str,
        looped: bool,
        delay: f32,
    ) -> Result<(), Error> {
        self.loaded_mut()?
            .state
            .add_animation(track, name, looped, delay)
    }

    pub fn set_skin(&mut self, name: &str) -> Result<(), Error> {
        let loaded = self.loaded_mut()?;
        let Some(skin) = loaded.assets.skeleton.skin(name) else {
            return Err(Error::UnknownSkin {
                name: name.to_string(),
            });
        };
        let name = skin.name.clone();
        self.skin = Some(name);
        Ok(())
    }

    pub fn set_mix(&mut self, from: &str, to: &str, duration: f32) -> Result<(), Error> {
        self.loaded_mut()?.state.data_mut().set_mix(from, to, duration)
    }

    pub fn set_time_scale(&mut self, time_scale: f32) -> Result<(), Error> {
        if !time_scale.is_finite() {
            return Err(Error::InvalidValue {
                message: format!("time scale must be finite, got {time_scale}"),
            });
        }
        self.time_scale = time_scale;
        Ok(())
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Clears every track and resumes the clock.
    pub fn stop(&mut self) {
        self.clear_tracks();
        self.paused = false;
    }

    pub fn clear_track(&mut self, track: usize) {
        if let Some(loaded) = self.loaded.as_mut() {
            loaded.state.clear_track(track);
        }
    }

    pub fn clear_tracks(&mut self) {
        if let Some(loaded) = self.loaded.as_mut() {
            loaded.state.clear_tracks();
        }
    }

    pub fn update_view_size(&mut self, width: f32, height: f32) -> Result<(), Error> {
        self.render.set_view_size(width, height)
    }

    pub fn set_scale(&mut self, scale: f32) -> Result<(), Error> {
        self.render.set_scale(scale)
    }

    pub fn set_premultiplied_alpha(&mut self, premultiplied_alpha: bool) {
        self.render.premultiplied_alpha = premultiplied_alpha;
    }

    pub fn state(&self) -> InstanceState {
        InstanceState {
            is_loaded: self.loaded.is_some(),
            is_paused: self.paused,
            time_scale: self.time_scale,
            skin: self.skin.clone(),
            tracks: self
                .loaded
                .as_ref()
                .map(|l| l.state.track_states())
                .unwrap_or_default(),
        }
    }

    /// Advances all tracks and captures the pose for the next `render`.
    ///
    /// An unloaded or paused instance accepts the call and does nothing.
    pub fn update(&mut self, delta: f32) -> Result<Vec<EventRecord>, Error> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(Error::InvalidValue {
                message: format!("delta time must be finite and >= 0, got {delta}"),
            });
        }
        if self.paused {
            return Ok(Vec::new());
        }
        let id = self.id;
        let time_scale = self.time_scale;
        let Some(loaded) = self.loaded.as_mut() else {
            return Ok(Vec::new());
        };

        let records = loaded.state.update(delta * time_scale);
        if let Err(err) = loaded.state.check_invariants() {
            log::error!("instance {id}: {err}");
            self.faulted = true;
            debug_assert!(false, "instance {id}: {err}");
            return Err(err);
        }
        self.pose = loaded.state.pose();
        Ok(records)
    }

    /// Hands the pose captured by the last update to the bound surface.
    pub fn render(&mut self) -> Result<(), Error> {
        let Self {
            id,
            surface,
            render,
            loaded,
            skin,
            pose,
            ..
        } = self;
        let Some(loaded) = loaded.as_ref() else {
            return Err(Error::NotLoaded { id: id.as_raw() });
        };
        let frame = RenderFrame::new(
            *id,
            render,
            skin.as_deref(),
            pose,
            &loaded.assets.skeleton,
            &loaded.assets.atlas,
        );
        surface.draw(&frame)
    }

    #[cfg(test)]
    pub(crate) fn corrupt_for_tests(&mut self, track: usize) {
        if let Some(loaded) = self.loaded.as_mut() {
            loaded.state.corrupt_for_tests(track);
        }
    }
}
