//! Host call surface: integer identifiers in, `bool` / `-1` / empty results out.
//!
//! Every call runs against one process-wide [`Registry`]. Failures are logged with
//! `log::warn!` and reported as `false`; a panic inside an instance's critical path is caught
//! here, and the poisoned instance rejects later calls.

use crate::{
    Error, EventCallback, GlobalEventCallback, InstanceId, LoadOptions, Registry, RegistryConfig,
    SurfaceProvider,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The process-wide registry, built with the default configuration on first use.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::default)
}

/// Installs the configuration. Only possible before the registry is first used.
pub fn configure(config: RegistryConfig) -> bool {
    if let Err(err) = config.validate() {
        log::warn!("configure: {err}");
        return false;
    }
    let installed = REGISTRY.set(Registry::new(config)).is_ok();
    if !installed {
        log::warn!("configure: registry already initialized");
    }
    installed
}

pub fn install_surface_provider(provider: Arc<dyn SurfaceProvider>) -> bool {
    registry().set_surface_provider(provider);
    true
}

fn call<T>(op: &str, f: impl FnOnce(&Registry) -> Result<T, Error>) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(|| f(registry()))) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            log::warn!("{op}: {err}");
            None
        }
        Err(_) => {
            log::error!("{op}: panicked; the instance is now faulted");
            None
        }
    }
}

fn instance_id(raw: i32) -> Result<InstanceId, Error> {
    InstanceId::from_raw(raw).ok_or(Error::UnknownInstance { id: raw })
}

fn track_index(raw: i32) -> Result<usize, Error> {
    usize::try_from(raw).map_err(|_| Error::InvalidTrackIndex {
        index: i64::from(raw),
    })
}

fn view_extent(raw: i32) -> Result<f32, Error> {
    if raw < 0 {
        return Err(Error::InvalidValue {
            message: format!("view size must be >= 0, got {raw}"),
        });
    }
    Ok(raw as f32)
}

pub fn create(surface_id: &str) -> i32 {
    call("create", |r| r.create(surface_id))
        .map(InstanceId::as_raw)
        .unwrap_or(-1)
}

pub fn destroy(id: i32) -> bool {
    call("destroy", |r| r.destroy(instance_id(id)?)).is_some()
}

pub fn cleanup(id: i32) -> bool {
    call("cleanup", |r| r.cleanup(instance_id(id)?)).is_some()
}

pub fn set_event_callback(id: i32, callback: Option<EventCallback>) -> bool {
    call("set_event_callback", |r| {
        r.set_event_callback(instance_id(id)?, callback)
    })
    .is_some()
}

pub fn set_global_event_callback(callback: Option<GlobalEventCallback>) -> bool {
    registry().set_global_event_callback(callback);
    true
}

pub fn load(id: i32, skeleton_path: &str, atlas_path: &str, options: &LoadOptions) -> bool {
    call("load", |r| {
        r.load(instance_id(id)?, skeleton_path, atlas_path, options)
    })
    .is_some()
}

/// `load` with options given as the host's JSON object; an empty string means defaults.
pub fn load_with_json_options(id: i32, skeleton_path: &str, atlas_path: &str, options: &str) -> bool {
    let options = if options.trim().is_empty() {
        Ok(LoadOptions::default())
    } else {
        LoadOptions::from_json_str(options)
    };
    match options {
        Ok(options) => load(id, skeleton_path, atlas_path, &options),
        Err(err) => {
            log::warn!("load: {err}");
            false
        }
    }
}

pub fn set_animation(id: i32, track: i32, name: &str, looped: bool) -> bool {
    call("set_animation", |r| {
        r.set_animation(instance_id(id)?, track_index(track)?, name, looped)
    })
    .is_some()
}

pub fn add_animation(id: i32, track: i32, name: &str, looped: bool, delay: f32) -> bool {
    call("add_animation", |r| {
        r.add_animation(instance_id(id)?, track_index(track)?, name, looped, delay)
    })
    .is_some()
}

pub fn set_skin(id: i32, name: &str) -> bool {
    call("set_skin", |r| r.set_skin(instance_id(id)?, name)).is_some()
}

pub fn set_mix(id: i32, from: &str, to: &str, duration: f32) -> bool {
    call("set_mix", |r| r.set_mix(instance_id(id)?, from, to, duration)).is_some()
}

pub fn set_time_scale(id: i32, time_scale: f32) -> bool {
    call("set_time_scale", |r| {
        r.set_time_scale(instance_id(id)?, time_scale)
    })
    .is_some()
}

pub fn pause(id: i32) -> bool {
    call("pause", |r| r.pause(instance_id(id)?)).is_some()
}

pub fn resume(id: i32) -> bool {
    call("resume", |r| r.resume(instance_id(id)?)).is_some()
}

pub fn stop(id: i32) -> bool {
    call("stop", |r| r.stop(instance_id(id)?)).is_some()
}

pub fn clear_track(id: i32, track: i32) -> bool {
    call("clear_track", |r| {
        r.clear_track(instance_id(id)?, track_index(track)?)
    })
    .is_some()
}

pub fn clear_tracks(id: i32) -> bool {
    call("clear_tracks", |r| r.clear_tracks(instance_id(id)?)).is_some()
}

pub fn update_view_size(id: i32, width: i32, height: i32) -> bool {
    call("update_view_size", |r| {
        r.update_view_size(instance_id(id)?, view_extent(width)?, view_extent(height)?)
    })
    .is_some()
}

pub fn set_scale(id: i32, scale: f32) -> bool {
    call("set_scale", |r| r.set_scale(instance_id(id)?, scale)).is_some()
}

pub fn set_premultiplied_alpha(id: i32, premultiplied_alpha: bool) -> bool {
    call("set_premultiplied_alpha", |r| {
        r.set_premultiplied_alpha(instance_id(id)?, premultiplied_alpha)
    })
    .is_some()
}

pub fn get_animations(id: i32) -> Vec<String> {
    call("get_animations", |r| r.animations(instance_id(id)?)).unwrap_or_default()
}

pub fn get_skins(id: i32) -> Vec<String> {
    call("get_skins", |r| r.skins(instance_id(id)?)).unwrap_or_default()
}

/// JSON snapshot of the instance, or `"{}"` when it cannot be produced.
pub fn get_state(id: i32) -> String {
    call("get_state", |r| r.state(instance_id(id)?)?.to_json())
        .unwrap_or_else(|| "{}".to_string())
}

pub fn update(id: i32, delta: f32) -> bool {
    call("update", |r| r.update(instance_id(id)?, delta)).is_some()
}

pub fn render(id: i32) -> bool {
    call("render", |r| r.render(instance_id(id)?)).is_some()
}

pub fn dispatch_events(id: i32) -> bool {
    call("dispatch_events", |r| r.dispatch_events(instance_id(id)?)).is_some()
}

/// Pumps every instance; returns how many records were delivered.
pub fn dispatch_all_events() -> usize {
    call("dispatch_all_events", |r| Ok(r.dispatch_all_events())).unwrap_or(0)
}
