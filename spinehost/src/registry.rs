use crate::ids::{MAX_GENERATION, MAX_SLOTS};
use crate::{
    DeliveryMode, Dispatcher, Error, EventCallback, GlobalEventCallback, Instance, InstanceId,
    InstanceState, LoadOptions, OffscreenSurfaceProvider, SurfaceProvider, load_assets,
};
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

pub const DEFAULT_CAPACITY: usize = 4096;

/// Process-wide settings, fixed when the registry is built.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryConfig {
    /// Mix duration used when no `(from, to)` pair was configured.
    pub default_mix: f32,
    pub delivery: DeliveryMode,
    /// Maximum number of live instances.
    pub capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_mix: 0.0,
            delivery: DeliveryMode::Immediate,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl RegistryConfig {
    pub fn from_json_str(input: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(input).map_err(|e| Error::JsonParse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.default_mix.is_finite() || self.default_mix < 0.0 {
            return Err(Error::InvalidValue {
                message: format!("default mix must be finite and >= 0, got {}", self.default_mix),
            });
        }
        if self.capacity == 0 || self.capacity > MAX_SLOTS {
            return Err(Error::InvalidValue {
                message: format!("capacity must be in 1..={MAX_SLOTS}, got {}", self.capacity),
            });
        }
        Ok(())
    }
}

struct InstanceHandle {
    instance: Mutex<Instance>,
    dispatcher: Dispatcher,
}

struct SlotEntry {
    generation: u16,
    handle: Option<Arc<InstanceHandle>>,
}

#[derive(Default)]
struct Slots {
    entries: Vec<SlotEntry>,
    free: Vec<usize>,
    live: usize,
}

/// Maps instance identifiers to instances.
///
/// The slot table lock is only held to look up, insert or remove a handle. Each instance has its
/// own lock for its critical path, and event callbacks run with neither lock held.
pub struct Registry {
    config: RegistryConfig,
    slots: Mutex<Slots>,
    surfaces: RwLock<Arc<dyn SurfaceProvider>>,
    global_callback: RwLock<Option<GlobalEventCallback>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("live", &self.live_count())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_surface_provider(config, Arc::new(OffscreenSurfaceProvider::new()))
    }

    pub fn with_surface_provider(config: RegistryConfig, provider: Arc<dyn SurfaceProvider>) -> Self {
        Self {
            config,
            slots: Mutex::new(Slots::default()),
            surfaces: RwLock::new(provider),
            global_callback: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn set_surface_provider(&self, provider: Arc<dyn SurfaceProvider>) {
        *self
            .surfaces
            .write()
            .unwrap_or_else(PoisonError::into_inner) = provider;
    }

    pub fn set_global_event_callback(&self, callback: Option<GlobalEventCallback>) {
        *self
            .global_callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = callback;
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn live_count(&self) -> usize {
        self.slots().live
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.handle(id).is_ok()
    }

    /// Binds a surface and registers a new, unloaded instance.
    pub fn create(&self, surface_id: &str) -> Result<InstanceId, Error> {
        let provider = Arc::clone(&self.surfaces.read().unwrap_or_else(PoisonError::into_inner));
        let surface = provider.bind(surface_id)?;

        let mut slots = self.slots();
        if slots.live >= self.config.capacity {
            return Err(Error::RegistryFull {
                capacity: self.config.capacity,
            });
        }
        let slot = match slots.free.pop() {
            Some(slot) => slot,
            None if slots.entries.len() < MAX_SLOTS => {
                slots.entries.push(SlotEntry {
                    generation: 0,
                    handle: None,
                });
                slots.entries.len() - 1
            }
            None => {
                return Err(Error::RegistryFull {
                    capacity: slots.entries.len(),
                });
            }
        };
        let id = InstanceId::new(slot, slots.entries[slot].generation);
        slots.entries[slot].handle = Some(Arc::new(InstanceHandle {
            instance: Mutex::new(Instance::new(id, surface, self.config.default_mix)),
            dispatcher: Dispatcher::new(id),
        }));
        slots.live += 1;
        drop(slots);

        log::debug!("created instance {id} on surface '{surface_id}'");
        Ok(id)
    }

    /// Unregisters the instance, then cancels its dispatcher (waiting for a delivery in flight on
    /// another thread). The identifier is never issued again.
    pub fn destroy(&self, id: InstanceId) -> Result<(), Error> {
        let handle = {
            let mut slots = self.slots();
            let entry = slots
                .entries
                .get_mut(id.slot())
                .filter(|e| e.generation == id.generation() && e.handle.is_some())
                .ok_or(Error::UnknownInstance { id: id.as_raw() })?;
            let handle = entry.handle.take();
            let retired = entry.generation >= MAX_GENERATION;
            if !retired {
                entry.generation += 1;
            }
            slots.live -= 1;
            if !retired {
                slots.free.push(id.slot());
            }
            handle
        };
        if let Some(handle) = handle {
            handle.dispatcher.cancel();
        }
        log::debug!("destroyed instance {id}");
        Ok(())
    }

    fn handle(&self, id: InstanceId) -> Result<Arc<InstanceHandle>, Error> {
        let slots = self.slots();
        slots
            .entries
            .get(id.slot())
            .filter(|e| e.generation == id.generation())
            .and_then(|e| e.handle.clone())
            .ok_or(Error::UnknownInstance { id: id.as_raw() })
    }

    fn lock_instance<'a>(
        id: InstanceId,
        handle: &'a InstanceHandle,
    ) -> Result<MutexGuard<'a, Instance>, Error> {
        let instance = handle
            .instance
            .lock()
            .map_err(|_| Error::InstanceFaulted { id: id.as_raw() })?;
        if instance.is_faulted() {
            return Err(Error::InstanceFaulted { id: id.as_raw() });
        }
        Ok(instance)
    }

    fn with_instance<R>(
        &self,
        id: InstanceId,
        f: impl FnOnce(&mut Instance) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let handle = self.handle(id)?;
        let mut instance = Self::lock_instance(id, &handle)?;
        f(&mut instance)
    }

    /// Drops loaded data, tracks, mixes, undelivered records and the callback. The identifier
    /// stays registered.
    pub fn cleanup(&self, id: InstanceId) -> Result<(), Error> {
        let handle = self.handle(id)?;
        Self::lock_instance(id, &handle)?.cleanup();
        handle.dispatcher.reset();
        log::debug!("cleaned up instance {id}");
        Ok(())
    }

    pub fn set_event_callback(
        &self,
        id: InstanceId,
        callback: Option<EventCallback>,
    ) -> Result<(), Error> {
        let handle = self.handle(id)?;
        drop(Self::lock_instance(id, &handle)?);
        handle.dispatcher.set_callback(callback);
        Ok(())
    }

    /// Parses both files without holding the instance lock, then commits atomically.
    pub fn load(
        &self,
        id: InstanceId,
        skeleton_path: impl AsRef<Path>,
        atlas_path: impl AsRef<Path>,
        options: &LoadOptions,
    ) -> Result<(), Error> {
        let handle = self.handle(id)?;
        if Self::lock_instance(id, &handle)?.is_loaded() {
            return Err(Error::AlreadyLoaded { id: id.as_raw() });
        }

        let assets = load_assets(skeleton_path.as_ref(), atlas_path.as_ref(), options)?;
        Self::lock_instance(id, &handle)?.load(assets, options)?;
        log::debug!(
            "loaded instance {id} from {}",
            skeleton_path.as_ref().display()
        );
        Ok(())
    }

    pub fn animations(&self, id: InstanceId) -> Result<Vec<String>, Error> {
        self.with_instance(id, |instance| Ok(instance.animations()))
    }

    pub fn skins(&self, id: InstanceId) -> Result<Vec<String>, Error> {
        self.with_instance(id, |instance| Ok(instance.skins()))
    }

    pub fn set_animation(
        &self,
        id: InstanceId,
        track: usize,
        name: &str,
        looped: bool,
    ) -> Result<(), Error> {
        self.with_instance(id, |instance| instance.set_animation(track, name, looped))
    }

    pub fn add_animation(
        &self,
        id: InstanceId,
        track: usize,
        name: &str,
        looped: bool,
        delay: f32,
    ) -> Result<(), Error> {
        self.with_instance(id, |instance| {
            instance.add_animation(track, name, looped, delay)
        })
    }

    pub fn set_skin(&self, id: InstanceId, name: &str) -> Result<(), Error> {
        self.with_instance(id, |instance| instance.set_skin(name))
    }

    pub fn set_mix(&self, id: InstanceId, from: &str, to: &str, duration: f32) -> Result<(), Error> {
        self.with_instance(id, |instance| instance.set_mix(from, to, duration))
    }

    pub fn set_time_scale(&self, id: InstanceId, time_scale: f32) -> Result<(), Error> {
        self.with_instance(id, |instance| instance.set_time_scale(time_scale))
    }

    pub fn pause(&self, id: InstanceId) -> Result<(), Error> {
        self.with_instance(id, |instance| {
            instance.pause();
            Ok(())
        })
    }

    pub fn resume(&self, id: InstanceId) -> Result<(), Error> {
        self.with_instance(id, |instance| {
            instance.resume();
            Ok(())
        })
    }

    pub fn stop(&self, id: InstanceId) -> Result<(), Error> {
        self.with_instance(id, |instance| {
            instance.stop();
            Ok(())
        })
    }

    pub fn clear_track(&self, id: InstanceId, track: usize) -> Result<(), Error> {
        self.with_instance(id, |instance| {
            instance.clear_track(track);
            Ok(())
        })
    }

    pub fn clear_tracks(&self, id: InstanceId) -> Result<(), Error> {
        self.with_instance(id, |instance| {
            instance.clear_tracks();
            Ok(())
        })
    }

    pub fn update_view_size(&self, id: InstanceId, width: f32, height: f32) -> Result<(), Error> {
        self.with_instance(id, |instance| instance.update_view_size(width, height))
    }

    pub fn set_scale(&self, id: InstanceId, scale: f32) -> Result<(), Error> {
        self.with_instance(id, |instance| instance.set_scale(scale))
    }

    pub fn set_premultiplied_alpha(&self, id: InstanceId, premultiplied_alpha: bool) -> Result<(), Error> {
        self.with_instance(id, |instance| {
            instance.set_premultiplied_alpha(premultiplied_alpha);
            Ok(())
        })
    }

    pub fn state(&self, id: InstanceId) -> Result<InstanceState, Error> {
        self.with_instance(id, |instance| Ok(instance.state()))
    }

    /// Advances the instance. Its records are queued as one batch while the instance lock is
    /// held; in immediate mode they are delivered before this returns.
    pub fn update(&self, id: InstanceId, delta: f32) -> Result<(), Error> {
        let handle = self.handle(id)?;
        {
            let mut instance = Self::lock_instance(id, &handle)?;
            let records = instance.update(delta)?;
            handle.dispatcher.enqueue(records);
        }
        if self.config.delivery == DeliveryMode::Immediate {
            self.flush(&handle);
        }
        Ok(())
    }

    pub fn render(&self, id: InstanceId) -> Result<(), Error> {
        self.with_instance(id, |instance| instance.render())
    }

    /// Delivers the instance's pending records on the calling thread.
    pub fn dispatch_events(&self, id: InstanceId) -> Result<usize, Error> {
        let handle = self.handle(id)?;
        Ok(self.flush(&handle))
    }

    /// Delivers pending records of every live instance, in identifier slot order.
    pub fn dispatch_all_events(&self) -> usize {
        let handles = self
            .slots()
            .entries
            .iter()
            .filter_map(|e| e.handle.clone())
            .collect::<Vec<_>>();
        handles.iter().map(|handle| self.flush(handle)).sum()
    }

    fn flush(&self, handle: &InstanceHandle) -> usize {
        let global = self
            .global_callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        handle.dispatcher.flush(global.as_ref())
    }

    #[cfg(test)]
    pub(crate) fn corrupt_for_tests(&self, id: InstanceId, track: usize) -> Result<(), Error> {
        self.with_instance(id, |instance| {
            instance.corrupt_for_tests(track);
            Ok(())
        })
    }

    #[cfg(test)]
    pub(crate) fn pending_len_for_tests(&self, id: InstanceId) -> Result<usize, Error> {
        Ok(self.handle(id)?.dispatcher.pending_len())
    }
}
