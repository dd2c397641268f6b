use crate::{Event, InstanceId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

/// Payload of a user-authored timeline marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string_value: String,
    pub time: f32,
    pub balance: f32,
    pub volume: f32,
}

impl From<&Event> for EventPayload {
    fn from(event: &Event) -> Self {
        Self {
            name: event.name.clone(),
            int_value: event.int_value,
            float_value: event.float_value,
            string_value: event.string.clone(),
            time: event.time,
            balance: event.balance,
            volume: event.volume,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventKind {
    Start,
    Interrupt,
    End,
    Dispose,
    Complete,
    Event {
        #[serde(rename = "eventData")]
        data: EventPayload,
    },
}

impl From<&Event> for EventKind {
    fn from(event: &Event) -> Self {
        Self::Event {
            data: EventPayload::from(event),
        }
    }
}

/// A lifecycle transition or marker produced by one update of one track.
///
/// Serializes to `{"type", "trackIndex", "animation", "eventData"?}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(flatten)]
    pub kind: EventKind,
    pub track_index: usize,
    pub animation: String,
}

impl EventRecord {
    pub fn new(kind: EventKind, track_index: usize, animation: &str) -> Self {
        Self {
            kind,
            track_index,
            animation: animation.to_string(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            EventKind::Start => "start",
            EventKind::Interrupt => "interrupt",
            EventKind::End => "end",
            EventKind::Dispose => "dispose",
            EventKind::Complete => "complete",
            EventKind::Event { .. } => "event",
        }
    }

    pub fn payload(&self) -> Option<&EventPayload> {
        match &self.kind {
            EventKind::Event { data } => Some(data),
            _ => None,
        }
    }
}

pub type EventCallback = Arc<dyn Fn(&EventRecord) + Send + Sync>;
pub type GlobalEventCallback = Arc<dyn Fn(InstanceId, &EventRecord) + Send + Sync>;

/// When records produced by `update` reach the callbacks.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Delivered in order before `update` returns.
    #[default]
    Immediate,
    /// Held until the caller pumps the instance (or all instances).
    Queued,
}

#[derive(Default)]
struct DispatchState {
    callback: Option<EventCallback>,
    pending: VecDeque<EventRecord>,
    delivering: Option<ThreadId>,
    cancelled: bool,
}

/// Per-instance FIFO of undelivered records and the callback they go to.
///
/// Callbacks always run with the internal lock released. At most one thread delivers at a time,
/// so records keep their enqueue order and are never interleaved.
pub struct Dispatcher {
    id: InstanceId,
    state: Mutex<DispatchState>,
    idle: Condvar,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Dispatcher")
            .field("id", &self.id)
            .field("has_callback", &state.callback.is_some())
            .field("pending", &state.pending.len())
            .field("delivering", &state.delivering)
            .field("cancelled", &state.cancelled)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(id: InstanceId) -> Self {
        Self {
            id,
            state: Mutex::new(DispatchState::default()),
            idle: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_callback(&self, callback: Option<EventCallback>) {
        let mut state = self.lock();
        if !state.cancelled {
            state.callback = callback;
        }
    }

    pub fn has_callback(&self) -> bool {
        self.lock().callback.is_some()
    }

    /// Appends the records of one update as a single batch.
    pub fn enqueue(&self, records: Vec<EventRecord>) {
        if records.is_empty() {
            return;
        }
        let mut state = self.lock();
        if state.cancelled {
            return;
        }
        state.pending.extend(records);
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Delivers pending records in order and returns how many were handed out.
    ///
    /// A nested flush from inside a callback returns immediately; the outer delivery picks up
    /// anything enqueued meanwhile. A flush racing with another thread's delivery waits for it.
    pub fn flush(&self, global: Option<&GlobalEventCallback>) -> usize {
        let me = thread::current().id();
        let mut state = self.lock();
        if state.delivering == Some(me) {
            return 0;
        }
        while state.delivering.is_some() {
            state = self.idle.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        if state.cancelled {
            return 0;
        }
        state.delivering = Some(me);
        let _guard = DeliveryGuard { dispatcher: self };

        let mut delivered = 0;
        while let Some(record) = state.pending.pop_front() {
            let callback = state.callback.clone();
            drop(state);
            if let Some(callback) = callback {
                callback(&record);
            }
            delivered += 1;
            // The instance callback may have destroyed its own instance.
            if self.lock().cancelled {
                return delivered;
            }
            if let Some(global) = global {
                global(self.id, &record);
            }
            state = self.lock();
        }
        // The guard re-locks on drop.
        drop(state);
        delivered
    }

    /// Drops undelivered records and the callback; the dispatcher stays usable.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.pending.clear();
        state.callback = None;
    }

    /// Permanently shuts the dispatcher down. Blocks until a delivery running on another thread
    /// returns; after this call nothing is delivered.
    pub fn cancel(&self) {
        let me = thread::current().id();
        let mut state = self.lock();
        state.cancelled = true;
        state.pending.clear();
        state.callback = None;
        if state.delivering == Some(me) {
            return;
        }
        while state.delivering.is_some() {
            state = self.idle.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

struct DeliveryGuard<'a> {
    dispatcher: &'a Dispatcher,
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.dispatcher.lock().delivering = None;
        self.dispatcher.idle.notify_all();
    }
}
