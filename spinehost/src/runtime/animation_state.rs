use crate::{Error, Event, EventKind, EventRecord, EventTimeline, SkeletonData};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

pub(crate) const TIME_EPSILON: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct EntryId {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct EntrySlot {
    generation: u32,
    entry: Option<TrackEntry>,
}

/// Skeleton data shared by every track plus the mix table used when entries are promoted.
#[derive(Clone, Debug)]
pub struct AnimationStateData {
    pub skeleton_data: Arc<SkeletonData>,
    pub default_mix: f32,
    mixes: HashMap<(usize, usize), f32>,
}

impl AnimationStateData {
    pub fn new(skeleton_data: Arc<SkeletonData>) -> Self {
        Self {
            skeleton_data,
            default_mix: 0.0,
            mixes: HashMap::new(),
        }
    }

    pub fn with_default_mix(skeleton_data: Arc<SkeletonData>, default_mix: f32) -> Self {
        Self {
            default_mix,
            ..Self::new(skeleton_data)
        }
    }

    /// Records the cross-fade used when `from` is replaced by `to`. Only later promotions use it.
    pub fn set_mix(&mut self, from: &str, to: &str, duration: f32) -> Result<(), Error> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(Error::InvalidValue {
                message: "mix duration must be finite and >= 0".to_string(),
            });
        }
        let Some((from_index, _)) = self.skeleton_data.animation(from) else {
            return Err(Error::UnknownAnimation {
                name: from.to_string(),
            });
        };
        let Some((to_index, _)) = self.skeleton_data.animation(to) else {
            return Err(Error::UnknownAnimation {
                name: to.to_string(),
            });
        };
        self.mixes.insert((from_index, to_index), duration);
        Ok(())
    }

    pub fn mix(&self, from: &str, to: &str) -> f32 {
        match (
            self.skeleton_data.animation(from),
            self.skeleton_data.animation(to),
        ) {
            (Some((from_index, _)), Some((to_index, _))) => self.mix_duration(from_index, to_index),
            _ => self.default_mix,
        }
    }

    fn mix_duration(&self, from_index: usize, to_index: usize) -> f32 {
        self.mixes
            .get(&(from_index, to_index))
            .copied()
            .unwrap_or(self.default_mix)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryState {
    /// Waiting in a track queue.
    Queued,
    /// Current entry while the previous one fades out.
    MixingIn,
    Active,
    /// Outgoing entry of a running mix.
    Ending,
    /// Released; its slot may be reused under a new generation.
    Disposed,
}

#[derive(Clone, Debug)]
pub struct TrackEntry {
    pub track_index: usize,
    pub animation_index: usize,
    pub animation_name: String,
    pub duration: f32,
    pub looped: bool,
    /// Seconds to wait after the previous entry's exit point (or after queueing on an idle track).
    pub delay: f32,
    pub mix_duration: f32,
    pub mix_time: f32,
    pub track_time: f32,
    pub animation_last_time: f32,
    pub state: EntryState,
    mixing_from: Option<EntryId>,
    /// Track time of the current entry at which this queued entry is promoted.
    trigger: Option<f32>,
    started: bool,
    completed: bool,
}

impl TrackEntry {
    fn new(
        track_index: usize,
        animation_index: usize,
        animation_name: &str,
        duration: f32,
        looped: bool,
        state: EntryState,
    ) -> Self {
        Self {
            track_index,
            animation_index,
            animation_name: animation_name.to_string(),
            duration,
            looped,
            delay: 0.0,
            mix_duration: 0.0,
            mix_time: 0.0,
            track_time: 0.0,
            animation_last_time: -1.0,
            state,
            mixing_from: None,
            trigger: None,
            started: false,
            completed: false,
        }
    }

    pub fn animation_time(&self) -> f32 {
        animation_time(self.track_time, self.duration, self.looped)
    }

    /// Track time at which this entry next reaches its natural exit.
    fn track_complete(&self) -> f32 {
        let duration = self.duration;
        if duration != 0.0 {
            if self.looped {
                return duration * (1.0 + (self.track_time / duration).floor());
            }
            if self.track_time < duration {
                return duration;
            }
        }
        self.track_time
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    fn record(&self, kind: EventKind) -> EventRecord {
        EventRecord::new(kind, self.track_index, &self.animation_name)
    }
}

fn animation_time(track_time: f32, duration: f32, looped: bool) -> f32 {
    if looped {
        if duration.abs() <= TIME_EPSILON {
            return 0.0;
        }
        let t = track_time % duration;
        if t < 0.0 { t + duration } else { t }
    } else {
        track_time.min(duration)
    }
}

#[derive(Debug, Default)]
struct Track {
    current: Option<EntryId>,
    queue: VecDeque<EntryId>,
}

impl Track {
    fn is_empty(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }
}

/// One contribution to the blended pose of a track.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseLayer {
    pub track_index: usize,
    pub animation: String,
    pub time: f32,
    pub alpha: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackState {
    pub index: usize,
    pub animation: Option<String>,
    pub time: f32,
    #[serde(rename = "loop")]
    pub looped: bool,
    pub queued: usize,
}

/// Multi-track queue-and-mix state machine of one instance.
#[derive(Debug)]
pub struct AnimationState {
    data: AnimationStateData,
    tracks: BTreeMap<usize, Track>,
    entries: Vec<EntrySlot>,
    free_list: Vec<usize>,
}

impl AnimationState {
    pub fn new(data: AnimationStateData) -> Self {
        Self {
            data,
            tracks: BTreeMap::new(),
            entries: Vec::new(),
            free_list: Vec::new(),
        }
    }

    pub fn data(&self) -> &AnimationStateData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut AnimationStateData {
        &mut self.data
    }

    pub fn tracks_len(&self) -> usize {
        self.tracks.len()
    }

    pub fn current(&self, track_index: usize) -> Option<&TrackEntry> {
        let id = self.tracks.get(&track_index)?.current?;
        self.entry(id)
    }

    pub fn queued(&self, track_index: usize) -> Vec<&TrackEntry> {
        self.tracks
            .get(&track_index)
            .map(|track| track.queue.iter().filter_map(|id| self.entry(*id)).collect())
            .unwrap_or_default()
    }

    pub fn mixing_from(&self, track_index: usize) -> Option<&TrackEntry> {
        let id = self.current(track_index)?.mixing_from?;
        self.entry(id)
    }

    /// Replaces the track's entries with `name`. Discarded entries emit nothing; the new entry
    /// emits `start` on the next update.
    pub fn set_animation(
        &mut self,
        track_index: usize,
        name: &str,
        looped: bool,
    ) -> Result<(), Error> {
        let (animation_index, duration) = self.resolve(name)?;
        self.clear_track(track_index);
        let id = self.alloc_entry(TrackEntry::new(
            track_index,
            animation_index,
            name,
            duration,
            looped,
            EntryState::Active,
        ));
        self.tracks.entry(track_index).or_default().current = Some(id);
        Ok(())
    }

    pub fn add_animation(
        &mut self,
        track_index: usize,
        name: &str,
        looped: bool,
        delay: f32,
    ) -> Result<(), Error> {
        if !delay.is_finite() || delay < 0.0 {
            return Err(Error::InvalidValue {
                message: "delay must be finite and >= 0".to_string(),
            });
        }
        let (animation_index, duration) = self.resolve(name)?;
        let mut entry = TrackEntry::new(
            track_index,
            animation_index,
            name,
            duration,
            looped,
            EntryState::Queued,
        );
        entry.delay = delay;
        let id = self.alloc_entry(entry);
        self.tracks.entry(track_index).or_default().queue.push_back(id);
        self.arm_front(track_index);
        Ok(())
    }

    /// Drops every entry of the track without emitting events.
    pub fn clear_track(&mut self, track_index: usize) {
        let Some(track) = self.tracks.remove(&track_index) else {
            return;
        };
        if let Some(current) = track.current {
            if let Some(from) = self.entry(current).and_then(|e| e.mixing_from) {
                self.free_entry(from);
            }
            self.free_entry(current);
        }
        for id in track.queue {
            self.free_entry(id);
        }
    }

    pub fn clear_tracks(&mut self) {
        let indices = self.tracks.keys().copied().collect::<Vec<_>>();
        for index in indices {
            self.clear_track(index);
        }
    }

    /// Advances every track by `delta` seconds (already scaled; non-positive values freeze the
    /// clocks) and returns the lifecycle records in emission order, track by track.
    pub fn update(&mut self, delta: f32) -> Vec<EventRecord> {
        let delta = if delta.is_finite() && delta > 0.0 {
            delta
        } else {
            0.0
        };
        let mut out = Vec::new();
        let indices = self.tracks.keys().copied().collect::<Vec<_>>();
        for track_index in indices {
            self.update_track(track_index, delta, &mut out);
        }
        self.tracks.retain(|_, track| !track.is_empty());
        out
    }

    fn update_track(&mut self, track_index: usize, delta: f32, out: &mut Vec<EventRecord>) {
        if let Some(current_id) = self.track_current(track_index) {
            if let Some(entry) = self.entry_mut(current_id) {
                if !entry.started {
                    entry.started = true;
                    out.push(entry.record(EventKind::Start));
                }
            }
            self.update_mixing(current_id, delta, out);
        }

        let mut budget = delta;
        loop {
            match self.track_current(track_index) {
                None => {
                    let Some(front_id) = self.track_front(track_index) else {
                        break;
                    };
                    let Some(front) = self.entry_mut(front_id) else {
                        break;
                    };
                    if front.delay > budget + TIME_EPSILON {
                        front.delay -= budget;
                        break;
                    }
                    budget = (budget - front.delay).max(0.0);
                    self.promote(track_index, None, out);
                }
                Some(current_id) => {
                    let Some(current) = self.entry(current_id) else {
                        break;
                    };
                    let start_time = current.track_time;
                    let trigger = self
                        .track_front(track_index)
                        .and_then(|id| self.entry(id))
                        .and_then(|front| front.trigger);
                    let step = match trigger {
                        Some(trigger) => (trigger - start_time).clamp(0.0, budget),
                        None => budget,
                    };
                    self.advance_entry(current_id, step, out);
                    budget -= step;

                    if trigger.is_some_and(|t| start_time + step + TIME_EPSILON >= t) {
                        self.promote(track_index, Some(current_id), out);
                        continue;
                    }

                    let finished = self
                        .entry(current_id)
                        .is_some_and(|e| !e.looped && e.completed);
                    if finished && self.track_front(track_index).is_none() {
                        if let Some(from) = self.entry(current_id).and_then(|e| e.mixing_from) {
                            self.end_entry(from, out);
                        }
                        self.end_entry(current_id, out);
                        if let Some(track) = self.tracks.get_mut(&track_index) {
                            track.current = None;
                        }
                    }
                    break;
                }
            }
        }
    }

    /// Progresses a running mix. The outgoing entry keeps its clock for the pose but emits nothing.
    fn update_mixing(&mut self, current_id: EntryId, delta: f32, out: &mut Vec<EventRecord>) {
        let Some(current) = self.entry(current_id) else {
            return;
        };
        let Some(from_id) = current.mixing_from else {
            return;
        };
        let mix_time = current.mix_time + delta;
        let mix_duration = current.mix_duration;

        if let Some(from) = self.entry_mut(from_id) {
            from.track_time += delta;
            from.animation_last_time = from.animation_time();
        }

        let done = mix_time + TIME_EPSILON >= mix_duration;
        if done {
            self.end_entry(from_id, out);
        }
        if let Some(current) = self.entry_mut(current_id) {
            if done {
                current.mix_time = mix_duration;
                current.mixing_from = None;
                current.state = EntryState::Active;
            } else {
                current.mix_time = mix_time;
            }
        }
    }

    fn advance_entry(&mut self, id: EntryId, step: f32, out: &mut Vec<EventRecord>) {
        let Some(entry) = self.entry(id) else {
            return;
        };
        let last_track_time = entry.track_time;
        let track_time = last_track_time + step;
        let time = animation_time(track_time, entry.duration, entry.looped);
        let duration = entry.duration;

        let mut events = Vec::new();
        if let Some(timeline) = self
            .data
            .skeleton_data
            .animations
            .get(entry.animation_index)
            .and_then(|a| a.event_timeline.as_ref())
        {
            collect_events(
                timeline,
                entry.animation_last_time,
                time,
                entry.looped,
                duration,
                &mut events,
            );
        }

        // At most one `complete` per step, however many loop boundaries it crosses.
        let complete = if entry.completed && (!entry.looped || duration <= TIME_EPSILON) {
            false
        } else if entry.looped && duration > TIME_EPSILON {
            let cycles = ((track_time + TIME_EPSILON) / duration).floor();
            let last_cycles = ((last_track_time + TIME_EPSILON) / duration).floor();
            cycles > last_cycles
        } else {
            track_time + TIME_EPSILON >= duration
        };

        // Markers of a step always precede its completion.
        for event in &events {
            out.push(entry.record(EventKind::from(event)));
        }
        if complete {
            out.push(entry.record(EventKind::Complete));
        }

        if let Some(entry) = self.entry_mut(id) {
            entry.track_time = track_time;
            entry.animation_last_time = time;
            if complete {
                entry.completed = true;
            }
        }
    }

    /// Moves the front queued entry into `current`, resolving the mix against `from`.
    fn promote(&mut self, track_index: usize, from: Option<EntryId>, out: &mut Vec<EventRecord>) {
        let Some(next_id) = self
            .tracks
            .get_mut(&track_index)
            .and_then(|track| track.queue.pop_front())
        else {
            return;
        };

        let mut mix = 0.0;
        if let Some(from_id) = from {
            if let Some(older) = self.entry(from_id).and_then(|e| e.mixing_from) {
                self.end_entry(older, out);
            }
            let next_index = self.entry(next_id).map(|next| next.animation_index);
            if let Some(from_entry) = self.entry_mut(from_id) {
                from_entry.mixing_from = None;
                // A finished one-shot has nothing left to interrupt.
                if from_entry.looped || !from_entry.completed {
                    out.push(from_entry.record(EventKind::Interrupt));
                }
                let from_index = from_entry.animation_index;
                if let Some(to_index) = next_index {
                    mix = self.data.mix_duration(from_index, to_index);
                }
            }
        }

        if let Some(next) = self.entry_mut(next_id) {
            next.delay = 0.0;
            next.trigger = None;
            next.started = true;
            next.state = EntryState::Active;
            out.push(next.record(EventKind::Start));
        }

        if let Some(from_id) = from {
            if mix > 0.0 {
                if let Some(from_entry) = self.entry_mut(from_id) {
                    from_entry.state = EntryState::Ending;
                }
                if let Some(next) = self.entry_mut(next_id) {
                    next.state = EntryState::MixingIn;
                    next.mixing_from = Some(from_id);
                    next.mix_duration = mix;
                    next.mix_time = 0.0;
                }
            } else {
                self.end_entry(from_id, out);
            }
        }

        if let Some(track) = self.tracks.get_mut(&track_index) {
            track.current = Some(next_id);
        }
        self.arm_front(track_index);
    }

    /// Anchors the front queued entry's delay at the current entry's next exit point.
    fn arm_front(&mut self, track_index: usize) {
        let Some(track) = self.tracks.get(&track_index) else {
            return;
        };
        let (Some(current_id), Some(front_id)) = (track.current, track.queue.front().copied())
        else {
            return;
        };
        let Some(exit) = self.entry(current_id).map(TrackEntry::track_complete) else {
            return;
        };
        if let Some(front) = self.entry_mut(front_id) {
            if front.trigger.is_none() {
                front.trigger = Some(exit + front.delay);
            }
        }
    }

    fn end_entry(&mut self, id: EntryId, out: &mut Vec<EventRecord>) {
        if let Some(entry) = self.entry(id) {
            out.push(entry.record(EventKind::End));
            out.push(entry.record(EventKind::Dispose));
        }
        self.free_entry(id);
    }

    /// Blend layers per track in index order; an outgoing entry precedes the entry mixing in.
    pub fn pose(&self) -> Vec<PoseLayer> {
        let mut layers = Vec::new();
        for (&track_index, track) in &self.tracks {
            let Some(current) = track.current.and_then(|id| self.entry(id)) else {
                continue;
            };
            let mut alpha = 1.0;
            if let Some(from) = current.mixing_from.and_then(|id| self.entry(id)) {
                alpha = if current.mix_duration > 0.0 {
                    (current.mix_time / current.mix_duration).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                layers.push(PoseLayer {
                    track_index,
                    animation: from.animation_name.clone(),
                    time: from.animation_time(),
                    alpha: 1.0 - alpha,
                });
            }
            layers.push(PoseLayer {
                track_index,
                animation: current.animation_name.clone(),
                time: current.animation_time(),
                alpha,
            });
        }
        layers
    }

    pub fn track_states(&self) -> Vec<TrackState> {
        self.tracks
            .iter()
            .map(|(&index, track)| {
                let current = track.current.and_then(|id| self.entry(id));
                TrackState {
                    index,
                    animation: current.map(|e| e.animation_name.clone()),
                    time: current.map(TrackEntry::animation_time).unwrap_or(0.0),
                    looped: current.is_some_and(|e| e.looped),
                    queued: track.queue.len(),
                }
            })
            .collect()
    }

    /// Verifies the structural invariants of every track and the entry arena.
    pub fn check_invariants(&self) -> Result<(), Error> {
        let fail = |message: String| Err(Error::Invariant { message });
        let mut referenced = 0usize;

        for (&index, track) in &self.tracks {
            if let Some(id) = track.current {
                let Some(current) = self.entry(id) else {
                    return fail(format!("track {index}: current entry is stale"));
                };
                referenced += 1;
                if current.track_index != index {
                    return fail(format!("track {index}: current entry belongs elsewhere"));
                }
                match (current.state, current.mixing_from) {
                    (EntryState::Active, None) => {}
                    (EntryState::MixingIn, Some(from_id)) => {
                        let Some(from) = self.entry(from_id) else {
                            return fail(format!("track {index}: outgoing entry is stale"));
                        };
                        referenced += 1;
                        if from.state != EntryState::Ending || from.mixing_from.is_some() {
                            return fail(format!("track {index}: outgoing entry is not ending"));
                        }
                        if current.mix_duration <= 0.0 {
                            return fail(format!("track {index}: mix without duration"));
                        }
                    }
                    (state, _) => {
                        return fail(format!("track {index}: current entry in state {state:?}"));
                    }
                }
            }
            for id in &track.queue {
                let Some(entry) = self.entry(*id) else {
                    return fail(format!("track {index}: queued entry is stale"));
                };
                referenced += 1;
                if entry.state != EntryState::Queued {
                    return fail(format!("track {index}: queued entry in state {:?}", entry.state));
                }
                if !entry.delay.is_finite() || entry.delay < 0.0 {
                    return fail(format!("track {index}: negative delay"));
                }
            }
        }

        let live = self.entries.iter().filter(|s| s.entry.is_some()).count();
        if live != referenced {
            return fail(format!("{live} live entries, {referenced} referenced by tracks"));
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<(usize, f32), Error> {
        self.data
            .skeleton_data
            .animation(name)
            .map(|(index, animation)| (index, animation.duration))
            .ok_or_else(|| Error::UnknownAnimation {
                name: name.to_string(),
            })
    }

    fn track_current(&self, track_index: usize) -> Option<EntryId> {
        self.tracks.get(&track_index)?.current
    }

    fn track_front(&self, track_index: usize) -> Option<EntryId> {
        self.tracks.get(&track_index)?.queue.front().copied()
    }

    fn alloc_entry(&mut self, entry: TrackEntry) -> EntryId {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.entries[index];
            slot.entry = Some(entry);
            EntryId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.entries.len();
            self.entries.push(EntrySlot {
                generation: 0,
                entry: Some(entry),
            });
            EntryId {
                index,
                generation: 0,
            }
        }
    }

    fn entry(&self, id: EntryId) -> Option<&TrackEntry> {
        let slot = self.entries.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, id: EntryId) -> Option<&mut TrackEntry> {
        let slot = self.entries.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    fn free_entry(&mut self, id: EntryId) {
        let Some(slot) = self.entries.get_mut(id.index) else {
            return;
        };
        if slot.generation != id.generation {
            return;
        }
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index);
    }

    #[cfg(test)]
    pub(crate) fn corrupt_for_tests(&mut self, track_index: usize) {
        if let Some(id) = self.track_current(track_index) {
            if let Some(entry) = self.entry_mut(id) {
                entry.state = EntryState::Queued;
            }
        }
    }
}

fn collect_events(
    timeline: &EventTimeline,
    last_time: f32,
    time: f32,
    looped: bool,
    duration: f32,
    out: &mut Vec<Event>,
) {
    if timeline.events.is_empty() {
        return;
    }

    // When a loop wraps, the second segment only runs once `time` reaches the first marker. This
    // prevents duplicates when modulo arithmetic lands slightly below the first frame.
    let Some(first_time_in_range) = timeline
        .events
        .iter()
        .find(|ev| ev.time + TIME_EPSILON >= 0.0 && ev.time <= duration + TIME_EPSILON)
        .map(|ev| ev.time)
    else {
        return;
    };

    let mut emit_range = |from: f32, to: f32| {
        let to = to.min(duration);
        for ev in &timeline.events {
            if ev.time > duration + TIME_EPSILON {
                continue;
            }
            // Frames fire for `from < t <= to`, no epsilon on `to`.
            if ev.time > from && ev.time <= to {
                out.push(ev.clone());
            }
        }
    };

    if last_time < 0.0 {
        emit_range(-1.0, time);
        return;
    }

    if looped && duration.abs() > TIME_EPSILON && time + TIME_EPSILON < last_time {
        emit_range(last_time, duration);
        if time >= first_time_in_range {
            emit_range(-1.0, time);
        }
    } else {
        emit_range(last_time, time);
    }
}

#[cfg(test)]
pub(super) fn collect_events_for_tests(
    timeline: &EventTimeline,
    last_time: f32,
    time: f32,
    looped: bool,
    duration: f32,
) -> Vec<Event> {
    let mut out = Vec::new();
    collect_events(timeline, last_time, time, looped, duration, &mut out);
    out
}
