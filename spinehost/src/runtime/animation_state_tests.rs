use super::animation_state::collect_events_for_tests;
use crate::runtime::{AnimationState, AnimationStateData, EntryState};
use crate::test_fixtures::{SKELETON_JSON, describe};
use crate::{Error, Event, EventKind, EventTimeline, SkeletonData};

fn setup() -> AnimationState {
    let data = SkeletonData::from_json_str(SKELETON_JSON).unwrap();
    AnimationState::new(AnimationStateData::new(data))
}

fn run(state: &mut AnimationState, step: f32, steps: usize) -> Vec<String> {
    let mut out = Vec::new();
    for _ in 0..steps {
        out.extend(describe(&state.update(step)));
        state.check_invariants().unwrap();
    }
    out
}

fn marker(time: f32, name: &str) -> Event {
    Event {
        time,
        name: name.to_string(),
        int_value: 0,
        float_value: 0.0,
        string: String::new(),
        audio_path: String::new(),
        volume: 1.0,
        balance: 0.0,
    }
}

#[test]
fn set_animation_starts_on_next_update_and_fires_markers_at_zero() {
    let mut state = setup();
    state.set_animation(0, "walk", true).unwrap();
    assert_eq!(state.current(0).unwrap().state, EntryState::Active);

    let records = state.update(0.0);
    assert_eq!(
        describe(&records),
        vec!["start walk", "event walk footstep"]
    );
    let payload = records[1].payload().unwrap();
    assert_eq!(payload.string_value, "left");
    assert_eq!(payload.int_value, 1);
    assert_eq!(payload.time, 0.0);

    assert!(state.update(0.0).is_empty());
}

#[test]
fn marker_keys_override_setup_values() {
    let mut state = setup();
    state.set_animation(0, "walk", false).unwrap();
    state.update(0.0);
    let records = state.update(0.5);
    assert_eq!(describe(&records), vec!["event walk footstep"]);
    let payload = records[0].payload().unwrap();
    assert_eq!(payload.string_value, "right");
    assert_eq!(payload.int_value, 1);
    assert!((payload.float_value - 0.5).abs() <= 1.0e-6);
}

#[test]
fn markers_precede_complete_in_the_same_step() {
    let mut state = setup();
    state.set_animation(0, "jump", false).unwrap();
    assert_eq!(describe(&state.update(0.0)), vec!["start jump"]);

    let records = state.update(0.6);
    assert_eq!(
        describe(&records),
        vec![
            "event jump shout",
            "complete jump",
            "end jump",
            "dispose jump"
        ]
    );
    let payload = records[0].payload().unwrap();
    assert_eq!(payload.volume, 1.0);
    assert_eq!(payload.balance, 0.0);
    assert_eq!(state.tracks_len(), 0);
    state.check_invariants().unwrap();
}

#[test]
fn queued_one_shot_after_loop_starts_once_completes_then_idles() {
    let mut state = setup();
    state.set_animation(0, "idle", true).unwrap();
    state.add_animation(0, "jump", false, 0.0).unwrap();

    let rows = run(&mut state, 1.0 / 60.0, 180);
    let count = |row: &str| rows.iter().filter(|r| r.as_str() == row).count();
    assert_eq!(count("start jump"), 1);
    assert_eq!(count("complete jump"), 1);
    assert_eq!(count("interrupt idle"), 1);

    let position = |row: &str| rows.iter().position(|r| r == row).unwrap();
    assert!(position("start jump") < position("complete jump"));
    assert!(position("complete jump") < position("end jump"));
    assert!(position("end jump") < position("dispose jump"));
    assert_eq!(state.tracks_len(), 0);
    assert!(state.current(0).is_none());
}

#[test]
fn queued_entries_become_active_in_queue_order() {
    let mut state = setup();
    state.set_animation(0, "run", false).unwrap();
    state.add_animation(0, "walk", false, 0.0).unwrap();
    state.add_animation(0, "jump", false, 0.0).unwrap();
    assert_eq!(
        state
            .queued(0)
            .iter()
            .map(|e| e.animation_name.as_str())
            .collect::<Vec<_>>(),
        vec!["walk", "jump"]
    );

    let rows = run(&mut state, 0.1, 40);
    let starts = rows
        .iter()
        .filter(|r| r.starts_with("start "))
        .cloned()
        .collect::<Vec<_>>();
    assert_eq!(starts, vec!["start run", "start walk", "start jump"]);
}

#[test]
fn delay_counts_from_completion_of_previous_entry() {
    let mut state = setup();
    state.set_animation(0, "run", false).unwrap();
    state.add_animation(0, "walk", true, 0.25).unwrap();

    assert_eq!(run(&mut state, 0.0, 1), vec!["start run"]);
    assert!(run(&mut state, 0.25, 1).is_empty());
    assert_eq!(run(&mut state, 0.25, 1), vec!["complete run"]);
    assert_eq!(state.current(0).unwrap().animation_name, "run");
    assert_eq!(
        run(&mut state, 0.25, 1),
        vec![
            "start walk",
            "end run",
            "dispose run",
            "event walk footstep"
        ]
    );
    assert_eq!(state.current(0).unwrap().animation_name, "walk");
}

#[test]
fn delay_on_idle_track_counts_from_queueing() {
    let mut state = setup();
    state.add_animation(2, "run", false, 0.5).unwrap();
    assert!(run(&mut state, 0.25, 1).is_empty());
    let queued = state.queued(2);
    assert_eq!(queued.len(), 1);
    assert!((queued[0].delay - 0.25).abs() <= 1.0e-6);
    assert_eq!(queued[0].state, EntryState::Queued);

    assert_eq!(run(&mut state, 0.25, 1), vec!["start run"]);
    assert_eq!(state.current(2).unwrap().state, EntryState::Active);
}

#[test]
fn leftover_time_carries_into_promoted_entry() {
    let mut state = setup();
    state.add_animation(0, "walk", true, 0.25).unwrap();
    state.update(0.75);
    let current = state.current(0).unwrap();
    assert_eq!(current.animation_name, "walk");
    assert!((current.track_time - 0.5).abs() <= 1.0e-6);
}

#[test]
fn mix_ends_outgoing_after_exact_mix_duration() {
    let mut state = setup();
    state.data_mut().set_mix("walk", "run", 0.3).unwrap();
    state.set_animation(0, "walk", true).unwrap();
    state.add_animation(0, "run", false, 0.0).unwrap();

    run(&mut state, 0.0, 1);
    assert!(run(&mut state, 0.25, 3).iter().all(|r| !r.contains("run")));
    assert_eq!(
        run(&mut state, 0.25, 1),
        vec![
            "event walk footstep",
            "complete walk",
            "interrupt walk",
            "start run"
        ]
    );
    assert_eq!(state.current(0).unwrap().state, EntryState::MixingIn);
    assert_eq!(state.mixing_from(0).unwrap().state, EntryState::Ending);

    assert!(run(&mut state, 0.1, 1).is_empty());
    let pose = state.pose();
    assert_eq!(pose.len(), 2);
    assert_eq!(pose[0].animation, "walk");
    assert_eq!(pose[1].animation, "run");
    assert!((pose[1].alpha - 1.0 / 3.0).abs() <= 1.0e-4);
    assert!((pose[0].alpha + pose[1].alpha - 1.0).abs() <= 1.0e-6);

    assert!(run(&mut state, 0.1, 1).is_empty());
    assert_eq!(run(&mut state, 0.1, 1), vec!["end walk", "dispose walk"]);
    assert_eq!(state.current(0).unwrap().state, EntryState::Active);
    assert!(state.mixing_from(0).is_none());
    assert_eq!(state.pose().len(), 1);
}

#[test]
fn promotion_during_running_mix_disposes_older_outgoing_first() {
    let mut state = setup();
    state.data_mut().set_mix("walk", "run", 1.0).unwrap();
    state.data_mut().set_mix("run", "idle", 0.2).unwrap();
    state.set_animation(0, "walk", true).unwrap();
    state.add_animation(0, "run", false, 0.0).unwrap();
    run(&mut state, 0.0, 1);
    run(&mut state, 0.25, 4);
    assert_eq!(state.current(0).unwrap().animation_name, "run");

    state.add_animation(0, "idle", true, 0.0).unwrap();
    assert!(run(&mut state, 0.25, 1).is_empty());
    assert_eq!(
        run(&mut state, 0.25, 1),
        vec!["complete run", "end walk", "dispose walk", "start idle"]
    );
    assert_eq!(state.mixing_from(0).unwrap().animation_name, "run");
}

#[test]
fn zero_mix_disposes_outgoing_right_after_start() {
    let mut state = setup();
    state.set_animation(0, "idle", true).unwrap();
    state.add_animation(0, "run", false, 0.0).unwrap();
    run(&mut state, 0.0, 1);
    assert_eq!(
        run(&mut state, 0.5, 2),
        vec![
            "complete idle",
            "interrupt idle",
            "start run",
            "end idle",
            "dispose idle"
        ]
    );
}

#[test]
fn looping_entry_completes_once_per_boundary() {
    let mut state = setup();
    state.set_animation(0, "idle", true).unwrap();
    let rows = run(&mut state, 0.5, 4);
    assert_eq!(
        rows,
        vec!["start idle", "complete idle", "complete idle"]
    );
    assert!(!state.current(0).unwrap().animation_name.is_empty());
}

#[test]
fn large_step_completes_a_loop_at_most_once() {
    let mut state = setup();
    state.set_animation(0, "run", true).unwrap();
    assert_eq!(run(&mut state, 0.0, 1), vec!["start run"]);

    let records = state.update(100_000.0);
    assert_eq!(describe(&records), vec!["complete run"]);
    assert!(state.current(0).unwrap().is_complete());

    let records = state.update(1.0e9);
    assert_eq!(records.len(), 1);
    state.check_invariants().unwrap();
}

#[test]
fn tracks_are_processed_in_index_order() {
    let mut state = setup();
    state.set_animation(3, "run", false).unwrap();
    state.set_animation(1, "idle", true).unwrap();
    assert_eq!(run(&mut state, 0.0, 1), vec!["start idle", "start run"]);
    let records = state.update(0.0);
    assert!(records.is_empty());
    let tracks = state.track_states();
    assert_eq!(tracks.iter().map(|t| t.index).collect::<Vec<_>>(), vec![1, 3]);
}

#[test]
fn set_animation_discards_queue_without_events() {
    let mut state = setup();
    state.set_animation(0, "idle", true).unwrap();
    state.add_animation(0, "walk", false, 0.0).unwrap();
    run(&mut state, 0.1, 1);
    state.set_animation(0, "run", false).unwrap();
    assert!(state.queued(0).is_empty());
    assert_eq!(run(&mut state, 0.0, 1), vec!["start run"]);
}

#[test]
fn clear_tracks_is_silent_and_idempotent() {
    let mut state = setup();
    state.set_animation(0, "idle", true).unwrap();
    state.set_animation(1, "walk", true).unwrap();
    state.add_animation(1, "run", false, 0.0).unwrap();
    run(&mut state, 0.1, 1);

    state.clear_tracks();
    state.check_invariants().unwrap();
    assert_eq!(state.tracks_len(), 0);
    state.clear_tracks();
    state.clear_track(7);
    assert_eq!(state.tracks_len(), 0);
    assert!(state.update(0.5).is_empty());
    assert!(state.pose().is_empty());
    state.check_invariants().unwrap();
}

#[test]
fn non_positive_delta_freezes_clock() {
    let mut state = setup();
    state.set_animation(0, "idle", true).unwrap();
    run(&mut state, 0.25, 1);
    let before = state.current(0).unwrap().track_time;
    assert!(state.update(-1.0).is_empty());
    assert!(state.update(f32::NAN).is_empty());
    assert_eq!(state.current(0).unwrap().track_time, before);
}

#[test]
fn invalid_arguments_are_rejected_without_mutation() {
    let mut state = setup();
    assert!(matches!(
        state.set_animation(0, "fly", true),
        Err(Error::UnknownAnimation { .. })
    ));
    assert!(matches!(
        state.add_animation(0, "walk", true, -0.1),
        Err(Error::InvalidValue { .. })
    ));
    assert!(state.add_animation(0, "walk", true, f32::INFINITY).is_err());
    assert!(matches!(
        state.data_mut().set_mix("walk", "fly", 0.2),
        Err(Error::UnknownAnimation { .. })
    ));
    assert!(state.data_mut().set_mix("walk", "run", -1.0).is_err());
    assert!(state.data_mut().set_mix("walk", "run", f32::NAN).is_err());
    assert_eq!(state.tracks_len(), 0);
    assert_eq!(state.data().mix("walk", "run"), 0.0);

    state.data_mut().set_mix("walk", "run", 0.2).unwrap();
    state.data_mut().set_mix("walk", "run", 0.4).unwrap();
    assert_eq!(state.data().mix("walk", "run"), 0.4);
    assert_eq!(state.data().mix("run", "walk"), 0.0);
}

#[test]
fn invariant_check_detects_corrupted_track() {
    let mut state = setup();
    state.set_animation(0, "idle", true).unwrap();
    state.check_invariants().unwrap();
    state.corrupt_for_tests(0);
    assert!(matches!(
        state.check_invariants(),
        Err(Error::Invariant { .. })
    ));
}

#[test]
fn events_wrap_around_loop_boundary() {
    let timeline = EventTimeline {
        events: vec![marker(0.0, "a"), marker(0.5, "b"), marker(1.0, "c")],
    };
    let names = |events: Vec<Event>| events.into_iter().map(|e| e.name).collect::<Vec<_>>();

    assert_eq!(
        names(collect_events_for_tests(&timeline, -1.0, 0.0, true, 1.0)),
        vec!["a"]
    );
    assert_eq!(
        names(collect_events_for_tests(&timeline, 0.0, 0.75, true, 1.0)),
        vec!["b"]
    );
    assert_eq!(
        names(collect_events_for_tests(&timeline, 0.75, 0.1, true, 1.0)),
        vec!["c", "a"]
    );
    assert!(collect_events_for_tests(&timeline, 0.75, 0.75, false, 1.0).is_empty());
}

#[test]
fn start_records_carry_track_and_kind() {
    let mut state = setup();
    state.set_animation(4, "run", false).unwrap();
    let records = state.update(0.0);
    assert_eq!(records[0].kind, EventKind::Start);
    assert_eq!(records[0].track_index, 4);
    assert_eq!(records[0].animation, "run");
}
