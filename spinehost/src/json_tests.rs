use crate::test_fixtures::SKELETON_JSON;
use crate::{Error, SkeletonData};

#[test]
fn fixture_lists_animations_alphabetically_and_skins_in_export_order() {
    let data = SkeletonData::from_json_str(SKELETON_JSON).expect("parse");
    assert_eq!(data.spine_version.as_deref(), Some("4.2.43"));
    assert_eq!(data.animation_names(), vec!["idle", "jump", "run", "walk"]);
    assert_eq!(data.skin_names(), vec!["default", "alt"]);

    let (index, walk) = data.animation("walk").expect("walk");
    assert_eq!(index, 3);
    assert!((walk.duration - 1.0).abs() < 1e-6);
    let (_, run) = data.animation("run").expect("run");
    assert!((run.duration - 0.5).abs() < 1e-6);

    let alt = data.skin("alt").expect("alt skin");
    assert_eq!(alt.attachment_path(0, "body"), Some("body-alt"));
    assert_eq!(alt.attachment_count(), 1);
    assert_eq!(data.slots[0].bone, 1);
    assert_eq!(data.bones[1].parent, Some(0));
}

#[test]
fn json_events_parse_defaults_and_key_overrides() {
    let json = r#"
{
  "skeleton": { "spine": "4.2.11" },
  "bones": [ { "name": "root" } ],
  "events": {
    "hit": { "int": 3, "float": 0.75, "string": "base", "audio": "hit.wav", "volume": 0.4, "balance": 0.3 },
    "mute": { "int": 2, "volume": 0.1, "balance": 0.6 }
  },
  "animations": {
    "attack": {
      "events": [
        { "time": 0.2, "name": "hit" },
        { "time": 0.4, "name": "hit", "int": 5, "float": 1.25, "string": "crit", "volume": 0.6, "balance": -0.4 },
        { "time": 0.8, "name": "mute", "volume": 0.3, "balance": -0.7 }
      ]
    }
  }
}
"#;

    let data = SkeletonData::from_json_str(json).expect("parse");

    let hit = data.events.get("hit").expect("event data hit");
    assert_eq!(hit.int_value, 3);
    assert_eq!(hit.string, "base");
    assert_eq!(hit.audio_path, "hit.wav");
    assert!((hit.volume - 0.4).abs() < 1e-6);
    assert!((hit.balance - 0.3).abs() < 1e-6);

    // Without an audio path the setup volume/balance are not read.
    let mute = data.events.get("mute").expect("event data mute");
    assert!((mute.volume - 1.0).abs() < 1e-6);
    assert!(mute.balance.abs() < 1e-6);

    let (_, attack) = data.animation("attack").expect("attack");
    assert!((attack.duration - 0.8).abs() < 1e-6);
    let events = &attack.event_timeline.as_ref().expect("event timeline").events;
    assert_eq!(events.len(), 3);

    let first = &events[0];
    assert_eq!(first.int_value, 3);
    assert!((first.float_value - 0.75).abs() < 1e-6);
    assert_eq!(first.string, "base");
    assert!((first.volume - 1.0).abs() < 1e-6);
    assert!(first.balance.abs() < 1e-6);

    let second = &events[1];
    assert_eq!(second.int_value, 5);
    assert!((second.float_value - 1.25).abs() < 1e-6);
    assert_eq!(second.string, "crit");
    assert!((second.volume - 0.6).abs() < 1e-6);
    assert!((second.balance + 0.4).abs() < 1e-6);

    let third = &events[2];
    assert_eq!(third.name, "mute");
    assert_eq!(third.int_value, 2);
    assert!((third.volume - 1.0).abs() < 1e-6);
    assert!(third.balance.abs() < 1e-6);
}

#[test]
fn json_events_keep_file_order_for_same_time() {
    let json = r#"
{
  "bones": [ { "name": "root" } ],
  "events": { "a": {}, "b": {} },
  "animations": {
    "anim": {
      "events": [
        { "time": 0.5, "name": "b" },
        { "time": 0.25, "name": "a", "string": "early" },
        { "time": 0.5, "name": "a" }
      ]
    }
  }
}
"#;
    let data = SkeletonData::from_json_str(json).expect("parse");
    let (_, anim) = data.animation("anim").expect("anim");
    let names = anim
        .event_timeline
        .as_ref()
        .expect("timeline")
        .events
        .iter()
        .map(|e| (e.name.as_str(), e.time))
        .collect::<Vec<_>>();
    assert_eq!(names, vec![("a", 0.25), ("b", 0.5), ("a", 0.5)]);
}

#[test]
fn duration_is_latest_key_of_any_nested_timeline() {
    let json = r#"
{
  "bones": [ { "name": "root" } ],
  "slots": [ { "name": "s", "bone": "root" } ],
  "animations": {
    "mixed": {
      "slots": { "s": { "rgba": [ { "time": 0.1, "color": "ffffffff" }, { "time": 0.9, "color": "ff0000ff" } ] } },
      "bones": { "root": { "rotate": [ { "value": 10 }, { "time": 1.4, "value": 0 } ] } },
      "deform": { "default": { "s": { "mesh": [ { "time": 2.25 } ] } } },
      "drawOrder": [ { "time": 0.3 } ]
    },
    "empty": {}
  }
}
"#;
    let data = SkeletonData::from_json_str(json).expect("parse");
    let (_, mixed) = data.animation("mixed").expect("mixed");
    assert!((mixed.duration - 2.25).abs() < 1e-6);
    assert!(mixed.event_timeline.is_none());
    let (_, empty) = data.animation("empty").expect("empty");
    assert_eq!(empty.duration, 0.0);
}

#[test]
fn scale_multiplies_bone_positions_and_lengths() {
    let data = SkeletonData::from_json_str_with_scale(SKELETON_JSON, 0.5).expect("parse");
    let hip = &data.bones[1];
    assert!((hip.x - 1.0).abs() < 1e-6);
    assert!((hip.y - 20.0).abs() < 1e-6);
    assert!((hip.length - 10.0).abs() < 1e-6);

    assert!(matches!(
        SkeletonData::from_json_str_with_scale(SKELETON_JSON, 0.0),
        Err(Error::InvalidValue { .. })
    ));
}

#[test]
fn legacy_skin_map_is_accepted_with_default_first() {
    let json = r#"
{
  "bones": [ { "name": "root" } ],
  "slots": [ { "name": "s", "bone": "root" } ],
  "skins": {
    "armored": { "s": { "plate": { "name": "plate-v2" } } },
    "default": { "s": { "cloth": {} } }
  }
}
"#;
    let data = SkeletonData::from_json_str(json).expect("parse");
    assert_eq!(data.skin_names(), vec!["default", "armored"]);
    assert_eq!(
        data.skin("armored").unwrap().attachment_path(0, "plate"),
        Some("plate-v2")
    );
    assert_eq!(
        data.skin("default").unwrap().attachment_path(0, "cloth"),
        Some("cloth")
    );
}

#[test]
fn structural_errors_are_reported() {
    assert!(matches!(
        SkeletonData::from_json_str("{ not json"),
        Err(Error::JsonParse { .. })
    ));
    assert!(matches!(
        SkeletonData::from_json_str(r#"{ "skeleton": { "spine": "3.8.99" } }"#),
        Err(Error::JsonSpineVersion { .. })
    ));
    assert!(matches!(
        SkeletonData::from_json_str(r#"{ "bones": [ { "name": "a", "parent": "missing" } ] }"#),
        Err(Error::JsonUnknownBoneParent { .. })
    ));
    assert!(matches!(
        SkeletonData::from_json_str(r#"{ "slots": [ { "name": "s", "bone": "missing" } ] }"#),
        Err(Error::JsonUnknownSlotBone { .. })
    ));
    assert!(matches!(
        SkeletonData::from_json_str(
            r#"{ "bones": [ { "name": "root" } ], "skins": [ { "name": "default", "attachments": { "nope": {} } } ] }"#
        ),
        Err(Error::JsonUnknownSkinSlot { .. })
    ));
    assert!(matches!(
        SkeletonData::from_json_str(
            r#"{ "animations": { "a": { "events": [ { "time": 0.1, "name": "ghost" } ] } } }"#
        ),
        Err(Error::JsonUnknownEvent { .. })
    ));
}
