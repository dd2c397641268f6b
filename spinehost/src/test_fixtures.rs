use crate::{EventKind, EventRecord};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Four animations (alphabetical: idle, jump, run, walk) and two skins.
///
/// - `idle`: 1.0s, no markers.
/// - `jump`: 0.6s, `shout` (audio) marker at 0.6.
/// - `run`: 0.5s, no markers.
/// - `walk`: 1.0s, `footstep` markers at 0.0 and 0.5.
pub(crate) const SKELETON_JSON: &str = r#"
{
  "skeleton": { "spine": "4.2.43" },
  "bones": [
    { "name": "root" },
    { "name": "hip", "parent": "root", "x": 2, "y": 40, "length": 20 }
  ],
  "slots": [ { "name": "body", "bone": "hip", "attachment": "body" } ],
  "skins": [
    { "name": "default", "attachments": { "body": { "body": { "path": "body" } } } },
    { "name": "alt", "attachments": { "body": { "body": { "path": "body-alt" } } } }
  ],
  "events": {
    "footstep": { "int": 1, "float": 0.5, "string": "left" },
    "shout": { "audio": "shout.ogg", "volume": 0.8, "balance": -0.25 }
  },
  "animations": {
    "walk": {
      "bones": { "hip": { "translate": [ { "time": 0 }, { "time": 1.0, "x": 4 } ] } },
      "events": [
        { "time": 0, "name": "footstep" },
        { "time": 0.5, "name": "footstep", "string": "right" }
      ]
    },
    "run": {
      "bones": { "hip": { "translate": [ { "time": 0 }, { "time": 0.5, "x": 8 } ] } }
    },
    "idle": {
      "bones": { "hip": { "rotate": [ { "time": 0 }, { "time": 1.0, "value": 5 } ] } }
    },
    "jump": {
      "bones": { "hip": { "translate": [ { "time": 0 }, { "time": 0.6, "y": 30 } ] } },
      "events": [ { "time": 0.6, "name": "shout" } ]
    }
  }
}
"#;

pub(crate) const ATLAS: &str = "skeleton.png
size: 64,64
filter: Linear,Linear
pma: true
body
  bounds: 0,0,32,32
body-alt
  bounds: 32,0,32,32
";

/// Writes the fixture pair into a fresh temporary directory.
pub(crate) fn write_assets(tag: &str) -> (PathBuf, PathBuf) {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("spinehost-{}-{tag}-{n}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let skeleton = dir.join("skeleton.json");
    let atlas = dir.join("skeleton.atlas");
    std::fs::write(&skeleton, SKELETON_JSON).unwrap();
    std::fs::write(&atlas, ATLAS).unwrap();
    (skeleton, atlas)
}

/// `"start walk"`, `"event footstep"`, ... for compact order assertions.
pub(crate) fn describe(records: &[EventRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| match &r.kind {
            EventKind::Event { data } => format!("event {} {}", r.animation, data.name),
            _ => format!("{} {}", r.type_name(), r.animation),
        })
        .collect()
}
