use serde_json::json;
use spinehost::{EventRecord, LoadOptions, Registry, RegistryConfig};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Plays `<animation>` on track 0 of a fresh instance and prints every delivered record as one
/// JSON line.
///
/// `event_dump <skeleton.json> <skeleton.atlas> [animation] [seconds] [--fps N] [--then NAME]`
fn main() {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut positional = Vec::<String>::new();
    let mut fps = 60.0f32;
    let mut then: Option<String> = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--fps" => {
                fps = args
                    .get(i + 1)
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60.0);
                i += 2;
            }
            "--then" => {
                then = args.get(i + 1).cloned();
                i += 2;
            }
            other => {
                positional.push(other.to_string());
                i += 1;
            }
        }
    }

    let skeleton_path = positional
        .first()
        .map(PathBuf::from)
        .expect("usage: event_dump <skeleton.json> <skeleton.atlas> [animation] [seconds]");
    let atlas_path = positional
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| skeleton_path.with_extension("atlas"));
    let animation = positional.get(2).cloned();
    let seconds: f32 = positional
        .get(3)
        .and_then(|v| v.parse().ok())
        .unwrap_or(2.0);

    let registry = Registry::new(RegistryConfig::default());
    let id = registry.create("event-dump").expect("create instance");
    registry
        .load(id, &skeleton_path, &atlas_path, &LoadOptions::default())
        .expect("load assets");

    let animation = animation
        .or_else(|| registry.animations(id).ok()?.into_iter().next())
        .expect("skeleton has no animations");

    let clock = Arc::new(Mutex::new(0.0f32));
    let now = Arc::clone(&clock);
    registry
        .set_event_callback(
            id,
            Some(Arc::new(move |record: &EventRecord| {
                let t = *now.lock().expect("clock");
                let line = json!({
                    "t": t,
                    "record": record,
                });
                println!("{line}");
            })),
        )
        .expect("set callback");

    registry
        .set_animation(id, 0, &animation, then.is_none())
        .expect("set animation");
    if let Some(next) = &then {
        registry
            .add_animation(id, 0, next, false, 0.0)
            .expect("add animation");
    }

    let step = 1.0 / fps.max(1.0);
    let frames = (seconds.max(0.0) / step).ceil() as usize;
    for _ in 0..frames {
        *clock.lock().expect("clock") += step;
        registry.update(id, step).expect("update");
        registry.render(id).expect("render");
    }

    let state = registry.state(id).expect("state");
    eprintln!("{}", state.to_json().expect("state json"));
    registry.destroy(id).expect("destroy");
}
