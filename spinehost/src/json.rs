use crate::{
    Animation, BoneData, Error, Event, EventData, EventTimeline, SkeletonData, SkinData, SlotData,
    is_supported_spine_version,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct Root {
    skeleton: Option<SkeletonHeader>,
    #[serde(default)]
    bones: Vec<BoneDef>,
    #[serde(default)]
    slots: Vec<SlotDef>,
    skins: Option<SkinsDef>,
    #[serde(default)]
    events: BTreeMap<String, EventDef>,
    #[serde(default)]
    animations: BTreeMap<String, AnimationDef>,
}

#[derive(Debug, Deserialize)]
struct SkeletonHeader {
    spine: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BoneDef {
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    length: f32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
}

#[derive(Debug, Deserialize)]
struct SlotDef {
    name: String,
    bone: String,
    #[serde(default)]
    attachment: Option<String>,
}

fn default_event_volume() -> f32 {
    1.0
}

#[derive(Debug, Deserialize, Default)]
struct EventDef {
    #[serde(default, rename = "int")]
    int_value: i32,
    #[serde(default, rename = "float")]
    float_value: f32,
    #[serde(default, rename = "string")]
    string_value: String,
    #[serde(default, rename = "audio")]
    audio_path: String,
    #[serde(default = "default_event_volume")]
    volume: f32,
    #[serde(default)]
    balance: f32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SkinsDef {
    Array(Vec<SkinDef>),
    Map(BTreeMap<String, SlotAttachmentsDef>),
}

type SlotAttachmentsDef = BTreeMap<String, BTreeMap<String, AttachmentDef>>;

#[derive(Debug, Deserialize)]
struct SkinDef {
    name: String,
    #[serde(default)]
    attachments: SlotAttachmentsDef,
}

#[derive(Debug, Deserialize)]
struct AttachmentDef {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnimationDef {
    #[serde(default)]
    events: Vec<EventKey>,
    /// Bone, slot, constraint and deform timelines. Only their key times matter here.
    #[serde(flatten)]
    timelines: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct EventKey {
    #[serde(default)]
    time: Option<f32>,
    name: String,
    #[serde(default, rename = "int")]
    int_value: Option<i32>,
    #[serde(default, rename = "float")]
    float_value: Option<f32>,
    #[serde(default, rename = "string")]
    string_value: Option<String>,
    #[serde(default)]
    volume: Option<f32>,
    #[serde(default)]
    balance: Option<f32>,
}

impl SkeletonData {
    pub fn from_json_str(input: &str) -> Result<Arc<Self>, Error> {
        Self::from_json_str_with_scale(input, 1.0)
    }

    /// Parses a Spine JSON export. `scale` multiplies bone positions and lengths.
    pub fn from_json_str_with_scale(input: &str, scale: f32) -> Result<Arc<Self>, Error> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::InvalidValue {
                message: "scale must be finite and > 0".to_string(),
            });
        }

        let root: Root = serde_json::from_str(input).map_err(|e| Error::JsonParse {
            message: e.to_string(),
        })?;

        let spine_version = root.skeleton.and_then(|s| s.spine);
        if let Some(v) = spine_version.as_deref() {
            if !is_supported_spine_version(v) {
                return Err(Error::JsonSpineVersion {
                    value: v.to_string(),
                });
            }
        }

        let mut bone_index = HashMap::new();
        let mut bones = Vec::with_capacity(root.bones.len());
        for def in root.bones {
            let parent = match def.parent {
                Some(parent) => Some(*bone_index.get(&parent).ok_or_else(|| {
                    Error::JsonUnknownBoneParent {
                        bone: def.name.clone(),
                        parent: parent.clone(),
                    }
                })?),
                None => None,
            };
            bone_index.insert(def.name.clone(), bones.len());
            bones.push(BoneData {
                name: def.name,
                parent,
                length: def.length * scale,
                x: def.x * scale,
                y: def.y * scale,
            });
        }

        let mut slot_index = HashMap::new();
        let mut slots = Vec::with_capacity(root.slots.len());
        for def in root.slots {
            let bone = *bone_index
                .get(&def.bone)
                .ok_or_else(|| Error::JsonUnknownSlotBone {
                    slot: def.name.clone(),
                    bone: def.bone.clone(),
                })?;
            slot_index.insert(def.name.clone(), slots.len());
            slots.push(SlotData {
                name: def.name,
                bone,
                attachment: def.attachment,
            });
        }

        let skin_defs = match root.skins {
            Some(SkinsDef::Array(skins)) => skins
                .into_iter()
                .map(|s| (s.name, s.attachments))
                .collect::<Vec<_>>(),
            Some(SkinsDef::Map(map)) => map.into_iter().collect(),
            None => Vec::new(),
        };
        let mut skins = Vec::with_capacity(skin_defs.len());
        for (skin_name, slot_map) in skin_defs {
            let mut attachments = vec![HashMap::new(); slots.len()];
            for (slot_name, entries) in slot_map {
                let index =
                    *slot_index
                        .get(&slot_name)
                        .ok_or_else(|| Error::JsonUnknownSkinSlot {
                            skin: skin_name.clone(),
                            slot: slot_name.clone(),
                        })?;
                for (attachment_name, def) in entries {
                    let path = def
                        .path
                        .or(def.name)
                        .unwrap_or_else(|| attachment_name.clone());
                    attachments[index].insert(attachment_name, path);
                }
            }
            skins.push(SkinData {
                name: skin_name,
                attachments,
            });
        }
        // The default skin is always listed first.
        if let Some(pos) = skins.iter().position(|s| s.name == "default") {
            let default = skins.remove(pos);
            skins.insert(0, default);
        }

        // Match spine-cpp SkeletonJson: volume/balance are only read when an audio path is set.
        let events = root
            .events
            .into_iter()
            .map(|(name, def)| {
                let (volume, balance) = if def.audio_path.is_empty() {
                    (1.0, 0.0)
                } else {
                    (def.volume, def.balance)
                };
                let data = EventData {
                    name: name.clone(),
                    int_value: def.int_value,
                    float_value: def.float_value,
                    string: def.string_value,
                    audio_path: def.audio_path,
                    volume,
                    balance,
                };
                (name, data)
            })
            .collect::<HashMap<_, _>>();

        let mut animations = Vec::with_capacity(root.animations.len());
        let mut animation_index = HashMap::new();
        for (name, def) in root.animations {
            let mut duration = def
                .timelines
                .values()
                .map(latest_key_time)
                .fold(0.0f32, f32::max);

            let event_timeline = if def.events.is_empty() {
                None
            } else {
                let mut markers = Vec::with_capacity(def.events.len());
                for key in def.events {
                    let data = events.get(&key.name).ok_or_else(|| Error::JsonUnknownEvent {
                        animation: name.clone(),
                        event: key.name.clone(),
                    })?;
                    markers.push(event_from_key(key, data));
                }
                markers.sort_by(|a, b| a.time.total_cmp(&b.time));
                if let Some(last) = markers.last() {
                    duration = duration.max(last.time);
                }
                Some(EventTimeline { events: markers })
            };

            animation_index.insert(name.clone(), animations.len());
            animations.push(Animation {
                name,
                duration,
                event_timeline,
            });
        }

        Ok(Arc::new(SkeletonData {
            spine_version,
            bones,
            slots,
            skins,
            events,
            animations,
            animation_index,
        }))
    }
}

fn event_from_key(key: EventKey, data: &EventData) -> Event {
    let (volume, balance) = if data.audio_path.is_empty() {
        (data.volume, data.balance)
    } else {
        (key.volume.unwrap_or(1.0), key.balance.unwrap_or(0.0))
    };
    Event {
        time: key.time.unwrap_or(0.0),
        name: key.name,
        int_value: key.int_value.unwrap_or(data.int_value),
        float_value: key.float_value.unwrap_or(data.float_value),
        string: key.string_value.unwrap_or_else(|| data.string.clone()),
        audio_path: data.audio_path.clone(),
        volume,
        balance,
    }
}

/// Latest `time` of any key object nested in a timeline group. Keys without `time` sit at 0.
fn latest_key_time(value: &serde_json::Value) -> f32 {
    match value {
        serde_json::Value::Array(items) => items.iter().map(latest_key_time).fold(0.0, f32::max),
        serde_json::Value::Object(map) => {
            let own = map
                .get("time")
                .and_then(serde_json::Value::as_f64)
                .map(|t| t as f32)
                .unwrap_or(0.0);
            map.iter()
                .filter(|(key, _)| key.as_str() != "time")
                .map(|(_, v)| latest_key_time(v))
                .fold(own, f32::max)
        }
        _ => 0.0,
    }
}
