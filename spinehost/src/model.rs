use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct BoneData {
    pub name: String,
    pub parent: Option<usize>,
    pub length: f32,
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Debug)]
pub struct SlotData {
    pub name: String,
    pub bone: usize,
    pub attachment: Option<String>,
}

/// A named set of attachments, keyed by slot index then attachment name.
#[derive(Clone, Debug, Default)]
pub struct SkinData {
    pub name: String,
    pub attachments: Vec<HashMap<String, String>>,
}

impl SkinData {
    /// Resolves the atlas path of an attachment placed in this skin.
    pub fn attachment_path(&self, slot_index: usize, attachment_name: &str) -> Option<&str> {
        self.attachments
            .get(slot_index)
            .and_then(|slot| slot.get(attachment_name))
            .map(String::as_str)
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments.iter().map(HashMap::len).sum()
    }
}

/// Setup values of a user-authored event. Timeline keys start from these and may override them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventData {
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string: String,
    pub audio_path: String,
    pub volume: f32,
    pub balance: f32,
}

/// One marker on an animation's event timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub time: f32,
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string: String,
    pub audio_path: String,
    pub volume: f32,
    pub balance: f32,
}

/// Markers sorted by time.
#[derive(Clone, Debug, Default)]
pub struct EventTimeline {
    pub events: Vec<Event>,
}

#[derive(Clone, Debug)]
pub struct Animation {
    pub name: String,
    pub duration: f32,
    pub event_timeline: Option<EventTimeline>,
}

#[derive(Clone, Debug, Default)]
pub struct SkeletonData {
    pub spine_version: Option<String>,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    /// Skins in export order; `default` comes first when the export has one.
    pub skins: Vec<SkinData>,
    pub events: HashMap<String, EventData>,
    pub animations: Vec<Animation>,
    pub animation_index: HashMap<String, usize>,
}

impl SkeletonData {
    pub fn animation(&self, name: &str) -> Option<(usize, &Animation)> {
        let index = *self.animation_index.get(name)?;
        Some((index, &self.animations[index]))
    }

    pub fn skin(&self, name: &str) -> Option<&SkinData> {
        self.skins.iter().find(|skin| skin.name == name)
    }

    pub fn animation_names(&self) -> Vec<String> {
        self.animations.iter().map(|a| a.name.clone()).collect()
    }

    pub fn skin_names(&self) -> Vec<String> {
        self.skins.iter().map(|s| s.name.clone()).collect()
    }
}
