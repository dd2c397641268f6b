use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown instance: {id}")]
    UnknownInstance { id: i32 },

    #[error("instance {id} is faulted and rejects further operations")]
    InstanceFaulted { id: i32 },

    #[error("instance registry is full ({capacity} live instances)")]
    RegistryFull { capacity: usize },

    #[error("unknown animation: {name}")]
    UnknownAnimation { name: String },

    #[error("unknown skin: {name}")]
    UnknownSkin { name: String },

    #[error("invalid track index: {index}")]
    InvalidTrackIndex { index: i64 },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[error("instance {id} has no skeleton data loaded")]
    NotLoaded { id: i32 },

    #[error("instance {id} is already loaded; call cleanup before loading again")]
    AlreadyLoaded { id: i32 },

    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported skeleton format for '{path}' (expected .json)")]
    UnsupportedSkeletonFormat { path: String },

    #[error("failed to parse Spine JSON: {message}")]
    JsonParse { message: String },

    #[error("unsupported or invalid Spine version string: {value}")]
    JsonSpineVersion { value: String },

    #[error("unknown parent bone '{parent}' for bone '{bone}'")]
    JsonUnknownBoneParent { bone: String, parent: String },

    #[error("unknown bone '{bone}' referenced by slot '{slot}'")]
    JsonUnknownSlotBone { slot: String, bone: String },

    #[error("unknown slot '{slot}' referenced by skin '{skin}'")]
    JsonUnknownSkinSlot { skin: String, slot: String },

    #[error("unknown event '{event}' referenced by animation '{animation}'")]
    JsonUnknownEvent { animation: String, event: String },

    #[error("failed to parse Spine atlas: {message}")]
    AtlasParse { message: String },

    #[error("surface '{surface}' rejected: {message}")]
    Surface { surface: String, message: String },

    #[error("failed to serialize instance state: {message}")]
    StateSerialize { message: String },

    #[error("invariant violated in track state machine: {message}")]
    Invariant { message: String },
}
