//! Spine export version accepted by the skeleton loader.

/// Spine major version the loader accepts in the `skeleton.spine` header.
pub const SPINE_EXPORT_MAJOR: u32 = 4;

/// Returns `true` when a `skeleton.spine` header (eg. `"4.2.43"`) names a supported export.
pub fn is_supported_spine_version(value: &str) -> bool {
    value
        .split('.')
        .next()
        .and_then(|major| major.trim().parse::<u32>().ok())
        .is_some_and(|major| major == SPINE_EXPORT_MAJOR)
}
