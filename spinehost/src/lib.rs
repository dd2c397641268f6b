//! Multi-instance host for Spine 4.x skeletal animations (unofficial).
//!
//! Instances are addressed by integer identifiers. Each one owns a multi-track queue-and-mix
//! state machine whose lifecycle records are delivered to host callbacks, either immediately at
//! the end of `update` or when the host pumps them. Drawing is delegated to a pluggable
//! [`Surface`].

#![forbid(unsafe_code)]

mod atlas;
mod dispatch;
mod error;
mod ids;
mod instance;
mod json;
mod loader;
mod model;
mod registry;
mod render;
mod runtime;
mod surface;
mod version;

pub mod api;

pub use atlas::*;
pub use dispatch::*;
pub use error::*;
pub use ids::InstanceId;
pub use instance::*;
pub use loader::*;
pub use model::*;
pub use registry::*;
pub use render::*;
pub use runtime::*;
pub use surface::*;
pub use version::*;

#[cfg(test)]
mod test_fixtures;

#[cfg(test)]
mod json_tests;
