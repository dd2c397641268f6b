mod animation_state;

pub use animation_state::*;

#[cfg(test)]
mod animation_state_tests;
