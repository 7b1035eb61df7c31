/// Shadow module - cascade math, shadow map pools and slot selection

pub mod cascade;
pub mod bundle;
pub mod selection;

pub use cascade::*;
pub use bundle::*;
pub use selection::*;

#[cfg(test)]
#[path = "shadow_tests.rs"]
mod tests;
