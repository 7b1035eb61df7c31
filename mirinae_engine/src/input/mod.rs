/// Input module - events and the processor chain the renderer sits in

pub mod events;
pub mod processor;

pub use events::*;
pub use processor::*;

#[cfg(test)]
#[path = "input_tests.rs"]
mod tests;
