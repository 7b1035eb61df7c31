/// Task module - dependency-ordered frame work on a worker pool

pub mod task_graph;
pub mod scheduler;

pub use task_graph::*;
pub use scheduler::*;
