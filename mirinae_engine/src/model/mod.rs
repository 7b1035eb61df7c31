/// Model module - render models, render actors and the model manager seam
///
/// Asset formats are outside this crate: applications decode meshes and
/// hand `RenderModel`s to a `ModelManager` (e.g. `ModelCache`).

pub mod model_manager;
pub mod render_model;
pub mod render_actor;

pub use model_manager::*;
pub use render_model::*;
pub use render_actor::*;

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
