/// Render module - frame context, shared pass resources and the passes
///
/// Everything here is backend-agnostic: passes talk to the GPU through
/// `crate::device` only.

pub mod resource_state;
pub mod render_target_manager;
pub mod view_frustum;
pub mod debug_render;
pub mod draw_sheet;
pub mod context;
pub mod gbuffer;
pub mod shadow;
pub mod pass;
pub mod passes;

pub use resource_state::*;
pub use render_target_manager::*;
pub use view_frustum::*;
pub use debug_render::*;
pub use draw_sheet::*;
pub use context::*;
pub use gbuffer::*;
pub use pass::*;

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
