/// Renderer module - frame driving on top of the render passes

pub mod renderer;
pub mod render_stage;

pub use renderer::*;
pub use render_stage::*;
