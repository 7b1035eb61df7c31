/// Device module - backend-agnostic GPU object traits
///
/// The renderer only talks to the GPU through these traits. The Vulkan crate
/// implements them with ash, the unit tests with `mock_device`.

pub mod graphics_device;
pub mod image;
pub mod buffer;
pub mod shader;
pub mod barrier;
pub mod render_pass;
pub mod framebuffer;
pub mod pipeline;
pub mod binding_group;
pub mod command_list;
pub mod sync;
pub mod swapchain;

pub use graphics_device::*;
pub use image::*;
pub use buffer::*;
pub use shader::*;
pub use barrier::*;
pub use render_pass::*;
pub use framebuffer::*;
pub use pipeline::*;
pub use binding_group::*;
pub use command_list::*;
pub use sync::*;
pub use swapchain::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_device;
