/*!
# Mirinae Engine - Vulkan Backend

Vulkan implementation of the `mirinae_engine` device traits, built on ash
for the Vulkan bindings and gpu-allocator for memory management.

```no_run
use std::sync::Arc;
use mirinae_engine::mirinae::RendererConfig;
use mirinae_engine_renderer_vulkan::VulkanDevice;
# fn run(window: &winit::window::Window) -> mirinae_engine::mirinae::Result<()> {
let config = RendererConfig::default();
let device = VulkanDevice::new(window, &config)?;
let swapchain = device.create_swapchain(window, 1280, 720)?;
let device = Arc::new(device);
# Ok(())
# }
```

Validation layers are compiled in only with the `vulkan-validation`
feature and enabled when `RendererConfig::enable_validation` is set.
*/

mod vulkan_context;
mod vulkan_format;
mod vulkan_image;
mod vulkan_buffer;
mod vulkan_render_pass;
mod vulkan_frame_buffer;
mod vulkan_pipeline;
mod vulkan_sampler;
mod vulkan_binding_group;
mod vulkan_command_list;
mod vulkan_sync;
mod vulkan_swapchain;
mod vulkan_device;

#[cfg(feature = "vulkan-validation")]
mod debug;

pub use vulkan_device::VulkanDevice;
pub use vulkan_swapchain::VulkanSwapchain;

#[cfg(feature = "vulkan-validation")]
pub use debug::{get_validation_stats, print_validation_stats_report, ValidationStats};
