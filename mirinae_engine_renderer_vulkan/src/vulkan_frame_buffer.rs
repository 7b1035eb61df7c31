/// VulkanFramebuffer - Vulkan implementation of the Framebuffer trait
///
/// Wraps a VkFramebuffer that groups color and depth attachments. Created
/// once per frame slot by a pass, rebuilt on resize.

use ash::vk;
use std::any::Any;
use std::sync::Arc;
use mirinae_engine::device::{Framebuffer, FramebufferDesc, Image};
use mirinae_engine::mirinae::Result;
use mirinae_engine::{engine_bail, engine_err};

use crate::vulkan_context::GpuContext;
use crate::vulkan_image::VulkanImage;
use crate::vulkan_render_pass::VulkanRenderPass;

pub struct VulkanFramebuffer {
    ctx: Arc<GpuContext>,
    pub(crate) framebuffer: vk::Framebuffer,
    width: u32,
    height: u32,
    /// Views must outlive the framebuffer
    _attachments: Vec<Arc<dyn Image>>,
}

impl VulkanFramebuffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &FramebufferDesc) -> Result<Self> {
        let Some(render_pass) = desc.render_pass.as_any().downcast_ref::<VulkanRenderPass>() else {
            engine_bail!("mirinae::vulkan::Framebuffer", "Render pass is not a Vulkan render pass");
        };

        let mut views = Vec::with_capacity(desc.attachments.len());
        for attachment in &desc.attachments {
            let Some(image) = attachment.as_any().downcast_ref::<VulkanImage>() else {
                engine_bail!(
                    "mirinae::vulkan::Framebuffer",
                    "Attachment '{}' is not a Vulkan image",
                    attachment.info().name
                );
            };
            let info = image.info();
            if info.width < desc.width || info.height < desc.height {
                engine_bail!(
                    "mirinae::vulkan::Framebuffer",
                    "Attachment '{}' ({}x{}) is smaller than the framebuffer ({}x{})",
                    info.name, info.width, info.height, desc.width, desc.height
                );
            }
            views.push(image.view);
        }

        let framebuffer_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.render_pass)
            .attachments(&views)
            .width(desc.width)
            .height(desc.height)
            .layers(1);

        let framebuffer = unsafe { ctx.device.create_framebuffer(&framebuffer_info, None) }
            .map_err(|e| engine_err!("mirinae::vulkan::Framebuffer", "Failed to create framebuffer: {:?}", e))?;

        Ok(Self {
            ctx,
            framebuffer,
            width: desc.width,
            height: desc.height,
            _attachments: desc.attachments.clone(),
        })
    }
}

impl Framebuffer for VulkanFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFramebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
