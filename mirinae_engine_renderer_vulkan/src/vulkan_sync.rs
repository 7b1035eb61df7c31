/// VulkanSemaphore / VulkanFence - Vulkan synchronization primitives

use ash::vk;
use std::any::Any;
use std::sync::Arc;
use mirinae_engine::device::{Fence, Semaphore};
use mirinae_engine::mirinae::Result;
use mirinae_engine::engine_err;

use crate::vulkan_context::GpuContext;

pub struct VulkanSemaphore {
    ctx: Arc<GpuContext>,
    pub(crate) semaphore: vk::Semaphore,
}

impl VulkanSemaphore {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { ctx.device.create_semaphore(&create_info, None) }
            .map_err(|e| engine_err!("mirinae::vulkan::Sync", "Failed to create semaphore: {:?}", e))?;
        Ok(Self { ctx, semaphore })
    }
}

impl Semaphore for VulkanSemaphore {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSemaphore {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_semaphore(self.semaphore, None) };
    }
}

pub struct VulkanFence {
    ctx: Arc<GpuContext>,
    pub(crate) fence: vk::Fence,
}

impl VulkanFence {
    pub(crate) fn new(ctx: Arc<GpuContext>, signaled: bool) -> Result<Self> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { ctx.device.create_fence(&create_info, None) }
            .map_err(|e| engine_err!("mirinae::vulkan::Sync", "Failed to create fence: {:?}", e))?;
        Ok(Self { ctx, fence })
    }
}

impl Fence for VulkanFence {
    fn wait(&self) -> Result<()> {
        unsafe { self.ctx.device.wait_for_fences(&[self.fence], true, u64::MAX) }
            .map_err(|e| engine_err!("mirinae::vulkan::Sync", "Failed to wait for fence: {:?}", e))
    }

    fn reset(&self) -> Result<()> {
        unsafe { self.ctx.device.reset_fences(&[self.fence]) }
            .map_err(|e| engine_err!("mirinae::vulkan::Sync", "Failed to reset fence: {:?}", e))
    }

    fn is_signaled(&self) -> Result<bool> {
        unsafe { self.ctx.device.get_fence_status(self.fence) }
            .map_err(|e| engine_err!("mirinae::vulkan::Sync", "Failed to query fence status: {:?}", e))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_fence(self.fence, None) };
    }
}
