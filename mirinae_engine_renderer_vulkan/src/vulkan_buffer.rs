/// VulkanBuffer - Vulkan implementation of the Buffer trait

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::any::Any;
use std::sync::Arc;
use mirinae_engine::device::{Buffer, BufferDesc, BufferUsage};
use mirinae_engine::mirinae::{Error, Result};
use mirinae_engine::{engine_bail, engine_err, engine_error};

use crate::vulkan_context::GpuContext;

/// Host-visible Vulkan buffer
pub struct VulkanBuffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
}

impl VulkanBuffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &BufferDesc) -> Result<Self> {
        if desc.size == 0 {
            return Err(Error::InvalidResource(format!("buffer '{}' has size 0", desc.name)));
        }
        let usage = match desc.usage {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Storage => vk::BufferUsageFlags::STORAGE_BUFFER,
        };

        let buffer_create_info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(usage | vk::BufferUsageFlags::TRANSFER_DST)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { ctx.device.create_buffer(&buffer_create_info, None) }.map_err(|e| {
            engine_err!(
                "mirinae::vulkan::Buffer",
                "Failed to create buffer '{}' of size {} bytes: {:?}",
                desc.name, desc.size, e
            )
        })?;

        let requirements = unsafe { ctx.device.get_buffer_memory_requirements(buffer) };
        let allocation = ctx.allocator()?.allocate(&AllocationCreateDesc {
            name: &desc.name,
            requirements,
            location: MemoryLocation::CpuToGpu,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!(
                    "mirinae::vulkan::Buffer",
                    "Out of GPU memory for buffer '{}' (required: {:.2} MB): {}",
                    desc.name, size_mb, e
                );
                unsafe { ctx.device.destroy_buffer(buffer, None) };
                return Err(Error::OutOfMemory);
            }
        };

        let bound = unsafe {
            ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };
        if let Err(e) = bound {
            ctx.allocator()?.free(allocation).ok();
            unsafe { ctx.device.destroy_buffer(buffer, None) };
            engine_bail!("mirinae::vulkan::Buffer", "Failed to bind buffer memory: {:?}", e);
        }

        Ok(Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size: desc.size,
        })
    }
}

impl Buffer for VulkanBuffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            engine_bail!(
                "mirinae::vulkan::Buffer",
                "Buffer update out of range (offset {} + {} bytes > size {})",
                offset, data.len(), self.size
            );
        }

        let Some(allocation) = &self.allocation else {
            engine_bail!("mirinae::vulkan::Buffer", "Buffer update failed: no GPU allocation");
        };
        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| engine_err!("mirinae::vulkan::Buffer", "Buffer is not CPU-accessible"))?
            .as_ptr() as *mut u8;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
        }
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
