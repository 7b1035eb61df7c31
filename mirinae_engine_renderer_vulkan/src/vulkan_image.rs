/// VulkanImage - Vulkan implementation of the Image trait

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::any::Any;
use std::sync::Arc;
use mirinae_engine::device::{Image, ImageDesc, ImageFormat, ImageInfo, ImageUsage};
use mirinae_engine::mirinae::{Error, Result};
use mirinae_engine::{engine_err, engine_error};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{format_aspect, format_to_vk, image_usage_to_vk};

/// Vulkan image plus a view over all of its layers
///
/// Swapchain images are wrapped without an allocation: only the view is
/// destroyed with them, the image belongs to the swapchain.
pub struct VulkanImage {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    allocation: Option<Allocation>,
    owns_image: bool,
    info: ImageInfo,
}

impl VulkanImage {
    /// Create a device-local image and its view
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &ImageDesc) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource(format!(
                "image '{}' has a zero extent ({}x{})",
                desc.name, desc.width, desc.height
            )));
        }
        let array_layers = desc.array_layers.max(1);
        let format = format_to_vk(desc.format);

        let image_create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
            .mip_levels(1)
            .array_layers(array_layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(image_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { ctx.device.create_image(&image_create_info, None) }.map_err(|e| {
            engine_err!("mirinae::vulkan::Image", "Failed to create image '{}': {:?}", desc.name, e)
        })?;

        let requirements = unsafe { ctx.device.get_image_memory_requirements(image) };
        let allocation = ctx.allocator()?.allocate(&AllocationCreateDesc {
            name: &desc.name,
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!(
                    "mirinae::vulkan::Image",
                    "Out of GPU memory for image '{}' ({}x{}, {:.2} MB): {}",
                    desc.name, desc.width, desc.height, size_mb, e
                );
                unsafe { ctx.device.destroy_image(image, None) };
                return Err(Error::OutOfMemory);
            }
        };

        let bound = unsafe {
            ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset())
        };
        if let Err(e) = bound {
            ctx.allocator()?.free(allocation).ok();
            unsafe { ctx.device.destroy_image(image, None) };
            return Err(engine_err!("mirinae::vulkan::Image", "Failed to bind image memory: {:?}", e));
        }

        let view_type = if array_layers > 1 {
            vk::ImageViewType::TYPE_2D_ARRAY
        } else {
            vk::ImageViewType::TYPE_2D
        };
        let view = match create_view(&ctx, image, format, format_aspect(desc.format), view_type, array_layers) {
            Ok(view) => view,
            Err(e) => {
                ctx.allocator()?.free(allocation).ok();
                unsafe { ctx.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        Ok(Self {
            ctx,
            image,
            view,
            allocation: Some(allocation),
            owns_image: true,
            info: ImageInfo { array_layers, ..ImageInfo::from(desc) },
        })
    }

    /// Wrap an image owned by a swapchain
    pub(crate) fn from_swapchain(
        ctx: Arc<GpuContext>,
        image: vk::Image,
        format: ImageFormat,
        width: u32,
        height: u32,
        name: String,
    ) -> Result<Self> {
        let view = create_view(
            &ctx,
            image,
            format_to_vk(format),
            vk::ImageAspectFlags::COLOR,
            vk::ImageViewType::TYPE_2D,
            1,
        )?;
        Ok(Self {
            ctx,
            image,
            view,
            allocation: None,
            owns_image: false,
            info: ImageInfo {
                name,
                width,
                height,
                format,
                usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_DST,
                array_layers: 1,
            },
        })
    }
}

fn create_view(
    ctx: &GpuContext,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
    view_type: vk::ImageViewType,
    layer_count: u32,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(view_type)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count,
        });

    unsafe { ctx.device.create_image_view(&create_info, None) }
        .map_err(|e| engine_err!("mirinae::vulkan::Image", "Failed to create image view: {:?}", e))
}

impl Image for VulkanImage {
    fn info(&self) -> &ImageInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanImage {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_image_view(self.view, None);

            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator() {
                    allocator.free(allocation).ok();
                }
            }

            if self.owns_image {
                self.ctx.device.destroy_image(self.image, None);
            }
        }
    }
}
