/// VulkanSwapchain - Vulkan implementation of the Swapchain trait
///
/// Owns the window surface. Images are exposed as `VulkanImage`s so passes
/// can use them as framebuffer attachments; synchronization objects belong
/// to the caller and are passed to acquire and present.

use ash::vk;
use std::sync::Arc;
use mirinae_engine::device::{Image, ImageFormat, Semaphore, Swapchain};
use mirinae_engine::frame::SwapchainImageIndex;
use mirinae_engine::mirinae::{Error, Result};
use mirinae_engine::{engine_bail, engine_debug, engine_err, engine_error, engine_info};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::vk_format_to_format;
use crate::vulkan_image::VulkanImage;
use crate::vulkan_sync::VulkanSemaphore;

/// Pick the surface format, preferring 8-bit sRGB
///
/// Returns `None` when no reported format maps to an `ImageFormat`.
pub(crate) fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Option<(vk::SurfaceFormatKHR, ImageFormat)> {
    let preferred = [vk::Format::B8G8R8A8_SRGB, vk::Format::R8G8B8A8_SRGB];
    for wanted in preferred {
        if let Some(found) = formats.iter().find(|f| f.format == wanted) {
            return vk_format_to_format(found.format).map(|format| (*found, format));
        }
    }
    formats
        .iter()
        .find_map(|f| vk_format_to_format(f.format).map(|format| (*f, format)))
}

/// Surface extent for a requested window size
pub(crate) fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One more image than the minimum, capped by the maximum (0 = no limit)
pub(crate) fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        count.min(caps.max_image_count)
    } else {
        count
    }
}

fn downcast_semaphore(semaphore: &dyn Semaphore) -> Result<vk::Semaphore> {
    semaphore
        .as_any()
        .downcast_ref::<VulkanSemaphore>()
        .map(|s| s.semaphore)
        .ok_or_else(|| engine_err!("mirinae::vulkan::Swapchain", "Semaphore is not a Vulkan semaphore"))
}

pub struct VulkanSwapchain {
    ctx: Arc<GpuContext>,
    surface: vk::SurfaceKHR,
    swapchain: vk::SwapchainKHR,
    surface_format: vk::SurfaceFormatKHR,
    format: ImageFormat,
    extent: vk::Extent2D,
    images: Vec<Arc<dyn Image>>,
}

impl VulkanSwapchain {
    /// Take ownership of `surface` and build the first swapchain
    pub(crate) fn new(ctx: Arc<GpuContext>, surface: vk::SurfaceKHR, width: u32, height: u32) -> Result<Self> {
        let formats = unsafe {
            ctx.surface_loader
                .get_physical_device_surface_formats(ctx.physical_device, surface)
        };
        let formats = match formats {
            Ok(formats) => formats,
            Err(e) => {
                unsafe { ctx.surface_loader.destroy_surface(surface, None) };
                engine_error!("mirinae::vulkan::Swapchain", "Failed to query surface formats: {:?}", e);
                return Err(Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e)));
            }
        };
        let Some((surface_format, format)) = choose_surface_format(&formats) else {
            unsafe { ctx.surface_loader.destroy_surface(surface, None) };
            engine_error!("mirinae::vulkan::Swapchain", "No supported surface format among {:?}", formats);
            return Err(Error::InitializationFailed("No supported surface format".to_string()));
        };

        let mut swapchain = Self {
            ctx,
            surface,
            swapchain: vk::SwapchainKHR::null(),
            surface_format,
            format,
            extent: vk::Extent2D { width: 0, height: 0 },
            images: Vec::new(),
        };
        swapchain.build(width, height)?;
        engine_info!(
            "mirinae::vulkan::Swapchain",
            "Swapchain created: {}x{}, {} images, {:?}",
            swapchain.extent.width, swapchain.extent.height, swapchain.images.len(), format
        );
        Ok(swapchain)
    }

    /// Create a swapchain replacing the current one (if any)
    fn build(&mut self, width: u32, height: u32) -> Result<()> {
        let ctx = &self.ctx;
        let caps = unsafe {
            ctx.surface_loader
                .get_physical_device_surface_capabilities(ctx.physical_device, self.surface)
        }
        .map_err(|e| {
            engine_error!("mirinae::vulkan::Swapchain", "Failed to get surface capabilities: {:?}", e);
            Error::InitializationFailed(format!("Failed to get surface capabilities: {:?}", e))
        })?;

        let extent = choose_extent(&caps, width, height);
        if extent.width == 0 || extent.height == 0 {
            engine_bail!("mirinae::vulkan::Swapchain", "Surface has a zero extent ({}x{})", extent.width, extent.height);
        }

        let queue_families = [ctx.graphics_queue_family, ctx.present_queue_family];
        let old_swapchain = self.swapchain;
        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(choose_image_count(&caps))
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(old_swapchain);
        create_info = if ctx.graphics_queue_family != ctx.present_queue_family {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_families)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = unsafe { ctx.swapchain_loader.create_swapchain(&create_info, None) }.map_err(|e| {
            engine_error!("mirinae::vulkan::Swapchain", "Failed to create swapchain: {:?}", e);
            Error::InitializationFailed(format!("Failed to create swapchain: {:?}", e))
        })?;

        // Old views may still be referenced by framebuffers; they die with them
        self.images.clear();
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { ctx.swapchain_loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;
        self.extent = extent;

        let vk_images = unsafe { ctx.swapchain_loader.get_swapchain_images(swapchain) }.map_err(|e| {
            engine_error!("mirinae::vulkan::Swapchain", "Failed to get swapchain images: {:?}", e);
            Error::InitializationFailed(format!("Failed to get swapchain images: {:?}", e))
        })?;
        for (i, image) in vk_images.into_iter().enumerate() {
            let image = VulkanImage::from_swapchain(
                Arc::clone(&self.ctx),
                image,
                self.format,
                extent.width,
                extent.height,
                format!("swapchain_{}", i),
            )?;
            self.images.push(Arc::new(image));
        }
        Ok(())
    }
}

impl Swapchain for VulkanSwapchain {
    fn acquire_next_image(&mut self, signal: &dyn Semaphore) -> Result<SwapchainImageIndex> {
        let semaphore = downcast_semaphore(signal)?;
        let acquired = unsafe {
            self.ctx.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };
        match acquired {
            // Suboptimal still signals the semaphore; present reports it
            Ok((index, _suboptimal)) => Ok(SwapchainImageIndex::new(index as usize)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_debug!("mirinae::vulkan::Swapchain", "Swapchain out of date during acquire");
                Err(Error::SurfaceOutOfDate)
            }
            Err(e) => Err(engine_err!("mirinae::vulkan::Swapchain", "Failed to acquire next swapchain image: {:?}", e)),
        }
    }

    fn present(&mut self, index: SwapchainImageIndex, wait: &dyn Semaphore) -> Result<()> {
        let semaphore = downcast_semaphore(wait)?;
        if index.get() >= self.images.len() {
            engine_bail!(
                "mirinae::vulkan::Swapchain",
                "Present index {} out of range (count: {})",
                index.get(), self.images.len()
            );
        }

        let swapchains = [self.swapchain];
        let image_indices = [index.get() as u32];
        let wait_semaphores = [semaphore];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let presented = {
            let _queues = self.ctx.lock_queues()?;
            unsafe { self.ctx.swapchain_loader.queue_present(self.ctx.present_queue, &present_info) }
        };
        match presented {
            Ok(false) => Ok(()),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                Err(Error::SurfaceOutOfDate)
            }
            Err(e) => Err(engine_err!("mirinae::vulkan::Swapchain", "Failed to present swapchain image: {:?}", e)),
        }
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }.map_err(|e| {
            engine_err!("mirinae::vulkan::Swapchain", "Failed to wait idle before swapchain recreate: {:?}", e)
        })?;
        self.build(width, height)?;
        engine_info!(
            "mirinae::vulkan::Swapchain",
            "Swapchain recreated: {}x{}",
            self.extent.width, self.extent.height
        );
        Ok(())
    }

    fn width(&self) -> u32 {
        self.extent.width
    }

    fn height(&self) -> u32 {
        self.extent.height
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn format(&self) -> ImageFormat {
        self.format
    }

    fn image(&self, index: usize) -> Arc<dyn Image> {
        Arc::clone(&self.images[index])
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
            self.images.clear();
            self.ctx.swapchain_loader.destroy_swapchain(self.swapchain, None);
            self.ctx.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
