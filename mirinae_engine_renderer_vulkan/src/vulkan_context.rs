/// GpuContext - Vulkan objects shared by every resource of one device
///
/// Every image, buffer, pipeline and swapchain holds an `Arc<GpuContext>`,
/// so the context is dropped after the last of them. Its `Drop` is the only
/// place the allocator, the logical device and the instance are destroyed.

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};
use mirinae_engine::mirinae::{Error, Result};

pub struct GpuContext {
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: ash::Device,

    /// Dropped by hand before the device is destroyed
    allocator: ManuallyDrop<Mutex<Allocator>>,

    pub(crate) graphics_queue: vk::Queue,
    pub(crate) graphics_queue_family: u32,
    /// May be the same queue as `graphics_queue`
    pub(crate) present_queue: vk::Queue,
    pub(crate) present_queue_family: u32,
    /// Held for every `vkQueueSubmit` / `vkQueuePresentKHR`
    queue_lock: Mutex<()>,

    pub(crate) surface_loader: ash::khr::surface::Instance,
    pub(crate) swapchain_loader: ash::khr::swapchain::Device,

    /// Command buffer labels (validation builds only)
    pub(crate) debug_utils_device: Option<ash::ext::debug_utils::Device>,
    pub(crate) debug_utils_instance: Option<ash::ext::debug_utils::Instance>,
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

/// Everything `GpuContext::new` takes ownership of
pub(crate) struct GpuContextParts {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub allocator: Allocator,
    pub graphics_queue_family: u32,
    pub present_queue_family: u32,
    pub debug_utils_instance: Option<ash::ext::debug_utils::Instance>,
    pub debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl GpuContext {
    pub(crate) fn new(parts: GpuContextParts) -> Self {
        let GpuContextParts {
            entry,
            instance,
            physical_device,
            device,
            allocator,
            graphics_queue_family,
            present_queue_family,
            debug_utils_instance,
            debug_messenger,
        } = parts;

        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_queue_family, 0) };
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);
        let debug_utils_device = debug_utils_instance
            .as_ref()
            .map(|_| ash::ext::debug_utils::Device::new(&instance, &device));

        Self {
            entry,
            instance,
            physical_device,
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            graphics_queue_family,
            present_queue,
            present_queue_family,
            queue_lock: Mutex::new(()),
            surface_loader,
            swapchain_loader,
            debug_utils_device,
            debug_utils_instance,
            debug_messenger,
        }
    }

    pub(crate) fn allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| Error::BackendError("GPU allocator lock poisoned".to_string()))
    }

    /// Exclusive access to the queues
    pub(crate) fn lock_queues(&self) -> Result<MutexGuard<'_, ()>> {
        self.queue_lock
            .lock()
            .map_err(|_| Error::BackendError("queue lock poisoned".to_string()))
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // Frees the remaining memory blocks while the device is alive
            ManuallyDrop::drop(&mut self.allocator);

            #[cfg(feature = "vulkan-validation")]
            crate::debug::cleanup_debug_config();

            if let (Some(debug_utils), Some(messenger)) =
                (&self.debug_utils_instance, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
