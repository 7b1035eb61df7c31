/// VulkanDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Builds the instance, picks a physical device that can present to the
/// window, creates the logical device and the memory allocator, and then
/// acts as the factory for every other Vulkan object.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CString;
use std::sync::{Arc, Mutex};
use mirinae_engine::device::{
    BindingGroup, BindingResource, Buffer, BufferDesc, CommandPool,
    ComputePipelineDesc, Fence, Framebuffer, FramebufferDesc, GraphicsDevice, Image, ImageDesc,
    ImageFormat, ImageFormats, Pipeline, PipelineDesc, RenderPass, RenderPassDesc, Semaphore,
    Submission,
};
use mirinae_engine::mirinae::{Error, Result, RendererConfig};
use mirinae_engine::{engine_bail, engine_err, engine_error, engine_info, engine_warn};

use crate::vulkan_binding_group::{DescriptorAllocator, VulkanBindingGroup};
use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::{VulkanCommandList, VulkanCommandPool};
use crate::vulkan_context::{GpuContext, GpuContextParts};
use crate::vulkan_format::{format_to_vk, pipeline_stages_to_vk};
use crate::vulkan_frame_buffer::VulkanFramebuffer;
use crate::vulkan_image::VulkanImage;
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_render_pass::VulkanRenderPass;
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_swapchain::VulkanSwapchain;
use crate::vulkan_sync::{VulkanFence, VulkanSemaphore};

const VALIDATION_LAYER: &std::ffi::CStr = c"VK_LAYER_KHRONOS_validation";

pub(crate) const DEPTH_CANDIDATES: [ImageFormat; 3] =
    [ImageFormat::D32_SFLOAT, ImageFormat::D24_UNORM_S8_UINT, ImageFormat::D16_UNORM];
pub(crate) const HDR_CANDIDATES: [ImageFormat; 2] =
    [ImageFormat::R16G16B16A16_SFLOAT, ImageFormat::R32G32B32A32_SFLOAT];
pub(crate) const UNORM_CANDIDATES: [ImageFormat; 2] =
    [ImageFormat::R8G8B8A8_UNORM, ImageFormat::B8G8R8A8_UNORM];

/// Preference order among physical device types (higher wins)
pub(crate) fn device_type_rank(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 4,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 1,
        _ => 0,
    }
}

/// First candidate the device supports
pub(crate) fn pick_first_supported(
    candidates: &[ImageFormat],
    supported: impl Fn(ImageFormat) -> bool,
) -> Option<ImageFormat> {
    candidates.iter().copied().find(|&format| supported(format))
}

/// Whether validation layers are turned on for this build and config
pub(crate) fn validation_wanted(config: &RendererConfig) -> bool {
    if cfg!(feature = "vulkan-validation") {
        config.enable_validation
    } else {
        if config.enable_validation {
            engine_warn!(
                "mirinae::vulkan::Device",
                "Validation requested but the crate was built without the 'vulkan-validation' feature"
            );
        }
        false
    }
}

fn init_error(what: &str, e: impl std::fmt::Debug) -> Error {
    engine_error!("mirinae::vulkan::Device", "{}: {:?}", what, e);
    Error::InitializationFailed(format!("{}: {:?}", what, e))
}

/// Graphics queue family and present queue family of a usable device
struct DeviceCandidate {
    physical_device: vk::PhysicalDevice,
    name: String,
    rank: u32,
    graphics_family: u32,
    present_family: u32,
}

unsafe fn find_candidate(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
) -> Option<DeviceCandidate> {
    let properties = instance.get_physical_device_properties(physical_device);
    let name = properties
        .device_name_as_c_str()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "Unknown".to_string());

    let has_swapchain = instance
        .enumerate_device_extension_properties(physical_device)
        .map(|extensions| {
            extensions.iter().any(|ext| {
                ext.extension_name_as_c_str()
                    .map(|ext_name| ext_name == ash::khr::swapchain::NAME)
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false);
    if !has_swapchain {
        return None;
    }

    let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
    let supports_present = |i: u32| {
        surface_loader
            .get_physical_device_surface_support(physical_device, i, surface)
            .unwrap_or(false)
    };
    let graphics_family = queue_families
        .iter()
        .enumerate()
        .find(|(_, qf)| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE))
        .map(|(i, _)| i as u32)?;
    let present_family = if supports_present(graphics_family) {
        graphics_family
    } else {
        (0..queue_families.len() as u32).find(|&i| supports_present(i))?
    };

    Some(DeviceCandidate {
        physical_device,
        name,
        rank: device_type_rank(properties.device_type),
        graphics_family,
        present_family,
    })
}

pub struct VulkanDevice {
    samplers: Mutex<SamplerCache>,
    descriptors: Arc<DescriptorAllocator>,
    formats: ImageFormats,
    ctx: Arc<GpuContext>,
}

impl VulkanDevice {
    /// Create the device for `window`
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &RendererConfig) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| init_error("Failed to load Vulkan library", e))?;

            let mut validation = validation_wanted(config);
            if validation {
                let layers = entry
                    .enumerate_instance_layer_properties()
                    .map_err(|e| init_error("Failed to enumerate instance layers", e))?;
                let available = layers.iter().any(|layer| {
                    layer.layer_name_as_c_str().map(|name| name == VALIDATION_LAYER).unwrap_or(false)
                });
                if !available {
                    engine_warn!("mirinae::vulkan::Device", "Validation layer not installed, continuing without it");
                    validation = false;
                }
            }

            let app_name = CString::new(config.app_name.as_str()).unwrap_or_default();
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Mirinae")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let display_handle = window
                .display_handle()
                .map_err(|e| init_error("Failed to get display handle", e))?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| init_error("Failed to get required extensions", e))?
                .to_vec();
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }
            let layer_names = if validation { vec![VALIDATION_LAYER.as_ptr()] } else { vec![] };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_error("Failed to create Vulkan instance", e))?;

            let (debug_utils_instance, debug_messenger) = if validation {
                Self::create_debug_messenger(&entry, &instance)?
            } else {
                (None, None)
            };

            // Temporary surface for queue selection
            let window_handle = window
                .window_handle()
                .map_err(|e| init_error("Failed to get window handle", e))?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| init_error("Failed to create surface", e))?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let physical_devices = instance
                .enumerate_physical_devices()
                .map_err(|e| init_error("Failed to enumerate physical devices", e))?;
            let candidate = physical_devices
                .into_iter()
                .filter_map(|pd| find_candidate(&instance, &surface_loader, surface, pd))
                .max_by_key(|candidate| candidate.rank);
            surface_loader.destroy_surface(surface, None);

            let Some(candidate) = candidate else {
                engine_error!("mirinae::vulkan::Device", "No Vulkan GPU can present to this window");
                return Err(Error::InitializationFailed("No suitable Vulkan GPU found".to_string()));
            };
            engine_info!(
                "mirinae::vulkan::Device",
                "Using GPU '{}' (graphics family {}, present family {})",
                candidate.name, candidate.graphics_family, candidate.present_family
            );

            let supported_features = instance.get_physical_device_features(candidate.physical_device);
            if supported_features.depth_clamp == vk::FALSE {
                engine_warn!("mirinae::vulkan::Device", "depthClamp not supported, shadow casters may be clipped");
            }
            let device_features = vk::PhysicalDeviceFeatures::default()
                .depth_clamp(supported_features.depth_clamp == vk::TRUE)
                .sampler_anisotropy(supported_features.sampler_anisotropy == vk::TRUE);

            let queue_priorities = [1.0];
            let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
                .queue_family_index(candidate.graphics_family)
                .queue_priorities(&queue_priorities)];
            if candidate.present_family != candidate.graphics_family {
                queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(candidate.present_family)
                        .queue_priorities(&queue_priorities),
                );
            }

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features);
            let device = instance
                .create_device(candidate.physical_device, &device_create_info, None)
                .map_err(|e| init_error("Failed to create logical device", e))?;

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device: candidate.physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_error("Failed to create GPU allocator", e))?;

            let formats = Self::pick_formats(&instance, candidate.physical_device)?;
            engine_info!(
                "mirinae::vulkan::Device",
                "Attachment formats: depth {:?}, hdr {:?}, unorm {:?}",
                formats.depth, formats.rgba_hdr, formats.rgba_unorm
            );

            let ctx = Arc::new(GpuContext::new(GpuContextParts {
                entry,
                instance,
                physical_device: candidate.physical_device,
                device,
                allocator,
                graphics_queue_family: candidate.graphics_family,
                present_queue_family: candidate.present_family,
                debug_utils_instance,
                debug_messenger,
            }));

            Ok(Self {
                samplers: Mutex::new(SamplerCache::new(Arc::clone(&ctx))),
                descriptors: Arc::new(DescriptorAllocator::new(Arc::clone(&ctx))?),
                formats,
                ctx,
            })
        }
    }

    #[cfg(feature = "vulkan-validation")]
    unsafe fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<(Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);
        crate::debug::init_debug_config();

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(crate::debug::messenger_severity())
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));
        let messenger = debug_utils
            .create_debug_utils_messenger(&debug_info, None)
            .map_err(|e| init_error("Failed to create debug messenger", e))?;

        engine_info!("mirinae::vulkan::Device", "Validation layers enabled");
        Ok((Some(debug_utils), Some(messenger)))
    }

    #[cfg(not(feature = "vulkan-validation"))]
    unsafe fn create_debug_messenger(
        _entry: &ash::Entry,
        _instance: &ash::Instance,
    ) -> Result<(Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>)> {
        Ok((None, None))
    }

    unsafe fn pick_formats(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Result<ImageFormats> {
        let supports = |features: vk::FormatFeatureFlags| {
            move |format: ImageFormat| {
                instance
                    .get_physical_device_format_properties(physical_device, format_to_vk(format))
                    .optimal_tiling_features
                    .contains(features)
            }
        };
        let depth = pick_first_supported(
            &DEPTH_CANDIDATES,
            supports(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT | vk::FormatFeatureFlags::SAMPLED_IMAGE),
        );
        let color_features = vk::FormatFeatureFlags::COLOR_ATTACHMENT
            | vk::FormatFeatureFlags::COLOR_ATTACHMENT_BLEND
            | vk::FormatFeatureFlags::SAMPLED_IMAGE;
        let rgba_hdr = pick_first_supported(&HDR_CANDIDATES, supports(color_features));
        let rgba_unorm = pick_first_supported(&UNORM_CANDIDATES, supports(color_features));

        match (depth, rgba_hdr, rgba_unorm) {
            (Some(depth), Some(rgba_hdr), Some(rgba_unorm)) => Ok(ImageFormats { depth, rgba_hdr, rgba_unorm }),
            _ => {
                engine_error!(
                    "mirinae::vulkan::Device",
                    "Missing attachment format support (depth {:?}, hdr {:?}, unorm {:?})",
                    depth, rgba_hdr, rgba_unorm
                );
                Err(Error::InitializationFailed("Required attachment formats not supported".to_string()))
            }
        }
    }

    /// Create a swapchain presenting to `window`
    pub fn create_swapchain<W: HasDisplayHandle + HasWindowHandle>(
        &self,
        window: &W,
        width: u32,
        height: u32,
    ) -> Result<VulkanSwapchain> {
        let display_handle = window
            .display_handle()
            .map_err(|e| init_error("Failed to get display handle", e))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| init_error("Failed to get window handle", e))?;
        let surface = unsafe {
            ash_window::create_surface(
                &self.ctx.entry,
                &self.ctx.instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(|e| init_error("Failed to create surface", e))?;

        let supported = unsafe {
            self.ctx.surface_loader.get_physical_device_surface_support(
                self.ctx.physical_device,
                self.ctx.present_queue_family,
                surface,
            )
        }
        .unwrap_or(false);
        if !supported {
            unsafe { self.ctx.surface_loader.destroy_surface(surface, None) };
            engine_bail!("mirinae::vulkan::Device", "Present queue cannot present to this window");
        }

        VulkanSwapchain::new(Arc::clone(&self.ctx), surface, width, height)
    }
}

impl GraphicsDevice for VulkanDevice {
    fn create_image(&self, desc: &ImageDesc) -> Result<Arc<dyn Image>> {
        Ok(Arc::new(VulkanImage::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(VulkanBuffer::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        Ok(Arc::new(VulkanRenderPass::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        Ok(Arc::new(VulkanFramebuffer::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        Ok(Arc::new(VulkanPipeline::new_graphics(Arc::clone(&self.ctx), desc)?))
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Arc<dyn Pipeline>> {
        Ok(Arc::new(VulkanPipeline::new_compute(Arc::clone(&self.ctx), desc)?))
    }

    fn create_binding_group(
        &self,
        pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        resources: &[BindingResource],
    ) -> Result<Arc<dyn BindingGroup>> {
        let Some(vk_pipeline) = pipeline.as_any().downcast_ref::<VulkanPipeline>() else {
            engine_bail!("mirinae::vulkan::Device", "Pipeline is not a Vulkan pipeline");
        };
        let group = VulkanBindingGroup::new(&self.descriptors, &self.samplers, vk_pipeline, set_index, resources)?;
        Ok(Arc::new(group))
    }

    fn create_command_pool(&self) -> Result<Box<dyn CommandPool>> {
        Ok(Box::new(VulkanCommandPool::new(Arc::clone(&self.ctx))?))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>> {
        Ok(Arc::new(VulkanSemaphore::new(Arc::clone(&self.ctx))?))
    }

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>> {
        Ok(Arc::new(VulkanFence::new(Arc::clone(&self.ctx), signaled)?))
    }

    fn submit(&self, submission: &Submission) -> Result<()> {
        let mut command_buffers = Vec::with_capacity(submission.command_buffers.len());
        for cmd in submission.command_buffers {
            let list = cmd
                .lock()
                .map_err(|_| Error::BackendError("command list lock poisoned".to_string()))?;
            let Some(vk_list) = list.as_any().downcast_ref::<VulkanCommandList>() else {
                engine_bail!("mirinae::vulkan::Device", "Command list is not a Vulkan command list");
            };
            command_buffers.push(vk_list.command_buffer);
        }

        let mut wait_semaphores = Vec::with_capacity(1);
        let mut wait_stages = Vec::with_capacity(1);
        if let Some((semaphore, stages)) = submission.wait {
            let Some(vk_semaphore) = semaphore.as_any().downcast_ref::<VulkanSemaphore>() else {
                engine_bail!("mirinae::vulkan::Device", "Wait semaphore is not a Vulkan semaphore");
            };
            wait_semaphores.push(vk_semaphore.semaphore);
            wait_stages.push(pipeline_stages_to_vk(stages));
        }
        let mut signal_semaphores = Vec::with_capacity(1);
        if let Some(semaphore) = submission.signal {
            let Some(vk_semaphore) = semaphore.as_any().downcast_ref::<VulkanSemaphore>() else {
                engine_bail!("mirinae::vulkan::Device", "Signal semaphore is not a Vulkan semaphore");
            };
            signal_semaphores.push(vk_semaphore.semaphore);
        }
        let fence = match submission.fence {
            Some(fence) => match fence.as_any().downcast_ref::<VulkanFence>() {
                Some(vk_fence) => vk_fence.fence,
                None => engine_bail!("mirinae::vulkan::Device", "Fence is not a Vulkan fence"),
            },
            None => vk::Fence::null(),
        };

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let _queues = self.ctx.lock_queues()?;
        unsafe { self.ctx.device.queue_submit(self.ctx.graphics_queue, &[submit_info], fence) }
            .map_err(|e| engine_err!("mirinae::vulkan::Device", "Failed to submit commands to GPU queue: {:?}", e))
    }

    fn wait_idle(&self) -> Result<()> {
        let _queues = self.ctx.lock_queues()?;
        unsafe { self.ctx.device.device_wait_idle() }
            .map_err(|e| engine_err!("mirinae::vulkan::Device", "Failed to wait idle: {:?}", e))
    }

    fn image_formats(&self) -> ImageFormats {
        self.formats
    }
}

#[cfg(test)]
#[path = "vulkan_device_tests.rs"]
mod tests;
