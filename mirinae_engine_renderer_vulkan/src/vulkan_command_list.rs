/// VulkanCommandList / VulkanCommandPool - command recording
///
/// A pool hands out primary command buffers and resets all of them at once
/// with `vkResetCommandPool`. Lists keep the pool alive through a shared
/// handle so the VkCommandPool is destroyed after its last buffer.

use ash::vk;
use std::any::Any;
use std::ffi::CString;
use std::sync::{Arc, Mutex};
use mirinae_engine::device::{
    BindingGroup, Buffer, ClearValue, CommandBuffer, CommandList, CommandPool, Extent2D,
    Framebuffer, Image, ImageBarrier, IndexType, Pipeline, Rect2D, RenderPass, ShaderStage, Viewport,
};
use mirinae_engine::mirinae::{Error, Result};
use mirinae_engine::{engine_bail, engine_err};

use crate::vulkan_binding_group::VulkanBindingGroup;
use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    access_flags_to_vk, image_aspect_to_vk, image_layout_to_vk, index_type_to_vk,
    pipeline_stages_to_vk, shader_stages_to_vk,
};
use crate::vulkan_frame_buffer::VulkanFramebuffer;
use crate::vulkan_image::VulkanImage;
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_render_pass::VulkanRenderPass;

struct PoolHandle {
    ctx: Arc<GpuContext>,
    pool: vk::CommandPool,
}

impl Drop for PoolHandle {
    fn drop(&mut self) {
        // Frees every command buffer allocated from it
        unsafe { self.ctx.device.destroy_command_pool(self.pool, None) };
    }
}

/// Command buffer recording state
pub struct VulkanCommandList {
    pool: Arc<PoolHandle>,
    pub(crate) command_buffer: vk::CommandBuffer,
    is_recording: bool,
    in_render_pass: bool,
}

fn downcast_pipeline(pipeline: &Arc<dyn Pipeline>) -> Result<&VulkanPipeline> {
    pipeline
        .as_any()
        .downcast_ref::<VulkanPipeline>()
        .ok_or_else(|| engine_err!("mirinae::vulkan::CommandList", "Pipeline is not a Vulkan pipeline"))
}

fn downcast_buffer(buffer: &Arc<dyn Buffer>) -> Result<&VulkanBuffer> {
    buffer
        .as_any()
        .downcast_ref::<VulkanBuffer>()
        .ok_or_else(|| engine_err!("mirinae::vulkan::CommandList", "Buffer is not a Vulkan buffer"))
}

impl VulkanCommandList {
    fn device(&self) -> &ash::Device {
        &self.pool.ctx.device
    }

    fn ensure_recording(&self) -> Result<()> {
        if !self.is_recording {
            return Err(Error::BackendError("Command list not recording".to_string()));
        }
        Ok(())
    }

    fn ensure_in_render_pass(&self) -> Result<()> {
        self.ensure_recording()?;
        if !self.in_render_pass {
            return Err(Error::BackendError("Not inside a render pass".to_string()));
        }
        Ok(())
    }
}

impl CommandList for VulkanCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            return Err(Error::BackendError("Command list already recording".to_string()));
        }

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device().begin_command_buffer(self.command_buffer, &begin_info) }
            .map_err(|e| engine_err!("mirinae::vulkan::CommandList", "Failed to begin command buffer: {:?}", e))?;

        self.is_recording = true;
        self.in_render_pass = false;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.ensure_recording()?;
        if self.in_render_pass {
            return Err(Error::BackendError("Render pass not ended before ending command list".to_string()));
        }

        unsafe { self.device().end_command_buffer(self.command_buffer) }
            .map_err(|e| engine_err!("mirinae::vulkan::CommandList", "Failed to end command buffer: {:?}", e))?;
        self.is_recording = false;
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        clear_values: &[ClearValue],
        extent: Extent2D,
    ) -> Result<()> {
        self.ensure_recording()?;
        if self.in_render_pass {
            return Err(Error::BackendError("Already inside a render pass".to_string()));
        }

        let Some(vk_render_pass) = render_pass.as_any().downcast_ref::<VulkanRenderPass>() else {
            engine_bail!("mirinae::vulkan::CommandList", "Render pass is not a Vulkan render pass");
        };
        let Some(vk_framebuffer) = framebuffer.as_any().downcast_ref::<VulkanFramebuffer>() else {
            engine_bail!("mirinae::vulkan::CommandList", "Framebuffer is not a Vulkan framebuffer");
        };

        let vk_clear_values: Vec<vk::ClearValue> = clear_values
            .iter()
            .map(|cv| match cv {
                ClearValue::Color(color) => vk::ClearValue {
                    color: vk::ClearColorValue { float32: *color },
                },
                ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth: *depth, stencil: *stencil },
                },
            })
            .collect();

        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_render_pass.render_pass)
            .framebuffer(vk_framebuffer.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D { width: extent.width, height: extent.height },
            })
            .clear_values(&vk_clear_values);

        unsafe {
            self.device().cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
        }
        self.in_render_pass = true;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.ensure_in_render_pass()?;
        unsafe { self.device().cmd_end_render_pass(self.command_buffer) };
        self.in_render_pass = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.ensure_recording()?;
        let vk_viewport = vk::Viewport::default()
            .x(viewport.x)
            .y(viewport.y)
            .width(viewport.width)
            .height(viewport.height)
            .min_depth(viewport.min_depth)
            .max_depth(viewport.max_depth);
        unsafe { self.device().cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]) };
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.ensure_recording()?;
        let vk_scissor = vk::Rect2D::default()
            .offset(vk::Offset2D { x: scissor.x, y: scissor.y })
            .extent(vk::Extent2D { width: scissor.width, height: scissor.height });
        unsafe { self.device().cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]) };
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        self.ensure_recording()?;
        let vk_pipeline = downcast_pipeline(pipeline)?;
        unsafe {
            self.device().cmd_bind_pipeline(
                self.command_buffer,
                vk_pipeline.bind_point(),
                vk_pipeline.pipeline,
            );
        }
        Ok(())
    }

    fn bind_binding_group(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        binding_group: &Arc<dyn BindingGroup>,
    ) -> Result<()> {
        self.ensure_recording()?;
        let vk_pipeline = downcast_pipeline(pipeline)?;
        let Some(group) = binding_group.as_any().downcast_ref::<VulkanBindingGroup>() else {
            engine_bail!("mirinae::vulkan::CommandList", "Binding group is not a Vulkan binding group");
        };
        if set_index >= vk_pipeline.binding_layout_count() {
            engine_bail!(
                "mirinae::vulkan::CommandList",
                "Set index {} out of range (pipeline has {} layouts)",
                set_index, vk_pipeline.binding_layout_count()
            );
        }

        unsafe {
            self.device().cmd_bind_descriptor_sets(
                self.command_buffer,
                vk_pipeline.bind_point(),
                vk_pipeline.layout,
                set_index,
                &[group.descriptor_set],
                &[],
            );
        }
        Ok(())
    }

    fn push_constants(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        stages: &[ShaderStage],
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.ensure_recording()?;
        let vk_pipeline = downcast_pipeline(pipeline)?;
        unsafe {
            self.device().cmd_push_constants(
                self.command_buffer,
                vk_pipeline.layout,
                shader_stages_to_vk(stages),
                offset,
                data,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64) -> Result<()> {
        self.ensure_recording()?;
        let vk_buffer = downcast_buffer(buffer)?;
        unsafe {
            self.device().cmd_bind_vertex_buffers(self.command_buffer, 0, &[vk_buffer.buffer], &[offset]);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()> {
        self.ensure_recording()?;
        let vk_buffer = downcast_buffer(buffer)?;
        unsafe {
            self.device().cmd_bind_index_buffer(
                self.command_buffer,
                vk_buffer.buffer,
                offset,
                index_type_to_vk(index_type),
            );
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.ensure_in_render_pass()?;
        unsafe { self.device().cmd_draw(self.command_buffer, vertex_count, 1, first_vertex, 0) };
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.ensure_in_render_pass()?;
        unsafe {
            self.device().cmd_draw_indexed(self.command_buffer, index_count, 1, first_index, vertex_offset, 0);
        }
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.ensure_recording()?;
        if self.in_render_pass {
            return Err(Error::BackendError("Dispatch inside a render pass".to_string()));
        }
        unsafe { self.device().cmd_dispatch(self.command_buffer, x, y, z) };
        Ok(())
    }

    fn pipeline_barrier(&mut self, barriers: &[ImageBarrier]) -> Result<()> {
        self.ensure_recording()?;
        if barriers.is_empty() {
            return Ok(());
        }

        let mut src_stages = vk::PipelineStageFlags::empty();
        let mut dst_stages = vk::PipelineStageFlags::empty();
        let mut image_barriers = Vec::with_capacity(barriers.len());
        for barrier in barriers {
            let Some(image) = barrier.image.as_any().downcast_ref::<VulkanImage>() else {
                engine_bail!("mirinae::vulkan::CommandList", "Barrier image '{}' is not a Vulkan image", barrier.image.info().name);
            };
            src_stages |= pipeline_stages_to_vk(barrier.old.stages);
            dst_stages |= pipeline_stages_to_vk(barrier.new.stages);
            image_barriers.push(
                vk::ImageMemoryBarrier::default()
                    .src_access_mask(access_flags_to_vk(barrier.old.access))
                    .dst_access_mask(access_flags_to_vk(barrier.new.access))
                    .old_layout(image_layout_to_vk(barrier.old.layout))
                    .new_layout(image_layout_to_vk(barrier.new.layout))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(image.image)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: image_aspect_to_vk(barrier.aspect),
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: barrier.base_layer,
                        layer_count: barrier.layer_count,
                    }),
            );
        }

        unsafe {
            self.device().cmd_pipeline_barrier(
                self.command_buffer,
                src_stages,
                dst_stages,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &image_barriers,
            );
        }
        Ok(())
    }

    fn begin_label(&mut self, name: &str) -> Result<()> {
        self.ensure_recording()?;
        if let Some(debug_utils) = &self.pool.ctx.debug_utils_device {
            let name = CString::new(name).unwrap_or_default();
            let label = vk::DebugUtilsLabelEXT::default().label_name(&name);
            unsafe { debug_utils.cmd_begin_debug_utils_label(self.command_buffer, &label) };
        }
        Ok(())
    }

    fn end_label(&mut self) -> Result<()> {
        self.ensure_recording()?;
        if let Some(debug_utils) = &self.pool.ctx.debug_utils_device {
            unsafe { debug_utils.cmd_end_debug_utils_label(self.command_buffer) };
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Pool of primary command buffers for one (frame slot, thread) pair
pub struct VulkanCommandPool {
    handle: Arc<PoolHandle>,
    allocated: Vec<Arc<Mutex<VulkanCommandList>>>,
}

impl VulkanCommandPool {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(ctx.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { ctx.device.create_command_pool(&create_info, None) }
            .map_err(|e| engine_err!("mirinae::vulkan::CommandPool", "Failed to create command pool: {:?}", e))?;

        Ok(Self {
            handle: Arc::new(PoolHandle { ctx, pool }),
            allocated: Vec::new(),
        })
    }
}

impl CommandPool for VulkanCommandPool {
    fn reset(&mut self) -> Result<()> {
        let ctx = &self.handle.ctx;
        unsafe { ctx.device.reset_command_pool(self.handle.pool, vk::CommandPoolResetFlags::empty()) }
            .map_err(|e| engine_err!("mirinae::vulkan::CommandPool", "Failed to reset command pool: {:?}", e))?;

        for list in &self.allocated {
            let mut list = list
                .lock()
                .map_err(|_| Error::BackendError("command list lock poisoned".to_string()))?;
            list.is_recording = false;
            list.in_render_pass = false;
        }
        Ok(())
    }

    fn allocate(&mut self, count: usize) -> Result<Vec<CommandBuffer>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.handle.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count as u32);
        let command_buffers = unsafe { self.handle.ctx.device.allocate_command_buffers(&allocate_info) }
            .map_err(|e| engine_err!("mirinae::vulkan::CommandPool", "Failed to allocate command buffers: {:?}", e))?;

        let mut out: Vec<CommandBuffer> = Vec::with_capacity(count);
        for command_buffer in command_buffers {
            let list = Arc::new(Mutex::new(VulkanCommandList {
                pool: Arc::clone(&self.handle),
                command_buffer,
                is_recording: false,
                in_render_pass: false,
            }));
            self.allocated.push(Arc::clone(&list));
            out.push(list);
        }
        Ok(out)
    }
}
