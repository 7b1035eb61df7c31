/// GraphicsDevice trait - the factory every GPU object comes from

use std::sync::Arc;
use crate::error::Result;
use crate::device::{
    BindingGroup, BindingResource, Buffer, BufferDesc, CommandBuffer, CommandPool,
    ComputePipelineDesc, Fence, Framebuffer, FramebufferDesc, Image, ImageDesc, ImageFormats,
    Pipeline, PipelineDesc, PipelineStages, RenderPass, RenderPassDesc, Semaphore,
};

/// One queue submission
pub struct Submission<'a> {
    pub command_buffers: &'a [CommandBuffer],
    /// Semaphore waited on before the given stages execute
    pub wait: Option<(&'a dyn Semaphore, PipelineStages)>,
    pub signal: Option<&'a dyn Semaphore>,
    /// Fence signaled when every command buffer completed
    pub fence: Option<&'a dyn Fence>,
}

/// Main device trait
///
/// Implemented by backend-specific devices (e.g., VulkanDevice). All
/// methods take `&self`; backends synchronize internally where needed so
/// that worker threads can create objects during recording.
pub trait GraphicsDevice: Send + Sync {
    fn create_image(&self, desc: &ImageDesc) -> Result<Arc<dyn Image>>;

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>>;

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>>;

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>>;

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>>;

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Arc<dyn Pipeline>>;

    /// Create a binding group for set `set_index` of `pipeline`
    fn create_binding_group(
        &self,
        pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        resources: &[BindingResource],
    ) -> Result<Arc<dyn BindingGroup>>;

    fn create_command_pool(&self) -> Result<Box<dyn CommandPool>>;

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>>;

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>>;

    /// Submit command buffers to the graphics queue
    fn submit(&self, submission: &Submission) -> Result<()>;

    /// Wait for all GPU operations to complete
    fn wait_idle(&self) -> Result<()>;

    /// Formats picked for renderer attachments
    fn image_formats(&self) -> ImageFormats;
}
