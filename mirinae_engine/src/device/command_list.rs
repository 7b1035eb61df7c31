/// CommandList trait - for recording GPU commands

use std::any::Any;
use std::sync::{Arc, Mutex};
use crate::error::Result;
use crate::device::{
    BindingGroup, Buffer, Framebuffer, ImageBarrier, IndexType, Pipeline, RenderPass, ShaderStage,
};

/// Shared handle to a recorded or recordable command list
///
/// Handed out by `RpCommandPool`, recorded by exactly one task per frame and
/// collected for submission afterwards.
pub type CommandBuffer = Arc<Mutex<dyn CommandList>>;

/// Command list for recording rendering commands
///
/// Commands are recorded and later submitted via `GraphicsDevice::submit()`.
pub trait CommandList: Send + Sync {
    /// Begin recording (one-time submit)
    fn begin(&mut self) -> Result<()>;

    fn end(&mut self) -> Result<()>;

    /// Begin a render pass over the full `extent` of `framebuffer`
    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        clear_values: &[ClearValue],
        extent: Extent2D,
    ) -> Result<()>;

    fn end_render_pass(&mut self) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    /// Bind a graphics or compute pipeline
    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()>;

    /// Bind a binding group at `set_index` of `pipeline`'s layout
    fn bind_binding_group(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        binding_group: &Arc<dyn BindingGroup>,
    ) -> Result<()>;

    fn push_constants(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        stages: &[ShaderStage],
        offset: u32,
        data: &[u8],
    ) -> Result<()>;

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64) -> Result<()>;

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()>;

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()>;

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()>;

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()>;

    /// Record image layout transitions / memory dependencies
    fn pipeline_barrier(&mut self, barriers: &[ImageBarrier]) -> Result<()>;

    /// Open a labelled region for GPU debuggers
    fn begin_label(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn end_label(&mut self) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
}

/// Native command pool: one per (frame slot, worker thread)
pub trait CommandPool: Send + Sync {
    /// Reset every buffer allocated from this pool
    fn reset(&mut self) -> Result<()>;

    /// Allocate `count` primary command buffers
    fn allocate(&mut self, count: usize) -> Result<Vec<CommandBuffer>>;
}

/// Width/height pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height
    pub fn calc_ratio(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-depth viewport covering `extent`
    pub fn from_extent(extent: Extent2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 2D rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn from_extent(extent: Extent2D) -> Self {
        Self { x: 0, y: 0, width: extent.width, height: extent.height }
    }
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Color clear value (RGBA)
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}
