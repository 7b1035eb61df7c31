/// Render pass contract and shared pass resources
///
/// A pass (`RenderPassBase`) is built once from an `RpCreateBundle` and
/// rebuilt per resolution through `on_resize`. Each frame it hands out a
/// `RenderPassTask` that borrows it for the duration of the frame:
///
/// 1. `prepare` runs serially, in pass order, and derives the barriers the
///    pass needs from the shared `ImageStateTracker`
/// 2. `update_task` bodies of every pass run in parallel, then join
/// 3. `record_task` bodies run in parallel, each into its own command buffer
/// 4. `collect_cmdbuf` pushes the recorded buffer in pass order
///
/// `RenderPassLifecycle` holds the construct-once objects (render pass and
/// pipeline) next to the per-frame data that resizing rebuilds.

use std::sync::{Arc, Mutex, RwLock};
use crate::config::RendererConfig;
use crate::device::{
    AttachmentDesc, BindingGroupLayoutDesc, ColorBlendState, CommandBuffer, DepthState, Extent2D,
    GraphicsDevice, Image, ImageBarrier, ImageFormat, ImageLayout, LoadOp, Pipeline, PipelineDesc,
    PrimitiveTopology, PushConstantRange, RasterizationState, RenderPass, RenderPassDesc,
    ShaderProvider, ShaderStage, StoreOp, Swapchain, VertexLayout,
};
use crate::error::{Error, Result};
use crate::frame::{CmdBufList, FrameIndex, RpCommandPool};
use crate::render::shadow::ShadowMaps;
use crate::render::{FbufImageBundle, ImageStateTracker, RenderTargetManager, RpContext};

// ============================================================================
// Shared resources
// ============================================================================

/// Swapchain images as seen by the passes
#[derive(Clone, Default)]
pub struct SwapchainImages {
    pub images: Vec<Arc<dyn Image>>,
    pub format: Option<ImageFormat>,
    pub extent: Extent2D,
}

impl SwapchainImages {
    pub fn from_swapchain(swapchain: &dyn Swapchain) -> Self {
        Self {
            images: (0..swapchain.image_count()).map(|i| swapchain.image(i)).collect(),
            format: Some(swapchain.format()),
            extent: Extent2D::new(swapchain.width(), swapchain.height()),
        }
    }
}

/// Resources shared by every pass
///
/// Written only while no pass records: during construction, under resize
/// (device idle) or from the serial frame tasks that run before
/// `render_passes`.
pub struct RpResources {
    pub device: Arc<dyn GraphicsDevice>,
    pub shaders: Arc<dyn ShaderProvider>,
    pub cmd_pool: RpCommandPool,
    pub ren_img: RenderTargetManager,
    pub gbuf: RwLock<FbufImageBundle>,
    pub shadow_maps: RwLock<Box<dyn ShadowMaps>>,
    pub swapchain: RwLock<SwapchainImages>,
    pub image_states: Mutex<ImageStateTracker>,
}

impl RpResources {
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        shaders: Arc<dyn ShaderProvider>,
        shadow_maps: Box<dyn ShadowMaps>,
        thread_count: usize,
    ) -> Result<Self> {
        let cmd_pool = RpCommandPool::new(device.as_ref(), thread_count)?;
        Ok(Self {
            device,
            shaders,
            cmd_pool,
            ren_img: RenderTargetManager::new(),
            gbuf: RwLock::new(FbufImageBundle::new()),
            shadow_maps: RwLock::new(shadow_maps),
            swapchain: RwLock::new(SwapchainImages::default()),
            image_states: Mutex::new(ImageStateTracker::new()),
        })
    }

    pub fn gbuf(&self) -> Result<std::sync::RwLockReadGuard<'_, FbufImageBundle>> {
        self.gbuf.read().map_err(|_| poisoned("gbuf"))
    }

    pub fn gbuf_mut(&self) -> Result<std::sync::RwLockWriteGuard<'_, FbufImageBundle>> {
        self.gbuf.write().map_err(|_| poisoned("gbuf"))
    }

    pub fn shadow_maps(&self) -> Result<std::sync::RwLockReadGuard<'_, Box<dyn ShadowMaps>>> {
        self.shadow_maps.read().map_err(|_| poisoned("shadow maps"))
    }

    pub fn shadow_maps_mut(&self) -> Result<std::sync::RwLockWriteGuard<'_, Box<dyn ShadowMaps>>> {
        self.shadow_maps.write().map_err(|_| poisoned("shadow maps"))
    }

    pub fn swapchain(&self) -> Result<std::sync::RwLockReadGuard<'_, SwapchainImages>> {
        self.swapchain.read().map_err(|_| poisoned("swapchain images"))
    }

    pub fn swapchain_mut(&self) -> Result<std::sync::RwLockWriteGuard<'_, SwapchainImages>> {
        self.swapchain.write().map_err(|_| poisoned("swapchain images"))
    }
}

fn poisoned(what: &str) -> Error {
    Error::BackendError(format!("{} lock poisoned", what))
}

/// Everything a pass constructor needs
///
/// Passes keep a clone of `resources` for their whole lifetime.
pub struct RpCreateBundle<'a> {
    pub device: &'a Arc<dyn GraphicsDevice>,
    pub resources: &'a Arc<RpResources>,
    pub config: &'a RendererConfig,
}

// ============================================================================
// Pass contract
// ============================================================================

pub trait RenderPassBase: Send + Sync {
    fn name(&self) -> &str;

    /// Rebuild every per-resolution object; `width`/`height` is the swapchain size
    fn on_resize(&mut self, width: u32, height: u32, res: &RpResources) -> Result<()>;

    /// Task recording this pass for one frame, `None` when the pass has
    /// nothing to do
    fn create_task(&self) -> Option<Box<dyn RenderPassTask + '_>>;
}

pub trait RenderPassTask: Send + Sync {
    fn name(&self) -> &str;

    /// Serial, in pass order; declare image uses here
    fn prepare(&mut self, ctxt: &RpContext, image_states: &mut ImageStateTracker);

    fn update_task(&self, _ctxt: &RpContext) -> Result<()> {
        Ok(())
    }

    fn record_task(&self, ctxt: &RpContext, cmd_pool: &RpCommandPool) -> Result<()>;

    fn collect_cmdbuf(&self, out: &CmdBufList, f_index: FrameIndex);
}

/// Command buffer slot filled by `record_task` and drained by `collect_cmdbuf`
#[derive(Default)]
pub struct RecordedCmdBuf {
    slot: Mutex<Option<CommandBuffer>>,
}

impl RecordedCmdBuf {
    pub fn store(&self, cmdbuf: CommandBuffer) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(cmdbuf);
        }
    }

    pub fn collect(&self, out: &CmdBufList, f_index: FrameIndex) {
        if let Some(cmdbuf) = self.slot.lock().ok().and_then(|mut slot| slot.take()) {
            out.add(f_index, cmdbuf);
        }
    }
}

/// Barriers gathered in `prepare`, recorded first in `record_task`
#[derive(Default)]
pub struct PendingBarriers {
    barriers: Vec<ImageBarrier>,
}

impl PendingBarriers {
    pub fn require(
        &mut self,
        image_states: &mut ImageStateTracker,
        image: &Arc<dyn Image>,
        state: crate::device::ImageState,
    ) {
        if let Some(barrier) = image_states.require(image, state) {
            self.barriers.push(barrier);
        }
    }

    /// Like `require`, but the previous contents are not needed
    pub fn overwrite(
        &mut self,
        image_states: &mut ImageStateTracker,
        image: &Arc<dyn Image>,
        state: crate::device::ImageState,
    ) {
        image_states.discard(image);
        self.require(image_states, image, state);
    }

    pub fn as_slice(&self) -> &[ImageBarrier] {
        &self.barriers
    }

    pub fn is_empty(&self) -> bool {
        self.barriers.is_empty()
    }
}

/// Get a fresh command buffer, record into it with `body` and stash it in `out`
///
/// `body` runs between `begin` and `end` with the barriers already recorded.
pub fn record_with_cmdbuf(
    label: &str,
    ctxt: &RpContext,
    cmd_pool: &RpCommandPool,
    barriers: &PendingBarriers,
    out: &RecordedCmdBuf,
    body: impl FnOnce(&mut dyn crate::device::CommandList) -> Result<()>,
) -> Result<()> {
    let cmdbuf = cmd_pool.get_for_current_thread(ctxt.f_index)?;
    {
        let mut cmd = cmdbuf.lock().map_err(|_| poisoned("command buffer"))?;
        cmd.begin()?;
        cmd.begin_label(label)?;
        if !barriers.is_empty() {
            cmd.pipeline_barrier(barriers.as_slice())?;
        }
        body(&mut *cmd)?;
        cmd.end_label()?;
        cmd.end()?;
    }
    out.store(cmdbuf);
    Ok(())
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Render pass + pipeline built once, per-frame data rebuilt on resize
pub struct RenderPassLifecycle<F> {
    name: String,
    render_pass: Arc<dyn RenderPass>,
    pipeline: Arc<dyn Pipeline>,
    frames: Vec<F>,
    extent: Extent2D,
}

impl<F> RenderPassLifecycle<F> {
    pub fn new(name: impl Into<String>, render_pass: Arc<dyn RenderPass>, pipeline: Arc<dyn Pipeline>) -> Self {
        Self {
            name: name.into(),
            render_pass,
            pipeline,
            frames: Vec::new(),
            extent: Extent2D::default(),
        }
    }

    /// Replace every frame's data with `make(f_index)`
    ///
    /// The old data is dropped only after every new frame was built, so a
    /// failed rebuild leaves the pass untouched.
    pub fn rebuild(
        &mut self,
        extent: Extent2D,
        mut make: impl FnMut(FrameIndex, &Arc<dyn RenderPass>, &Arc<dyn Pipeline>) -> Result<F>,
    ) -> Result<()> {
        let mut frames = Vec::with_capacity(crate::frame::MAX_FRAMES_IN_FLIGHT);
        for f_index in FrameIndex::all() {
            frames.push(make(f_index, &self.render_pass, &self.pipeline)?);
        }
        self.frames = frames;
        self.extent = extent;
        crate::engine_debug!(
            "mirinae::RenderPass",
            "'{}' rebuilt at {}x{}",
            self.name, extent.width, extent.height
        );
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.render_pass
    }

    pub fn pipeline(&self) -> &Arc<dyn Pipeline> {
        &self.pipeline
    }

    pub fn frame(&self, f_index: FrameIndex) -> Option<&F> {
        self.frames.get(f_index.get())
    }

    pub fn frames(&self) -> &[F] {
        &self.frames
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }
}

/// Declarative builder for a single-subpass render pass and its pipeline
pub struct PassBuilder {
    name: String,
    colors: Vec<(AttachmentDesc, ColorBlendState)>,
    depth: Option<AttachmentDesc>,
    vertex_shader: String,
    fragment_shader: Option<String>,
    vertex_layout: VertexLayout,
    binding_layouts: Vec<BindingGroupLayoutDesc>,
    push_constants: Vec<PushConstantRange>,
    rasterization: RasterizationState,
    depth_state: DepthState,
}

impl PassBuilder {
    /// Fullscreen-triangle defaults: no vertex input, no culling, no depth test
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            colors: Vec::new(),
            depth: None,
            vertex_shader: "fill_screen.vert".to_string(),
            fragment_shader: None,
            vertex_layout: VertexLayout::default(),
            binding_layouts: Vec::new(),
            push_constants: Vec::new(),
            rasterization: RasterizationState {
                cull_mode: crate::device::CullMode::None,
                ..RasterizationState::default()
            },
            depth_state: DepthState::DISABLED,
        }
    }

    /// Color attachment kept in `layout` before and after the pass
    pub fn color(mut self, format: ImageFormat, load_op: LoadOp, layout: ImageLayout, blend: ColorBlendState) -> Self {
        self.colors.push((
            AttachmentDesc {
                format,
                load_op,
                store_op: StoreOp::Store,
                initial_layout: layout,
                final_layout: layout,
            },
            blend,
        ));
        self
    }

    /// Color attachment handed over in `final_layout` (e.g. presentation)
    pub fn color_final(mut self, format: ImageFormat, load_op: LoadOp, final_layout: ImageLayout) -> Self {
        self.colors.push((
            AttachmentDesc {
                format,
                load_op,
                store_op: StoreOp::Store,
                initial_layout: ImageLayout::ColorAttachment,
                final_layout,
            },
            ColorBlendState::default(),
        ));
        self
    }

    pub fn depth(mut self, format: ImageFormat, load_op: LoadOp) -> Self {
        self.depth = Some(AttachmentDesc {
            format,
            load_op,
            store_op: StoreOp::Store,
            initial_layout: ImageLayout::DepthStencilAttachment,
            final_layout: ImageLayout::DepthStencilAttachment,
        });
        self.depth_state = DepthState::default();
        self
    }

    pub fn shaders(mut self, vertex: &str, fragment: Option<&str>) -> Self {
        self.vertex_shader = vertex.to_string();
        self.fragment_shader = fragment.map(str::to_string);
        self
    }

    pub fn vertex_layout(mut self, layout: VertexLayout) -> Self {
        self.vertex_layout = layout;
        self
    }

    /// Append the layout of the next set index
    pub fn binding_layout(mut self, layout: BindingGroupLayoutDesc) -> Self {
        self.binding_layouts.push(layout);
        self
    }

    pub fn push_constant(mut self, stages: &[ShaderStage], size: u32) -> Self {
        let offset = self.push_constants.iter().map(|r| r.offset + r.size).max().unwrap_or(0);
        self.push_constants.push(PushConstantRange { stages: stages.to_vec(), offset, size });
        self
    }

    pub fn rasterization(mut self, state: RasterizationState) -> Self {
        self.rasterization = state;
        self
    }

    pub fn depth_state(mut self, state: DepthState) -> Self {
        self.depth_state = state;
        self
    }

    pub fn build<F>(self, device: &dyn GraphicsDevice, shaders: &dyn ShaderProvider) -> Result<RenderPassLifecycle<F>> {
        let render_pass = device.create_render_pass(&RenderPassDesc {
            name: self.name.clone(),
            color_attachments: self.colors.iter().map(|(a, _)| a.clone()).collect(),
            depth_attachment: self.depth.clone(),
        })?;

        let vertex_shader = shaders.shader(&self.vertex_shader, ShaderStage::Vertex)?;
        let fragment_shader = match &self.fragment_shader {
            Some(name) => Some(shaders.shader(name, ShaderStage::Fragment)?),
            None => None,
        };

        let pipeline = device.create_pipeline(&PipelineDesc {
            name: self.name.clone(),
            render_pass: render_pass.clone(),
            vertex_shader,
            fragment_shader,
            vertex_layout: self.vertex_layout,
            topology: PrimitiveTopology::TriangleList,
            binding_layouts: self.binding_layouts,
            push_constant_ranges: self.push_constants,
            rasterization: self.rasterization,
            depth: self.depth_state,
            color_blend: self.colors.iter().map(|(_, b)| *b).collect(),
        })?;

        crate::engine_debug!("mirinae::RenderPass", "Created pass '{}'", self.name);
        Ok(RenderPassLifecycle::new(self.name, render_pass, pipeline))
    }
}

#[cfg(test)]
#[path = "pass_tests.rs"]
mod tests;
