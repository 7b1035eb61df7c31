/// Mock graphics device for unit tests (no GPU required)
///
/// Every object logs what happens to it in a shared event list and keeps a
/// live-object counter up to date, so tests can check ordering (fence wait
/// before pool reset) and leaks (framebuffers dropped on resize).

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::device::{
    BindingGroup, BindingResource, Buffer, BufferDesc, ClearValue, CommandBuffer, CommandList,
    CommandPool, ComputePipelineDesc, Extent2D, Fence, Framebuffer, FramebufferDesc,
    GraphicsDevice, Image, ImageBarrier, ImageDesc, ImageFormat, ImageFormats, ImageInfo,
    ImageUsage, IndexType, Pipeline, PipelineDesc, PipelineKind, Rect2D, RenderPass,
    RenderPassDesc, Semaphore, ShaderProvider, ShaderStage, Submission, Swapchain, Viewport,
};
use crate::error::{Error, Result};
use crate::frame::SwapchainImageIndex;

pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Live object counters (incremented on create, decremented on drop)
#[derive(Debug, Default)]
pub struct LiveCounters {
    pub images: AtomicUsize,
    pub buffers: AtomicUsize,
    pub framebuffers: AtomicUsize,
    pub binding_groups: AtomicUsize,
}

impl LiveCounters {
    pub fn framebuffers(&self) -> usize {
        self.framebuffers.load(Ordering::SeqCst)
    }

    pub fn images(&self) -> usize {
        self.images.load(Ordering::SeqCst)
    }
}

struct LiveGuard {
    counters: Arc<LiveCounters>,
    pick: fn(&LiveCounters) -> &AtomicUsize,
}

impl LiveGuard {
    fn new(counters: &Arc<LiveCounters>, pick: fn(&LiveCounters) -> &AtomicUsize) -> Self {
        pick(counters).fetch_add(1, Ordering::SeqCst);
        Self { counters: counters.clone(), pick }
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        (self.pick)(&self.counters).fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Mock Image / Buffer
// ============================================================================

pub struct MockImage {
    pub info: ImageInfo,
    _live: Option<LiveGuard>,
}

impl MockImage {
    pub fn new(desc: &ImageDesc) -> Self {
        Self { info: ImageInfo::from(desc), _live: None }
    }
}

impl Image for MockImage {
    fn info(&self) -> &ImageInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockBuffer {
    pub size: u64,
    pub data: Mutex<Vec<u8>>,
    _live: LiveGuard,
}

impl Buffer for MockBuffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset as usize + data.len();
        if end as u64 > self.size {
            crate::engine_bail!("mirinae::mock", "buffer update out of range ({} > {})", end, self.size);
        }
        let mut bytes = self.data.lock().unwrap();
        bytes[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock RenderPass / Framebuffer / Pipeline / BindingGroup
// ============================================================================

pub struct MockRenderPass {
    pub name: String,
}

impl RenderPass for MockRenderPass {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockFramebuffer {
    pub width: u32,
    pub height: u32,
    pub attachments: Vec<Arc<dyn Image>>,
    _live: LiveGuard,
}

impl Framebuffer for MockFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockPipeline {
    pub name: String,
    pub kind: PipelineKind,
    pub layout_count: u32,
}

impl Pipeline for MockPipeline {
    fn kind(&self) -> PipelineKind {
        self.kind
    }

    fn binding_layout_count(&self) -> u32 {
        self.layout_count
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockBindingGroup {
    pub set_index: u32,
    pub image_names: Vec<String>,
    _live: LiveGuard,
}

impl BindingGroup for MockBindingGroup {
    fn set_index(&self) -> u32 {
        self.set_index
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock CommandList / CommandPool
// ============================================================================

#[derive(Debug, Default)]
pub struct MockCommandList {
    pub commands: Vec<String>,
}

impl MockCommandList {
    pub fn new() -> Self {
        Self { commands: Vec::new() }
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        self.commands.push("begin".to_string());
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.commands.push("end".to_string());
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        _clear_values: &[ClearValue],
        extent: Extent2D,
    ) -> Result<()> {
        let name = render_pass
            .as_any()
            .downcast_ref::<MockRenderPass>()
            .map(|rp| rp.name.clone())
            .unwrap_or_default();
        if extent.width > framebuffer.width() || extent.height > framebuffer.height() {
            crate::engine_bail!("mirinae::mock", "render area larger than framebuffer");
        }
        self.commands.push(format!("begin_render_pass:{}:{}x{}", name, extent.width, extent.height));
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.commands.push("end_render_pass".to_string());
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.commands.push(format!(
            "set_viewport:{}:{}:{}x{}",
            viewport.x, viewport.y, viewport.width, viewport.height
        ));
        Ok(())
    }

    fn set_scissor(&mut self, _scissor: Rect2D) -> Result<()> {
        self.commands.push("set_scissor".to_string());
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        let name = pipeline
            .as_any()
            .downcast_ref::<MockPipeline>()
            .map(|p| p.name.clone())
            .unwrap_or_default();
        self.commands.push(format!("bind_pipeline:{}", name));
        Ok(())
    }

    fn bind_binding_group(
        &mut self,
        _pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        _binding_group: &Arc<dyn BindingGroup>,
    ) -> Result<()> {
        self.commands.push(format!("bind_binding_group:{}", set_index));
        Ok(())
    }

    fn push_constants(
        &mut self,
        _pipeline: &Arc<dyn Pipeline>,
        _stages: &[ShaderStage],
        _offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.commands.push(format!("push_constants:{}", data.len()));
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, _buffer: &Arc<dyn Buffer>, _offset: u64) -> Result<()> {
        self.commands.push("bind_vertex_buffer".to_string());
        Ok(())
    }

    fn bind_index_buffer(&mut self, _buffer: &Arc<dyn Buffer>, _offset: u64, _index_type: IndexType) -> Result<()> {
        self.commands.push("bind_index_buffer".to_string());
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, _first_vertex: u32) -> Result<()> {
        self.commands.push(format!("draw:{}", vertex_count));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, _first_index: u32, _vertex_offset: i32) -> Result<()> {
        self.commands.push(format!("draw_indexed:{}", index_count));
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.commands.push(format!("dispatch:{}x{}x{}", x, y, z));
        Ok(())
    }

    fn pipeline_barrier(&mut self, barriers: &[ImageBarrier]) -> Result<()> {
        for barrier in barriers {
            self.commands.push(format!(
                "barrier:{}:{:?}->{:?}",
                barrier.image.info().name, barrier.old.layout, barrier.new.layout
            ));
        }
        Ok(())
    }

    fn begin_label(&mut self, name: &str) -> Result<()> {
        self.commands.push(format!("label:{}", name));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockCommandPool {
    pub id: usize,
    events: EventLog,
    allocated: Vec<Arc<Mutex<MockCommandList>>>,
}

impl CommandPool for MockCommandPool {
    fn reset(&mut self) -> Result<()> {
        for list in &self.allocated {
            list.lock().unwrap().commands.clear();
        }
        self.events.lock().unwrap().push(format!("pool_reset:{}", self.id));
        Ok(())
    }

    fn allocate(&mut self, count: usize) -> Result<Vec<CommandBuffer>> {
        let mut out: Vec<CommandBuffer> = Vec::with_capacity(count);
        for _ in 0..count {
            let list = Arc::new(Mutex::new(MockCommandList::new()));
            self.allocated.push(list.clone());
            out.push(list);
        }
        Ok(out)
    }
}

// ============================================================================
// Mock Semaphore / Fence
// ============================================================================

pub struct MockSemaphore {
    pub id: usize,
}

impl Semaphore for MockSemaphore {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockFence {
    pub id: usize,
    pub signaled: AtomicBool,
    events: EventLog,
}

impl Fence for MockFence {
    fn wait(&self) -> Result<()> {
        self.events.lock().unwrap().push(format!("fence_wait:{}", self.id));
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        self.signaled.store(false, Ordering::SeqCst);
        self.events.lock().unwrap().push(format!("fence_reset:{}", self.id));
        Ok(())
    }

    fn is_signaled(&self) -> Result<bool> {
        Ok(self.signaled.load(Ordering::SeqCst))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    width: u32,
    height: u32,
    images: Vec<Arc<dyn Image>>,
    next: usize,
    /// Set to make the next acquire/present report an out-of-date surface
    pub out_of_date: Arc<AtomicBool>,
    events: EventLog,
}

impl MockSwapchain {
    pub fn new(width: u32, height: u32, image_count: usize, events: EventLog) -> Self {
        let mut swapchain = Self {
            width,
            height,
            images: Vec::new(),
            next: 0,
            out_of_date: Arc::new(AtomicBool::new(false)),
            events,
        };
        swapchain.make_images(image_count);
        swapchain
    }

    fn make_images(&mut self, count: usize) {
        self.images = (0..count)
            .map(|i| {
                Arc::new(MockImage::new(&ImageDesc {
                    name: format!("swapchain#{}", i),
                    width: self.width,
                    height: self.height,
                    format: ImageFormat::B8G8R8A8_SRGB,
                    usage: ImageUsage::COLOR_ATTACHMENT,
                    array_layers: 1,
                })) as Arc<dyn Image>
            })
            .collect();
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self, _signal: &dyn Semaphore) -> Result<SwapchainImageIndex> {
        if self.out_of_date.load(Ordering::SeqCst) {
            self.events.lock().unwrap().push("acquire:out_of_date".to_string());
            return Err(Error::SurfaceOutOfDate);
        }
        let index = self.next;
        self.next = (self.next + 1) % self.images.len();
        self.events.lock().unwrap().push(format!("acquire:{}", index));
        Ok(SwapchainImageIndex::new(index))
    }

    fn present(&mut self, index: SwapchainImageIndex, _wait: &dyn Semaphore) -> Result<()> {
        if self.out_of_date.load(Ordering::SeqCst) {
            self.events.lock().unwrap().push("present:out_of_date".to_string());
            return Err(Error::SurfaceOutOfDate);
        }
        self.events.lock().unwrap().push(format!("present:{}", index.get()));
        Ok(())
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        let count = self.images.len();
        self.make_images(count);
        self.next = 0;
        self.out_of_date.store(false, Ordering::SeqCst);
        self.events.lock().unwrap().push(format!("swapchain_recreate:{}x{}", width, height));
        Ok(())
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn format(&self) -> ImageFormat {
        ImageFormat::B8G8R8A8_SRGB
    }

    fn image(&self, index: usize) -> Arc<dyn Image> {
        self.images[index % self.images.len()].clone()
    }
}

// ============================================================================
// Mock ShaderProvider
// ============================================================================

/// Hands out a few placeholder bytes for any shader name
pub struct MockShaderProvider;

impl ShaderProvider for MockShaderProvider {
    fn load(&self, name: &str) -> Result<Vec<u8>> {
        Ok(name.as_bytes().to_vec())
    }
}

// ============================================================================
// Mock Device
// ============================================================================

/// Mock device that tracks created objects without a GPU
pub struct MockDevice {
    pub events: EventLog,
    pub live: Arc<LiveCounters>,
    next_id: AtomicUsize,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            live: Arc::new(LiveCounters::default()),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Swapchain sharing this device's event log
    pub fn create_swapchain(&self, width: u32, height: u32) -> MockSwapchain {
        MockSwapchain::new(width, height, 3, self.events.clone())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }

    fn id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl GraphicsDevice for MockDevice {
    fn create_image(&self, desc: &ImageDesc) -> Result<Arc<dyn Image>> {
        if desc.width == 0 || desc.height == 0 {
            crate::engine_bail!("mirinae::mock", "image '{}' has zero extent", desc.name);
        }
        let mut image = MockImage::new(desc);
        image._live = Some(LiveGuard::new(&self.live, |c| &c.images));
        Ok(Arc::new(image))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(MockBuffer {
            size: desc.size,
            data: Mutex::new(vec![0u8; desc.size as usize]),
            _live: LiveGuard::new(&self.live, |c| &c.buffers),
        }))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        Ok(Arc::new(MockRenderPass { name: desc.name.clone() }))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        for attachment in &desc.attachments {
            let info = attachment.info();
            if info.width < desc.width || info.height < desc.height {
                crate::engine_bail!(
                    "mirinae::mock",
                    "attachment '{}' ({}x{}) smaller than framebuffer ({}x{})",
                    info.name, info.width, info.height, desc.width, desc.height
                );
            }
        }
        self.events
            .lock()
            .unwrap()
            .push(format!("create_framebuffer:{}x{}", desc.width, desc.height));
        Ok(Arc::new(MockFramebuffer {
            width: desc.width,
            height: desc.height,
            attachments: desc.attachments.clone(),
            _live: LiveGuard::new(&self.live, |c| &c.framebuffers),
        }))
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        Ok(Arc::new(MockPipeline {
            name: desc.name.clone(),
            kind: PipelineKind::Graphics,
            layout_count: desc.binding_layouts.len() as u32,
        }))
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Arc<dyn Pipeline>> {
        Ok(Arc::new(MockPipeline {
            name: desc.name.clone(),
            kind: PipelineKind::Compute,
            layout_count: desc.binding_layouts.len() as u32,
        }))
    }

    fn create_binding_group(
        &self,
        pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        resources: &[BindingResource],
    ) -> Result<Arc<dyn BindingGroup>> {
        if set_index >= pipeline.binding_layout_count() {
            crate::engine_bail!("mirinae::mock", "set index {} out of range", set_index);
        }
        let mut image_names = Vec::new();
        for resource in resources {
            match resource {
                BindingResource::SampledImage(image, _) | BindingResource::StorageImage(image) => {
                    image_names.push(image.info().name.clone())
                }
                BindingResource::SampledImageArray(images, _) => {
                    image_names.extend(images.iter().map(|i| i.info().name.clone()))
                }
                BindingResource::UniformBuffer(_) => {}
            }
        }
        Ok(Arc::new(MockBindingGroup {
            set_index,
            image_names,
            _live: LiveGuard::new(&self.live, |c| &c.binding_groups),
        }))
    }

    fn create_command_pool(&self) -> Result<Box<dyn CommandPool>> {
        Ok(Box::new(MockCommandPool {
            id: self.id(),
            events: self.events.clone(),
            allocated: Vec::new(),
        }))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>> {
        Ok(Arc::new(MockSemaphore { id: self.id() }))
    }

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>> {
        Ok(Arc::new(MockFence {
            id: self.id(),
            signaled: AtomicBool::new(signaled),
            events: self.events.clone(),
        }))
    }

    fn submit(&self, submission: &Submission) -> Result<()> {
        let mut recorded = 0;
        for cmd in submission.command_buffers {
            let guard = cmd.lock().unwrap();
            if let Some(list) = guard.as_any().downcast_ref::<MockCommandList>() {
                recorded += list.commands.len();
            }
        }
        if let Some(fence) = submission.fence {
            if let Some(fence) = fence.as_any().downcast_ref::<MockFence>() {
                fence.signaled.store(true, Ordering::SeqCst);
            }
        }
        self.events.lock().unwrap().push(format!(
            "submit:{}:{}",
            submission.command_buffers.len(),
            recorded
        ));
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.events.lock().unwrap().push("wait_idle".to_string());
        Ok(())
    }

    fn image_formats(&self) -> ImageFormats {
        ImageFormats::default()
    }
}
