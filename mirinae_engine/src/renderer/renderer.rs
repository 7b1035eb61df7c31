/// Renderer - owns the frame resources and drives submission
///
/// One frame is two steps. The task graph from `build_render_stage` fills the
/// frame context and records every pass; `do_frame` then submits what was
/// collected and presents. Both run on the engine thread, the graph bodies
/// on the scheduler's workers.

use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use rayon::prelude::*;
use crate::config::RendererConfig;
use crate::device::{GraphicsDevice, PipelineStages, ShaderProvider, Submission, Swapchain};
use crate::error::{Error, Result};
use crate::frame::{is_fbuf_too_small, CmdBufList, FlagShip, FrameIndex, FrameSync};
use crate::input::{InputProcessor, InputProcessorMgr, KeyEvent, MouseEvent, TouchEvent};
use crate::model::ModelManager;
use crate::render::passes::create_passes;
use crate::render::shadow::ShadowMapBundle;
use crate::render::{
    calc_scaled_dimensions, DebugRender, RenderPassBase, RpContext, RpCreateBundle, RpResources,
    SwapchainImages,
};

fn poisoned(what: &str) -> Error {
    Error::BackendError(format!("{} lock poisoned", what))
}

pub struct Renderer {
    pub(crate) device: Arc<dyn GraphicsDevice>,
    pub(crate) res: Arc<RpResources>,
    pub(crate) passes: RwLock<Vec<Box<dyn RenderPassBase>>>,
    pub(crate) swapchain: Mutex<Box<dyn Swapchain>>,
    pub(crate) sync: FrameSync,
    pub(crate) flags: FlagShip,
    pub(crate) ctxt: RwLock<RpContext>,
    pub(crate) cmdbufs: CmdBufList,
    pub(crate) models: Arc<dyn ModelManager>,
    pub(crate) config: RendererConfig,
    /// Last size reported by the window, applied on the next resize
    window_size: Mutex<(u32, u32)>,
    input: Mutex<InputProcessorMgr>,
}

impl Renderer {
    /// Create the shared resources and every pass
    ///
    /// `thread_count` is the number of command pool slots, one per scheduler
    /// worker plus one for the engine thread.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        swapchain: Box<dyn Swapchain>,
        shaders: Arc<dyn ShaderProvider>,
        models: Arc<dyn ModelManager>,
        config: &RendererConfig,
        thread_count: usize,
    ) -> Result<Self> {
        let shadow_maps = ShadowMapBundle::new(device.as_ref(), &config.shadow)?;
        let res = Arc::new(RpResources::new(device.clone(), shaders, Box::new(shadow_maps), thread_count)?);

        let images = SwapchainImages::from_swapchain(swapchain.as_ref());
        let extent = images.extent;
        let (gbuf_width, gbuf_height) = calc_scaled_dimensions(extent.width, extent.height, config.gbuf_scale);
        res.gbuf_mut()?.init(device.as_ref(), gbuf_width.max(1), gbuf_height.max(1))?;
        *res.swapchain_mut()? = images;

        let passes = create_passes(&RpCreateBundle { device: &device, resources: &res, config })?;
        let sync = FrameSync::new(device.as_ref())?;

        crate::engine_info!(
            "mirinae::Renderer",
            "Renderer ready: {} passes, swapchain {}x{}, gbuf {}x{}",
            passes.len(),
            extent.width,
            extent.height,
            gbuf_width,
            gbuf_height
        );

        Ok(Self {
            device,
            res,
            passes: RwLock::new(passes),
            swapchain: Mutex::new(swapchain),
            sync,
            flags: FlagShip::new(),
            ctxt: RwLock::new(RpContext::default()),
            cmdbufs: CmdBufList::new(),
            models,
            config: config.clone(),
            window_size: Mutex::new((extent.width, extent.height)),
            input: Mutex::new(InputProcessorMgr::new()),
        })
    }

    pub fn resources(&self) -> &Arc<RpResources> {
        &self.res
    }

    pub fn flags(&self) -> &FlagShip {
        &self.flags
    }

    pub fn frame_index(&self) -> FrameIndex {
        self.sync.frame_index()
    }

    pub fn pass_names(&self) -> Vec<String> {
        self.passes
            .read()
            .map(|passes| passes.iter().map(|p| p.name().to_string()).collect())
            .unwrap_or_default()
    }

    /// Accumulator for debug geometry drawn by the next rendered frame
    pub fn debug_render<R>(&self, f: impl FnOnce(&DebugRender) -> R) -> Result<R> {
        Ok(f(&self.ctxt()?.debug_render))
    }

    /// Append an input processor behind the renderer's own ones
    pub fn add_input_processor(&self, processor: Box<dyn InputProcessor>) -> Result<()> {
        self.input.lock().map_err(|_| poisoned("input"))?.add(processor);
        Ok(())
    }

    pub(crate) fn ctxt(&self) -> Result<RwLockReadGuard<'_, RpContext>> {
        self.ctxt.read().map_err(|_| poisoned("render context"))
    }

    pub(crate) fn ctxt_mut(&self) -> Result<RwLockWriteGuard<'_, RpContext>> {
        self.ctxt.write().map_err(|_| poisoned("render context"))
    }

    /// Record the new window size; the swapchain follows on the next frame
    pub fn notify_window_resize(&self, width: u32, height: u32) {
        if let Ok(mut size) = self.window_size.lock() {
            *size = (width, height);
        }
        self.flags.set_need_resize(true);
    }

    /// Recreate the swapchain and every per-resolution resource
    ///
    /// Returns `Ok(false)` without touching anything when the size is too
    /// small to render to (minimized window); the caller keeps `need_resize`.
    pub fn resize_swapchain(&self, width: u32, height: u32) -> Result<bool> {
        if is_fbuf_too_small(width, height) {
            crate::engine_debug!("mirinae::Renderer", "Window {}x{} too small, resize deferred", width, height);
            return Ok(false);
        }
        self.device.wait_idle()?;

        let images = {
            let mut swapchain = self.swapchain.lock().map_err(|_| poisoned("swapchain"))?;
            swapchain.recreate(width, height)?;
            SwapchainImages::from_swapchain(swapchain.as_ref())
        };
        let extent = images.extent;
        let (gbuf_width, gbuf_height) = calc_scaled_dimensions(extent.width, extent.height, self.config.gbuf_scale);
        self.res.gbuf_mut()?.init(self.device.as_ref(), gbuf_width.max(1), gbuf_height.max(1))?;
        *self.res.swapchain_mut()? = images;

        let mut passes = self.passes.write().map_err(|_| poisoned("passes"))?;
        for pass in passes.iter_mut() {
            pass.on_resize(extent.width, extent.height, &self.res)?;
        }
        self.res.image_states.lock().map_err(|_| poisoned("image states"))?.prune();

        crate::engine_info!(
            "mirinae::Renderer",
            "Swapchain resized to {}x{} (gbuf {}x{})",
            extent.width,
            extent.height,
            gbuf_width,
            gbuf_height
        );
        Ok(true)
    }

    /// Body of the `render_passes` node
    pub(crate) fn render_passes(&self) {
        if self.flags.need_resize() {
            let (width, height) = self.window_size.lock().map(|size| *size).unwrap_or((0, 0));
            match self.resize_swapchain(width, height) {
                Ok(true) => self.flags.set_need_resize(false),
                Ok(false) => {}
                Err(e) => crate::engine_error!("mirinae::Renderer", "Resize failed: {}", e),
            }
        }
        if self.flags.dont_render() {
            return;
        }
        if let Err(e) = self.record_passes() {
            crate::engine_error!("mirinae::Renderer", "Failed to record passes: {}", e);
        }
    }

    fn record_passes(&self) -> Result<()> {
        let ctxt = self.ctxt()?;
        let f_index = ctxt.f_index;
        self.res.cmd_pool.reset_pool(f_index)?;
        self.cmdbufs.clear(f_index);

        let passes = self.passes.read().map_err(|_| poisoned("passes"))?;
        let mut tasks: Vec<_> = passes.iter().filter_map(|pass| pass.create_task()).collect();
        {
            let mut image_states = self.res.image_states.lock().map_err(|_| poisoned("image states"))?;
            image_states.prune();
            for task in tasks.iter_mut() {
                task.prepare(&ctxt, &mut image_states);
            }
        }

        tasks.par_iter().for_each(|task| {
            if let Err(e) = task.update_task(&ctxt) {
                crate::engine_error!("mirinae::Renderer", "Pass '{}' update failed: {}", task.name(), e);
            }
        });
        tasks.par_iter().for_each(|task| {
            if let Err(e) = task.record_task(&ctxt, &self.res.cmd_pool) {
                crate::engine_error!("mirinae::Renderer", "Pass '{}' recording failed: {}", task.name(), e);
            }
        });

        for task in &tasks {
            task.collect_cmdbuf(&self.cmdbufs, f_index);
        }
        Ok(())
    }

    /// Submit the command buffers recorded by the frame graph and present
    ///
    /// Does nothing when the graph decided not to render. A failed present
    /// schedules a resize for the next frame.
    pub fn do_frame(&mut self) -> Result<()> {
        if self.flags.dont_render() {
            return Ok(());
        }
        let (f_index, i_index) = {
            let ctxt = self.ctxt()?;
            (ctxt.f_index, ctxt.i_index)
        };

        let cmdbufs = self.cmdbufs.as_slice(f_index);
        self.device.submit(&Submission {
            command_buffers: &cmdbufs,
            wait: Some((self.sync.cur_img_available().as_ref(), PipelineStages::COLOR_ATTACHMENT_OUTPUT)),
            signal: Some(self.sync.cur_render_finished().as_ref()),
            fence: Some(self.sync.cur_in_flight_fence().as_ref()),
        })?;

        let presented = self
            .swapchain
            .lock()
            .map_err(|_| poisoned("swapchain"))?
            .present(i_index, self.sync.cur_render_finished().as_ref());
        if let Err(e) = presented {
            crate::engine_debug!("mirinae::Renderer", "Present failed ({}), resizing next frame", e);
            self.flags.set_need_resize(true);
        }

        self.sync.increase_frame_index();
        self.ctxt()?.debug_render.clear();
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            crate::engine_error!("mirinae::Renderer", "wait_idle failed on shutdown: {}", e);
        }
        // Passes release their render images before the shared resources go
        if let Ok(passes) = self.passes.get_mut() {
            passes.clear();
        }
    }
}

impl InputProcessor for Renderer {
    fn on_key_event(&mut self, event: &KeyEvent) -> bool {
        self.input.get_mut().map(|mgr| mgr.on_key_event(event)).unwrap_or(false)
    }

    fn on_text_event(&mut self, c: char) -> bool {
        self.input.get_mut().map(|mgr| mgr.on_text_event(c)).unwrap_or(false)
    }

    fn on_mouse_event(&mut self, event: &MouseEvent) -> bool {
        self.input.get_mut().map(|mgr| mgr.on_mouse_event(event)).unwrap_or(false)
    }

    fn on_touch_event(&mut self, event: &TouchEvent) -> bool {
        self.input.get_mut().map(|mgr| mgr.on_touch_event(event)).unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
pub(crate) mod tests;
