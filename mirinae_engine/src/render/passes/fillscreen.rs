/// Fillscreen: tone-maps `compo` into the acquired swapchain image
///
/// Framebuffers exist per swapchain image, the sampling group per frame
/// slot. The image leaves the pass ready to present.

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use crate::device::{
    BindingGroup, BindingResource, ClearValue, Extent2D, Framebuffer, FramebufferDesc,
    ImageLayout, ImageState, LoadOp, Rect2D, SamplerType, ShaderStage, Viewport,
};
use crate::error::{Error, Result};
use crate::frame::{CmdBufList, FrameIndex, RpCommandPool};
use crate::render::passes::{fragment_layout, require_img};
use crate::render::{
    record_with_cmdbuf, ImageStateTracker, PassBuilder, PendingBarriers, RecordedCmdBuf,
    RenderPassBase, RenderPassLifecycle, RenderPassTask, RpContext, RpCreateBundle, RpResources,
};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FillscreenPushConst {
    pub exposure: f32,
    pub gamma: f32,
    _pad: [f32; 2],
}

impl FillscreenPushConst {
    pub fn new(exposure: f32, gamma: f32) -> Self {
        Self { exposure, gamma, _pad: [0.0; 2] }
    }
}

pub struct FillscreenPass {
    res: Arc<RpResources>,
    lifecycle: RenderPassLifecycle<Arc<dyn BindingGroup>>,
    fbufs: Vec<Arc<dyn Framebuffer>>,
    fbuf_extent: Extent2D,
}

impl FillscreenPass {
    pub const NAME: &'static str = "fillscreen";

    pub fn new(bundle: &RpCreateBundle) -> Result<Self> {
        let res = bundle.resources.clone();
        let format = res
            .swapchain()?
            .format
            .ok_or_else(|| Error::InitializationFailed("fillscreen needs the swapchain format".to_string()))?;

        let lifecycle = PassBuilder::new(Self::NAME)
            .color_final(format, LoadOp::DontCare, ImageLayout::PresentSrc)
            .shaders("fill_screen.vert", Some("fillscreen.frag"))
            .binding_layout(fragment_layout(1, false))
            .push_constant(&[ShaderStage::Fragment], std::mem::size_of::<FillscreenPushConst>() as u32)
            .build(bundle.device.as_ref(), res.shaders.as_ref())?;

        let mut pass = Self { res, lifecycle, fbufs: Vec::new(), fbuf_extent: Extent2D::default() };
        pass.recreate_frames()?;
        Ok(pass)
    }

    fn recreate_frames(&mut self) -> Result<()> {
        let res = self.res.as_ref();
        let gbuf = res.gbuf()?;
        let swapchain = res.swapchain()?;

        let mut fbufs = Vec::with_capacity(swapchain.images.len());
        for image in &swapchain.images {
            fbufs.push(res.device.create_framebuffer(&FramebufferDesc {
                render_pass: self.lifecycle.render_pass().clone(),
                attachments: vec![image.clone()],
                width: swapchain.extent.width,
                height: swapchain.extent.height,
            })?);
        }

        self.lifecycle.rebuild(swapchain.extent, |f, _, pipeline| {
            res.device.create_binding_group(
                pipeline,
                0,
                &[BindingResource::SampledImage(require_img(gbuf.compo(f), "compo")?.as_ref(), SamplerType::LinearClamp)],
            )
        })?;
        self.fbufs = fbufs;
        self.fbuf_extent = swapchain.extent;
        Ok(())
    }
}

impl RenderPassBase for FillscreenPass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_resize(&mut self, _width: u32, _height: u32, _res: &RpResources) -> Result<()> {
        self.recreate_frames()
    }

    fn create_task(&self) -> Option<Box<dyn RenderPassTask + '_>> {
        Some(Box::new(FillscreenTask {
            pass: self,
            group: None,
            fbuf: None,
            push: FillscreenPushConst::new(1.0, 1.0),
            barriers: PendingBarriers::default(),
            out: RecordedCmdBuf::default(),
        }))
    }
}

struct FillscreenTask<'p> {
    pass: &'p FillscreenPass,
    group: Option<&'p Arc<dyn BindingGroup>>,
    fbuf: Option<&'p Arc<dyn Framebuffer>>,
    push: FillscreenPushConst,
    barriers: PendingBarriers,
    out: RecordedCmdBuf,
}

impl RenderPassTask for FillscreenTask<'_> {
    fn name(&self) -> &str {
        FillscreenPass::NAME
    }

    fn prepare(&mut self, ctxt: &RpContext, image_states: &mut ImageStateTracker) {
        let pass = self.pass;
        self.group = pass.lifecycle.frame(ctxt.f_index);
        self.fbuf = pass.fbufs.get(ctxt.i_index.get());
        self.push = FillscreenPushConst::new(ctxt.camera.exposure, ctxt.camera.gamma);

        if let Ok(gbuf) = pass.res.gbuf() {
            if let Some(compo) = gbuf.compo(ctxt.f_index) {
                self.barriers.require(image_states, compo, ImageState::SHADER_READ_FRAGMENT);
            }
        }
        if let Ok(swapchain) = pass.res.swapchain() {
            if let Some(image) = swapchain.images.get(ctxt.i_index.get()) {
                self.barriers.overwrite(image_states, image, ImageState::COLOR_ATTACHMENT_WRITE);
                image_states.set_after_pass(image, ImageState::PRESENT);
            }
        }
    }

    fn record_task(&self, ctxt: &RpContext, cmd_pool: &RpCommandPool) -> Result<()> {
        let (Some(group), Some(fbuf)) = (self.group, self.fbuf) else {
            crate::engine_warn!("mirinae::FillscreenPass", "No target for swapchain image {}", ctxt.i_index.get());
            return Ok(());
        };
        let lifecycle = &self.pass.lifecycle;
        let extent = self.pass.fbuf_extent;

        record_with_cmdbuf(FillscreenPass::NAME, ctxt, cmd_pool, &self.barriers, &self.out, |cmd| {
            cmd.begin_render_pass(lifecycle.render_pass(), fbuf, &[ClearValue::Color([0.0, 0.0, 0.0, 1.0])], extent)?;
            cmd.bind_pipeline(lifecycle.pipeline())?;
            cmd.set_viewport(Viewport::from_extent(extent))?;
            cmd.set_scissor(Rect2D::from_extent(extent))?;
            cmd.bind_binding_group(lifecycle.pipeline(), 0, group)?;
            cmd.push_constants(lifecycle.pipeline(), &[ShaderStage::Fragment], 0, bytemuck::bytes_of(&self.push))?;
            cmd.draw(3, 0)?;
            cmd.end_render_pass()
        })
    }

    fn collect_cmdbuf(&self, out: &CmdBufList, f_index: FrameIndex) {
        self.out.collect(out, f_index);
    }
}
