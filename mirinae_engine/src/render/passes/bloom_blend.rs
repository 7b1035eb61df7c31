/// Bloom blend: upsamples every level of the downsample chain and adds the
/// weighted sum onto `compo` in one fullscreen draw
///
/// Reads the render images published by the downsample pass. Without all of
/// them the pass stays alive but hands out no task.

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use crate::device::{
    BindingGroup, BindingResource, ColorBlendState, Framebuffer, FramebufferDesc, Image,
    ImageLayout, ImageState, LoadOp, Rect2D, SamplerType, ShaderStage, Viewport,
};
use crate::error::{Error, Result};
use crate::frame::{CmdBufList, FrameIndex, RpCommandPool};
use crate::render::passes::bloom_downsample::{downsample_img_id, BLOOM_LEVELS};
use crate::render::passes::{fragment_layout, require_img};
use crate::render::{
    record_with_cmdbuf, ImageStateTracker, PassBuilder, PendingBarriers, RecordedCmdBuf,
    RenderImage, RenderPassBase, RenderPassLifecycle, RenderPassTask, RpContext, RpCreateBundle,
    RpResources,
};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BloomBlendPushConst {
    pub strength: f32,
    pub radius: f32,
    pub level_count: u32,
    _pad: u32,
}

impl BloomBlendPushConst {
    pub fn new(strength: f32, radius: f32) -> Self {
        Self { strength, radius, level_count: BLOOM_LEVELS as u32, _pad: 0 }
    }
}

/// Reader of every chain level of every frame slot, frame-major
///
/// Empty when any level is missing.
fn acquire_readers(res: &RpResources) -> Vec<RenderImage> {
    let mut readers = Vec::with_capacity(crate::frame::MAX_FRAMES_IN_FLIGHT * BLOOM_LEVELS);
    for f_index in FrameIndex::all() {
        for level in 0..BLOOM_LEVELS {
            let id = downsample_img_id(f_index, level);
            match res.ren_img.get_img_reader(&id, BloomBlendPass::NAME) {
                Some(reader) => readers.push(reader),
                None => {
                    crate::engine_warn!("mirinae::BloomBlendPass", "Render image '{}' not found, bloom disabled", id);
                    for reader in readers.drain(..) {
                        res.ren_img.free_img(reader.id(), BloomBlendPass::NAME);
                    }
                    return readers;
                }
            }
        }
    }
    readers
}

struct FrameData {
    sources: Vec<Arc<dyn Image>>,
    fbuf: Arc<dyn Framebuffer>,
    group: Arc<dyn BindingGroup>,
}

pub struct BloomBlendPass {
    res: Arc<RpResources>,
    readers: Vec<RenderImage>,
    lifecycle: RenderPassLifecycle<FrameData>,
}

impl BloomBlendPass {
    pub const NAME: &'static str = "bloom_blend";

    pub fn new(bundle: &RpCreateBundle) -> Result<Self> {
        let res = bundle.resources.clone();
        let lifecycle = PassBuilder::new(Self::NAME)
            .color(bundle.device.image_formats().rgba_hdr, LoadOp::Load, ImageLayout::ColorAttachment, ColorBlendState::ADDITIVE)
            .shaders("fill_screen.vert", Some("bloom_blend.frag"))
            .binding_layout(fragment_layout(BLOOM_LEVELS as u32, false))
            .push_constant(&[ShaderStage::Fragment], std::mem::size_of::<BloomBlendPushConst>() as u32)
            .build(bundle.device.as_ref(), res.shaders.as_ref())?;

        let readers = acquire_readers(&res);

        let mut pass = Self { res, readers, lifecycle };
        pass.recreate_frames()?;
        Ok(pass)
    }

    pub fn is_enabled(&self) -> bool {
        !self.readers.is_empty()
    }

    fn recreate_frames(&mut self) -> Result<()> {
        if self.readers.is_empty() {
            return Ok(());
        }
        let res = self.res.as_ref();
        let readers = &self.readers;
        let gbuf = res.gbuf()?;

        self.lifecycle.rebuild(gbuf.extent(), |f, render_pass, pipeline| {
            let base = f.get() * BLOOM_LEVELS;
            let sources = (base..base + BLOOM_LEVELS)
                .map(|i| {
                    readers
                        .get(i)
                        .and_then(RenderImage::get)
                        .ok_or_else(|| Error::InvalidResource(format!("{} has no image", downsample_img_id(f, i - base))))
                })
                .collect::<Result<Vec<_>>>()?;
            let fbuf = res.device.create_framebuffer(&FramebufferDesc {
                render_pass: render_pass.clone(),
                attachments: vec![require_img(gbuf.compo(f), "compo")?.clone()],
                width: gbuf.width(),
                height: gbuf.height(),
            })?;
            let bindings: Vec<BindingResource> = sources
                .iter()
                .map(|source| BindingResource::SampledImage(source.as_ref(), SamplerType::LinearClamp))
                .collect();
            let group = res.device.create_binding_group(pipeline, 0, &bindings)?;
            Ok(FrameData { sources, fbuf, group })
        })
    }
}

impl Drop for BloomBlendPass {
    fn drop(&mut self) {
        for reader in &self.readers {
            self.res.ren_img.free_img(reader.id(), Self::NAME);
        }
    }
}

impl RenderPassBase for BloomBlendPass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_resize(&mut self, _width: u32, _height: u32, _res: &RpResources) -> Result<()> {
        self.recreate_frames()
    }

    fn create_task(&self) -> Option<Box<dyn RenderPassTask + '_>> {
        if !self.is_enabled() {
            return None;
        }
        Some(Box::new(BloomBlendTask {
            pass: self,
            frame: None,
            push: BloomBlendPushConst::new(0.0, 0.0),
            barriers: PendingBarriers::default(),
            out: RecordedCmdBuf::default(),
        }))
    }
}

struct BloomBlendTask<'p> {
    pass: &'p BloomBlendPass,
    frame: Option<&'p FrameData>,
    push: BloomBlendPushConst,
    barriers: PendingBarriers,
    out: RecordedCmdBuf,
}

impl RenderPassTask for BloomBlendTask<'_> {
    fn name(&self) -> &str {
        BloomBlendPass::NAME
    }

    fn prepare(&mut self, ctxt: &RpContext, image_states: &mut ImageStateTracker) {
        let pass = self.pass;
        self.frame = pass.lifecycle.frame(ctxt.f_index);
        self.push = BloomBlendPushConst::new(ctxt.camera.bloom_strength, ctxt.camera.bloom_radius);
        let Some(frame) = self.frame else {
            return;
        };

        for source in &frame.sources {
            self.barriers.require(image_states, source, ImageState::SHADER_READ_FRAGMENT);
        }
        if let Ok(gbuf) = pass.res.gbuf() {
            if let Some(compo) = gbuf.compo(ctxt.f_index) {
                self.barriers.require(image_states, compo, ImageState::COLOR_ATTACHMENT_READ_WRITE);
            }
        }
    }

    fn record_task(&self, ctxt: &RpContext, cmd_pool: &RpCommandPool) -> Result<()> {
        let Some(frame) = self.frame else {
            return Ok(());
        };
        let lifecycle = &self.pass.lifecycle;
        let extent = lifecycle.extent();

        record_with_cmdbuf(BloomBlendPass::NAME, ctxt, cmd_pool, &self.barriers, &self.out, |cmd| {
            cmd.begin_render_pass(lifecycle.render_pass(), &frame.fbuf, &[], extent)?;
            cmd.bind_pipeline(lifecycle.pipeline())?;
            cmd.set_viewport(Viewport::from_extent(extent))?;
            cmd.set_scissor(Rect2D::from_extent(extent))?;
            cmd.bind_binding_group(lifecycle.pipeline(), 0, &frame.group)?;
            cmd.push_constants(lifecycle.pipeline(), &[ShaderStage::Fragment], 0, bytemuck::bytes_of(&self.push))?;
            cmd.draw(3, 0)?;
            cmd.end_render_pass()
        })
    }

    fn collect_cmdbuf(&self, out: &CmdBufList, f_index: FrameIndex) {
        self.out.collect(out, f_index);
    }
}
