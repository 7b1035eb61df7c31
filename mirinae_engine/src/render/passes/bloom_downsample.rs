/// Bloom downsample: renders `compo` into a chain of images, each half the
/// size of the one before
///
/// Level 0 samples `compo`, level `l` samples level `l - 1`. Every level of
/// every frame slot is registered with the render target manager as
/// `"bloom_downsample:downsamples_f#<i>_lv#<l>"` so that later passes can
/// read it. The GPU images are recreated inside the shared slots on resize.

use std::sync::Arc;
use crate::device::{
    BindingGroup, BindingResource, ClearValue, ColorBlendState, Extent2D, Framebuffer,
    FramebufferDesc, Image, ImageDesc, ImageLayout, ImageState, ImageUsage, LoadOp, Rect2D,
    SamplerType, Viewport,
};
use crate::error::Result;
use crate::frame::{CmdBufList, FrameIndex, RpCommandPool};
use crate::render::passes::{fragment_layout, require_img};
use crate::render::{
    record_with_cmdbuf, ImageStateTracker, PassBuilder, PendingBarriers, RecordedCmdBuf,
    RenderImage, RenderPassBase, RenderPassLifecycle, RenderPassTask, RpContext, RpCreateBundle,
    RpResources,
};

/// Number of images in the chain
pub const BLOOM_LEVELS: usize = 4;

/// Render image id of chain level `level` of `f_index`
pub fn downsample_img_id(f_index: FrameIndex, level: usize) -> String {
    format!("{}:{}", BloomDownsamplePass::NAME, downsample_img_name(f_index, level))
}

fn downsample_img_name(f_index: FrameIndex, level: usize) -> String {
    format!("downsamples_{}_lv#{}", f_index, level)
}

/// Size of chain level `level` for a `base` sized `compo`
pub fn level_extent(base: Extent2D, level: usize) -> Extent2D {
    let shift = level as u32 + 1;
    Extent2D::new((base.width >> shift).max(1), (base.height >> shift).max(1))
}

struct Level {
    target: Arc<dyn Image>,
    fbuf: Arc<dyn Framebuffer>,
    group: Arc<dyn BindingGroup>,
    extent: Extent2D,
}

struct FrameData {
    levels: Vec<Level>,
}

pub struct BloomDownsamplePass {
    res: Arc<RpResources>,
    /// Frame-major: slot `f * BLOOM_LEVELS + level`
    images: Vec<RenderImage>,
    lifecycle: RenderPassLifecycle<FrameData>,
}

impl BloomDownsamplePass {
    pub const NAME: &'static str = "bloom_downsample";

    pub fn new(bundle: &RpCreateBundle) -> Result<Self> {
        let res = bundle.resources.clone();
        let lifecycle = PassBuilder::new(Self::NAME)
            .color(bundle.device.image_formats().rgba_hdr, LoadOp::DontCare, ImageLayout::ColorAttachment, ColorBlendState::default())
            .shaders("fill_screen.vert", Some("bloom_downsample.frag"))
            .binding_layout(fragment_layout(1, false))
            .build(bundle.device.as_ref(), res.shaders.as_ref())?;

        let mut images = Vec::with_capacity(crate::frame::MAX_FRAMES_IN_FLIGHT * BLOOM_LEVELS);
        for f_index in FrameIndex::all() {
            for level in 0..BLOOM_LEVELS {
                match res.ren_img.new_img(&downsample_img_name(f_index, level), Self::NAME) {
                    Ok(image) => images.push(image),
                    Err(e) => {
                        for image in &images {
                            res.ren_img.free_img(image.id(), Self::NAME);
                        }
                        return Err(e);
                    }
                }
            }
        }

        let mut pass = Self { res, images, lifecycle };
        pass.recreate_frames()?;
        Ok(pass)
    }

    fn recreate_frames(&mut self) -> Result<()> {
        let res = self.res.as_ref();
        let gbuf = res.gbuf()?;
        let base = gbuf.extent();

        self.lifecycle.rebuild(level_extent(base, 0), |f, render_pass, pipeline| {
            let mut levels: Vec<Level> = Vec::with_capacity(BLOOM_LEVELS);
            for level in 0..BLOOM_LEVELS {
                let extent = level_extent(base, level);
                let target = res.device.create_image(&ImageDesc {
                    name: downsample_img_id(f, level),
                    width: extent.width,
                    height: extent.height,
                    format: res.device.image_formats().rgba_hdr,
                    usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED,
                    array_layers: 1,
                })?;
                let fbuf = res.device.create_framebuffer(&FramebufferDesc {
                    render_pass: render_pass.clone(),
                    attachments: vec![target.clone()],
                    width: extent.width,
                    height: extent.height,
                })?;
                let source = match levels.last() {
                    Some(prev) => &prev.target,
                    None => require_img(gbuf.compo(f), "compo")?,
                };
                let group = res.device.create_binding_group(
                    pipeline,
                    0,
                    &[BindingResource::SampledImage(source.as_ref(), SamplerType::LinearClamp)],
                )?;
                levels.push(Level { target, fbuf, group, extent });
            }
            Ok(FrameData { levels })
        })?;

        let targets = self.lifecycle.frames().iter().flat_map(|frame| frame.levels.iter().map(|l| &l.target));
        for (image, target) in self.images.iter().zip(targets) {
            image.set(target.clone());
        }
        Ok(())
    }
}

impl Drop for BloomDownsamplePass {
    fn drop(&mut self) {
        for image in &self.images {
            self.res.ren_img.free_img(image.id(), Self::NAME);
        }
    }
}

impl RenderPassBase for BloomDownsamplePass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_resize(&mut self, _width: u32, _height: u32, _res: &RpResources) -> Result<()> {
        self.recreate_frames()
    }

    fn create_task(&self) -> Option<Box<dyn RenderPassTask + '_>> {
        Some(Box::new(BloomDownsampleTask {
            pass: self,
            frame: None,
            barriers: PendingBarriers::default(),
            between: Vec::new(),
            out: RecordedCmdBuf::default(),
        }))
    }
}

struct BloomDownsampleTask<'p> {
    pass: &'p BloomDownsamplePass,
    frame: Option<&'p FrameData>,
    barriers: PendingBarriers,
    /// Recorded before level `i + 1`
    between: Vec<PendingBarriers>,
    out: RecordedCmdBuf,
}

impl RenderPassTask for BloomDownsampleTask<'_> {
    fn name(&self) -> &str {
        BloomDownsamplePass::NAME
    }

    fn prepare(&mut self, ctxt: &RpContext, image_states: &mut ImageStateTracker) {
        let pass = self.pass;
        self.frame = pass.lifecycle.frame(ctxt.f_index);
        let Some(frame) = self.frame else {
            return;
        };
        if let Ok(gbuf) = pass.res.gbuf() {
            if let Some(compo) = gbuf.compo(ctxt.f_index) {
                self.barriers.require(image_states, compo, ImageState::SHADER_READ_FRAGMENT);
            }
        }

        for (i, level) in frame.levels.iter().enumerate() {
            if i == 0 {
                self.barriers.overwrite(image_states, &level.target, ImageState::COLOR_ATTACHMENT_WRITE);
                continue;
            }
            let mut step = PendingBarriers::default();
            step.require(image_states, &frame.levels[i - 1].target, ImageState::SHADER_READ_FRAGMENT);
            step.overwrite(image_states, &level.target, ImageState::COLOR_ATTACHMENT_WRITE);
            self.between.push(step);
        }
    }

    fn record_task(&self, ctxt: &RpContext, cmd_pool: &RpCommandPool) -> Result<()> {
        let Some(frame) = self.frame else {
            return Ok(());
        };
        let lifecycle = &self.pass.lifecycle;

        record_with_cmdbuf(BloomDownsamplePass::NAME, ctxt, cmd_pool, &self.barriers, &self.out, |cmd| {
            for (i, level) in frame.levels.iter().enumerate() {
                if let Some(step) = i.checked_sub(1).and_then(|prev| self.between.get(prev)) {
                    if !step.is_empty() {
                        cmd.pipeline_barrier(step.as_slice())?;
                    }
                }
                cmd.begin_render_pass(lifecycle.render_pass(), &level.fbuf, &[ClearValue::Color([0.0; 4])], level.extent)?;
                cmd.bind_pipeline(lifecycle.pipeline())?;
                cmd.set_viewport(Viewport::from_extent(level.extent))?;
                cmd.set_scissor(Rect2D::from_extent(level.extent))?;
                cmd.bind_binding_group(lifecycle.pipeline(), 0, &level.group)?;
                cmd.draw(3, 0)?;
                cmd.end_render_pass()?;
            }
            Ok(())
        })
    }

    fn collect_cmdbuf(&self, out: &CmdBufList, f_index: FrameIndex) {
        self.out.collect(out, f_index);
    }
}
