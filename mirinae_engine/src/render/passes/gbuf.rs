/// G-buffer pass: opaque static and skinned geometry into depth, albedo,
/// normal and material

use std::sync::Arc;
use crate::device::{
    BindingGroupLayoutDesc, BindingSlotDesc, BindingType, ClearValue, ColorBlendState, Framebuffer,
    FramebufferDesc, Image, ImageLayout, ImageState, LoadOp, RasterizationState, Rect2D,
    ShaderStageFlags, Viewport,
};
use crate::error::Result;
use crate::frame::{CmdBufList, FrameIndex, RpCommandPool};
use crate::model::VertexStatic;
use crate::render::passes::require_img;
use crate::render::{
    record_with_cmdbuf, DrawItem, ImageStateTracker, PassBuilder, PendingBarriers, RecordedCmdBuf,
    RenderPassBase, RenderPassLifecycle, RenderPassTask, RpContext, RpCreateBundle, RpResources,
};

pub struct GbufPass {
    res: Arc<RpResources>,
    lifecycle: RenderPassLifecycle<Arc<dyn Framebuffer>>,
}

impl GbufPass {
    pub const NAME: &'static str = "gbuf";

    /// Actor uniforms are bound at this set index
    pub const ACTOR_SET: u32 = 0;

    pub fn new(bundle: &RpCreateBundle) -> Result<Self> {
        let res = bundle.resources.clone();
        let formats = bundle.device.image_formats();
        let color = |builder: PassBuilder| {
            builder.color(formats.rgba_unorm, LoadOp::Clear, ImageLayout::ColorAttachment, ColorBlendState::default())
        };

        let lifecycle = color(color(color(PassBuilder::new(Self::NAME))))
            .depth(formats.depth, LoadOp::Clear)
            .shaders("gbuf_basic.vert", Some("gbuf_basic.frag"))
            .vertex_layout(VertexStatic::layout())
            .binding_layout(BindingGroupLayoutDesc {
                entries: vec![BindingSlotDesc::new(0, BindingType::UniformBuffer, ShaderStageFlags::VERTEX)],
            })
            .rasterization(RasterizationState::default())
            .build(bundle.device.as_ref(), res.shaders.as_ref())?;

        let mut pass = Self { res, lifecycle };
        pass.recreate_fbufs()?;
        Ok(pass)
    }

    fn recreate_fbufs(&mut self) -> Result<()> {
        let gbuf = self.res.gbuf()?;
        let device = &self.res.device;
        self.lifecycle.rebuild(gbuf.extent(), |f, render_pass, _| {
            device.create_framebuffer(&FramebufferDesc {
                render_pass: render_pass.clone(),
                attachments: vec![
                    require_img(gbuf.albedo(f), "gbuf albedo")?.clone(),
                    require_img(gbuf.normal(f), "gbuf normal")?.clone(),
                    require_img(gbuf.material(f), "gbuf material")?.clone(),
                    require_img(gbuf.depth(f), "gbuf depth")?.clone(),
                ],
                width: gbuf.width(),
                height: gbuf.height(),
            })
        })
    }
}

impl RenderPassBase for GbufPass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_resize(&mut self, _width: u32, _height: u32, _res: &RpResources) -> Result<()> {
        self.recreate_fbufs()
    }

    fn create_task(&self) -> Option<Box<dyn RenderPassTask + '_>> {
        Some(Box::new(GbufTask {
            pass: self,
            fbuf: None,
            barriers: PendingBarriers::default(),
            out: RecordedCmdBuf::default(),
        }))
    }
}

struct GbufTask<'p> {
    pass: &'p GbufPass,
    fbuf: Option<&'p Arc<dyn Framebuffer>>,
    barriers: PendingBarriers,
    out: RecordedCmdBuf,
}

impl RenderPassTask for GbufTask<'_> {
    fn name(&self) -> &str {
        GbufPass::NAME
    }

    fn prepare(&mut self, ctxt: &RpContext, image_states: &mut ImageStateTracker) {
        let pass = self.pass;
        self.fbuf = pass.lifecycle.frame(ctxt.f_index);
        let Ok(gbuf) = pass.res.gbuf() else {
            return;
        };

        let targets: [(Option<&Arc<dyn Image>>, ImageState); 4] = [
            (gbuf.albedo(ctxt.f_index), ImageState::COLOR_ATTACHMENT_WRITE),
            (gbuf.normal(ctxt.f_index), ImageState::COLOR_ATTACHMENT_WRITE),
            (gbuf.material(ctxt.f_index), ImageState::COLOR_ATTACHMENT_WRITE),
            (gbuf.depth(ctxt.f_index), ImageState::DEPTH_ATTACHMENT_WRITE),
        ];
        for (image, state) in targets {
            if let Some(image) = image {
                self.barriers.overwrite(image_states, image, state);
            }
        }
    }

    fn record_task(&self, ctxt: &RpContext, cmd_pool: &RpCommandPool) -> Result<()> {
        let Some(fbuf) = self.fbuf else {
            crate::engine_debug!("mirinae::GbufPass", "No framebuffer for {}", ctxt.f_index);
            return Ok(());
        };
        let lifecycle = &self.pass.lifecycle;
        let device = self.pass.res.device.as_ref();
        let extent = lifecycle.extent();
        let black = ClearValue::Color([0.0, 0.0, 0.0, 1.0]);

        record_with_cmdbuf(GbufPass::NAME, ctxt, cmd_pool, &self.barriers, &self.out, |cmd| {
            cmd.begin_render_pass(
                lifecycle.render_pass(),
                fbuf,
                &[black, black, black, ClearValue::DepthStencil { depth: 1.0, stencil: 0 }],
                extent,
            )?;
            cmd.bind_pipeline(lifecycle.pipeline())?;
            cmd.set_viewport(Viewport::from_extent(extent))?;
            cmd.set_scissor(Rect2D::from_extent(extent))?;

            let lists: [&[DrawItem]; 2] = [ctxt.draw_sheet.get_static(), ctxt.draw_sheet.get_skinned()];
            for item in lists.into_iter().flatten() {
                item.unit.record_bind_vbuf(cmd)?;
                for actor in &item.actors {
                    let group = actor.actor.binding_group(
                        ctxt.f_index,
                        device,
                        lifecycle.pipeline(),
                        GbufPass::ACTOR_SET,
                    )?;
                    cmd.bind_binding_group(lifecycle.pipeline(), GbufPass::ACTOR_SET, &group)?;
                    cmd.draw_indexed(item.unit.index_count(), 0, 0)?;
                }
            }

            cmd.end_render_pass()
        })
    }

    fn collect_cmdbuf(&self, out: &CmdBufList, f_index: FrameIndex) {
        self.out.collect(out, f_index);
    }
}
