/// Transparent pass: alpha-blended static and skinned units drawn over
/// `compo`, depth-tested against the g-buffer depth without writing it
///
/// Hands out no task when the draw sheet has no transparent units.

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use crate::device::{
    BindingGroupLayoutDesc, BindingSlotDesc, BindingType, ColorBlendState, CompareOp, DepthState,
    Framebuffer, FramebufferDesc, ImageLayout, ImageState, LoadOp, RasterizationState, Rect2D,
    ShaderStage, ShaderStageFlags, Viewport,
};
use crate::error::Result;
use crate::frame::{CmdBufList, FrameIndex, RpCommandPool};
use crate::model::VertexStatic;
use crate::render::passes::require_img;
use crate::render::{
    record_with_cmdbuf, DrawItem, ImageStateTracker, PassBuilder, PendingBarriers, RecordedCmdBuf,
    RenderPassBase, RenderPassLifecycle, RenderPassTask, RpContext, RpCreateBundle, RpResources,
};

/// Main directional light, shaded without shadows
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TranspPushConst {
    /// xyz: view-space direction towards the light
    pub to_light_dir: Vec4,
    /// xyz: color, zero when there is no directional light
    pub color: Vec4,
}

impl TranspPushConst {
    pub fn new(ctxt: &RpContext) -> Self {
        match ctxt.lights.dlights.first() {
            Some(light) => Self {
                to_light_dir: light.to_light_dir.as_vec3().extend(0.0),
                color: light.color.extend(1.0),
            },
            None => Self { to_light_dir: Vec4::ZERO, color: Vec4::ZERO },
        }
    }
}

pub struct TranspPass {
    res: Arc<RpResources>,
    lifecycle: RenderPassLifecycle<Arc<dyn Framebuffer>>,
}

impl TranspPass {
    pub const NAME: &'static str = "transp";

    pub const ACTOR_SET: u32 = 0;

    pub fn new(bundle: &RpCreateBundle) -> Result<Self> {
        let res = bundle.resources.clone();
        let formats = bundle.device.image_formats();

        let lifecycle = PassBuilder::new(Self::NAME)
            .color(formats.rgba_hdr, LoadOp::Load, ImageLayout::ColorAttachment, ColorBlendState::ALPHA)
            .depth(formats.depth, LoadOp::Load)
            .depth_state(DepthState { test_enable: true, write_enable: false, compare_op: CompareOp::Less })
            .shaders("transp_basic.vert", Some("transp_basic.frag"))
            .vertex_layout(VertexStatic::layout())
            .binding_layout(BindingGroupLayoutDesc {
                entries: vec![BindingSlotDesc::new(0, BindingType::UniformBuffer, ShaderStageFlags::VERTEX)],
            })
            .push_constant(&[ShaderStage::Fragment], std::mem::size_of::<TranspPushConst>() as u32)
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
                    require_img(gbuf.compo(f), "compo")?.clone(),
                    require_img(gbuf.depth(f), "gbuf depth")?.clone(),
                ],
                width: gbuf.width(),
                height: gbuf.height(),
            })
        })
    }
}

impl RenderPassBase for TranspPass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_resize(&mut self, _width: u32, _height: u32, _res: &RpResources) -> Result<()> {
        self.recreate_fbufs()
    }

    fn create_task(&self) -> Option<Box<dyn RenderPassTask + '_>> {
        Some(Box::new(TranspTask {
            pass: self,
            fbuf: None,
            push: TranspPushConst::zeroed(),
            barriers: PendingBarriers::default(),
            out: RecordedCmdBuf::default(),
        }))
    }
}

struct TranspTask<'p> {
    pass: &'p TranspPass,
    fbuf: Option<&'p Arc<dyn Framebuffer>>,
    push: TranspPushConst,
    barriers: PendingBarriers,
    out: RecordedCmdBuf,
}

fn has_transparent(ctxt: &RpContext) -> bool {
    !ctxt.draw_sheet.get_static_trs().is_empty() || !ctxt.draw_sheet.get_skinned_trs().is_empty()
}

impl RenderPassTask for TranspTask<'_> {
    fn name(&self) -> &str {
        TranspPass::NAME
    }

    fn prepare(&mut self, ctxt: &RpContext, image_states: &mut ImageStateTracker) {
        if !has_transparent(ctxt) {
            return;
        }
        let pass = self.pass;
        self.fbuf = pass.lifecycle.frame(ctxt.f_index);
        self.push = TranspPushConst::new(ctxt);
        let Ok(gbuf) = pass.res.gbuf() else {
            return;
        };

        if let Some(compo) = gbuf.compo(ctxt.f_index) {
            self.barriers.require(image_states, compo, ImageState::COLOR_ATTACHMENT_READ_WRITE);
        }
        if let Some(depth) = gbuf.depth(ctxt.f_index) {
            self.barriers.require(image_states, depth, ImageState::DEPTH_ATTACHMENT_WRITE);
        }
    }

    fn record_task(&self, ctxt: &RpContext, cmd_pool: &RpCommandPool) -> Result<()> {
        let Some(fbuf) = self.fbuf else {
            return Ok(());
        };
        let lifecycle = &self.pass.lifecycle;
        let device = self.pass.res.device.as_ref();
        let extent = lifecycle.extent();

        record_with_cmdbuf(TranspPass::NAME, ctxt, cmd_pool, &self.barriers, &self.out, |cmd| {
            cmd.begin_render_pass(lifecycle.render_pass(), fbuf, &[], extent)?;
            cmd.bind_pipeline(lifecycle.pipeline())?;
            cmd.set_viewport(Viewport::from_extent(extent))?;
            cmd.set_scissor(Rect2D::from_extent(extent))?;
            cmd.push_constants(lifecycle.pipeline(), &[ShaderStage::Fragment], 0, bytemuck::bytes_of(&self.push))?;

            let lists: [&[DrawItem]; 2] = [ctxt.draw_sheet.get_static_trs(), ctxt.draw_sheet.get_skinned_trs()];
            for item in lists.into_iter().flatten() {
                item.unit.record_bind_vbuf(cmd)?;
                for actor in &item.actors {
                    let group = actor.actor.binding_group(
                        ctxt.f_index,
                        device,
                        lifecycle.pipeline(),
                        TranspPass::ACTOR_SET,
                    )?;
                    cmd.bind_binding_group(lifecycle.pipeline(), TranspPass::ACTOR_SET, &group)?;
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
