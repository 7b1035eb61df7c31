/// Shadow pass: static and skinned geometry into the assigned shadow slots
///
/// A directional slot holds its 4 cascades as the quadrants of one depth
/// image. A spot slot is a single view over the whole image. Framebuffers
/// belong to the shadow map bundle and are built against this pass's render
/// pass at construction.

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::{DMat4, Mat4};
use crate::device::{
    ClearValue, CommandList, CullMode, DepthBias, Extent2D, Framebuffer, FrontFace, ImageState,
    LoadOp, Pipeline, RasterizationState, ShaderStage, Viewport,
};
use crate::error::Result;
use crate::frame::{CmdBufList, FrameIndex, RpCommandPool};
use crate::model::VertexStatic;
use crate::render::passes::scissor_of;
use crate::render::shadow::ShadowKind;
use crate::render::{
    record_with_cmdbuf, DrawItem, DrawSheet, ImageStateTracker, PassBuilder, PendingBarriers,
    RecordedCmdBuf, RenderPassBase, RenderPassLifecycle, RenderPassTask, RpContext,
    RpCreateBundle, RpResources,
};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ShadowPushConst {
    pvm: Mat4,
}

/// Viewport of cascade `index` inside a directional shadow map of `extent`
///
/// Order: top-left, top-right, bottom-left, bottom-right.
pub fn cascade_viewport(extent: Extent2D, index: usize) -> Viewport {
    let half_width = extent.width as f32 * 0.5;
    let half_height = extent.height as f32 * 0.5;
    Viewport {
        x: (index % 2) as f32 * half_width,
        y: (index / 2) as f32 * half_height,
        width: half_width,
        height: half_height,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

struct ShadowJob {
    fbuf: Arc<dyn Framebuffer>,
    extent: Extent2D,
    views: Vec<(Viewport, DMat4)>,
}

pub struct ShadowPass {
    res: Arc<RpResources>,
    lifecycle: RenderPassLifecycle<()>,
}

impl ShadowPass {
    pub const NAME: &'static str = "shadow";

    pub fn new(bundle: &RpCreateBundle) -> Result<Self> {
        let res = bundle.resources.clone();
        let lifecycle = PassBuilder::new(Self::NAME)
            .depth(bundle.device.image_formats().depth, LoadOp::Clear)
            .shaders("shadow_basic.vert", Some("shadow_basic.frag"))
            .vertex_layout(VertexStatic::layout())
            .push_constant(&[ShaderStage::Vertex], std::mem::size_of::<ShadowPushConst>() as u32)
            .rasterization(RasterizationState {
                cull_mode: CullMode::None,
                front_face: FrontFace::CounterClockwise,
                depth_bias: Some(DepthBias { constant_factor: 0.0, slope_factor: 1.0, clamp: 0.0 }),
                depth_clamp: true,
            })
            .build(bundle.device.as_ref(), res.shaders.as_ref())?;

        {
            let mut maps = res.shadow_maps_mut()?;
            maps.recreate_fbufs(ShadowKind::Directional, lifecycle.render_pass(), bundle.device.as_ref())?;
            maps.recreate_fbufs(ShadowKind::Spot, lifecycle.render_pass(), bundle.device.as_ref())?;
        }

        Ok(Self { res, lifecycle })
    }
}

impl RenderPassBase for ShadowPass {
    fn name(&self) -> &str {
        Self::NAME
    }

    // Shadow maps have a fixed size
    fn on_resize(&mut self, _width: u32, _height: u32, _res: &RpResources) -> Result<()> {
        Ok(())
    }

    fn create_task(&self) -> Option<Box<dyn RenderPassTask + '_>> {
        Some(Box::new(ShadowTask {
            pass: self,
            jobs: Vec::new(),
            barriers: PendingBarriers::default(),
            out: RecordedCmdBuf::default(),
        }))
    }
}

struct ShadowTask<'p> {
    pass: &'p ShadowPass,
    jobs: Vec<ShadowJob>,
    barriers: PendingBarriers,
    out: RecordedCmdBuf,
}

impl RenderPassTask for ShadowTask<'_> {
    fn name(&self) -> &str {
        ShadowPass::NAME
    }

    fn prepare(&mut self, ctxt: &RpContext, image_states: &mut ImageStateTracker) {
        let pass = self.pass;
        let maps = match pass.res.shadow_maps() {
            Ok(maps) => maps,
            Err(e) => {
                crate::engine_error!("mirinae::ShadowPass", "Skipping shadows: {}", e);
                return;
            }
        };

        for slot in 0..maps.dlight_count() {
            let map = maps.dlight_at(slot);
            let (Some(light), Some(fbuf)) = (ctxt.lights.dlight_in_slot(slot), map.fbuf(ctxt.f_index)) else {
                continue;
            };
            self.barriers.overwrite(image_states, map.img(ctxt.f_index), ImageState::DEPTH_ATTACHMENT_WRITE);
            let views = light
                .cascades
                .cascades
                .iter()
                .enumerate()
                .map(|(i, cascade)| (cascade_viewport(map.extent(), i), cascade.light_mat))
                .collect();
            self.jobs.push(ShadowJob { fbuf: fbuf.clone(), extent: map.extent(), views });
        }

        for slot in 0..maps.slight_count() {
            let map = maps.slight_at(slot);
            let (Some(light), Some(fbuf)) = (ctxt.lights.slight_in_slot(slot), map.fbuf(ctxt.f_index)) else {
                continue;
            };
            self.barriers.overwrite(image_states, map.img(ctxt.f_index), ImageState::DEPTH_ATTACHMENT_WRITE);
            self.jobs.push(ShadowJob {
                fbuf: fbuf.clone(),
                extent: map.extent(),
                views: vec![(Viewport::from_extent(map.extent()), light.light_mat)],
            });
        }
    }

    fn record_task(&self, ctxt: &RpContext, cmd_pool: &RpCommandPool) -> Result<()> {
        if self.jobs.is_empty() {
            return Ok(());
        }
        let lifecycle = &self.pass.lifecycle;

        record_with_cmdbuf(ShadowPass::NAME, ctxt, cmd_pool, &self.barriers, &self.out, |cmd| {
            for job in &self.jobs {
                cmd.begin_render_pass(
                    lifecycle.render_pass(),
                    &job.fbuf,
                    &[ClearValue::DepthStencil { depth: 1.0, stencil: 0 }],
                    job.extent,
                )?;
                cmd.bind_pipeline(lifecycle.pipeline())?;
                for (viewport, light_mat) in &job.views {
                    cmd.set_viewport(*viewport)?;
                    cmd.set_scissor(scissor_of(viewport))?;
                    record_casters(cmd, lifecycle.pipeline(), &ctxt.draw_sheet, light_mat)?;
                }
                cmd.end_render_pass()?;
            }
            Ok(())
        })
    }

    fn collect_cmdbuf(&self, out: &CmdBufList, f_index: FrameIndex) {
        self.out.collect(out, f_index);
    }
}

fn record_casters(
    cmd: &mut dyn CommandList,
    pipeline: &Arc<dyn Pipeline>,
    sheet: &DrawSheet,
    light_mat: &DMat4,
) -> Result<()> {
    let lists: [&[DrawItem]; 3] = [sheet.get_static(), sheet.get_static_trs(), sheet.get_skinned()];
    for item in lists.into_iter().flatten() {
        item.unit.record_bind_vbuf(cmd)?;
        for actor in &item.actors {
            let push = ShadowPushConst { pvm: (*light_mat * actor.model_mat).as_mat4() };
            cmd.push_constants(pipeline, &[ShaderStage::Vertex], 0, bytemuck::bytes_of(&push))?;
            cmd.draw_indexed(item.unit.index_count(), 0, 0)?;
        }
    }
    Ok(())
}
