/// Spot-light composition, added onto `compo` one fullscreen draw per
/// shadowed spot light

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::{DMat4, Mat4, Vec4};
use crate::device::{
    BindingGroup, BindingResource, Buffer, ColorBlendState, Framebuffer, FramebufferDesc,
    ImageLayout, ImageState, LoadOp, Rect2D, SamplerType, ShaderStage, Viewport,
};
use crate::error::Result;
use crate::frame::{CmdBufList, FrameIndex, RpCommandPool};
use crate::render::passes::compo_dlight::{main_binding_group, main_ubuf, require_gbuf_reads, CompoMainUniform};
use crate::render::passes::{fragment_layout, require_img};
use crate::render::shadow::ShadowMaps;
use crate::render::{
    record_with_cmdbuf, ImageStateTracker, PassBuilder, PendingBarriers, RecordedCmdBuf,
    RenderPassBase, RenderPassLifecycle, RenderPassTask, RpContext, RpCreateBundle, RpResources,
    SlightSnapshot,
};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CompoSlightPushConst {
    /// View space to light clip space
    pub light_mat: Mat4,
    /// xyz: view-space position, w: cos(inner angle)
    pub pos_n_inner_angle: Vec4,
    /// xyz: view-space direction towards the light, w: cos(outer angle)
    pub dir_n_outer_angle: Vec4,
    /// xyz: scaled color, w: max distance
    pub color_n_max_dist: Vec4,
}

impl CompoSlightPushConst {
    pub fn new(light: &SlightSnapshot, view_inv: &DMat4) -> Self {
        Self {
            light_mat: (light.light_mat * *view_inv).as_mat4(),
            pos_n_inner_angle: light.view_pos.as_vec3().extend(light.inner_angle.cos() as f32),
            dir_n_outer_angle: light.to_light_dir.as_vec3().extend(light.outer_angle.cos() as f32),
            color_n_max_dist: light.color.extend(light.max_distance as f32),
        }
    }
}

struct FrameData {
    fbuf: Arc<dyn Framebuffer>,
    main_ubuf: Arc<dyn Buffer>,
    main_group: Arc<dyn BindingGroup>,
    shadow_groups: Vec<Arc<dyn BindingGroup>>,
}

pub struct CompoSlightPass {
    res: Arc<RpResources>,
    lifecycle: RenderPassLifecycle<FrameData>,
}

impl CompoSlightPass {
    pub const NAME: &'static str = "compo_slight";

    pub fn new(bundle: &RpCreateBundle) -> Result<Self> {
        let res = bundle.resources.clone();
        let lifecycle = PassBuilder::new(Self::NAME)
            .color(bundle.device.image_formats().rgba_hdr, LoadOp::Load, ImageLayout::ColorAttachment, ColorBlendState::ADDITIVE)
            .shaders("compo_slight.vert", Some("compo_slight.frag"))
            .binding_layout(fragment_layout(4, true))
            .binding_layout(fragment_layout(1, false))
            .push_constant(&[ShaderStage::Fragment], std::mem::size_of::<CompoSlightPushConst>() as u32)
            .build(bundle.device.as_ref(), res.shaders.as_ref())?;

        let mut pass = Self { res, lifecycle };
        pass.recreate_frames()?;
        Ok(pass)
    }

    fn recreate_frames(&mut self) -> Result<()> {
        let res = self.res.as_ref();
        let gbuf = res.gbuf()?;
        let maps = res.shadow_maps()?;

        self.lifecycle.rebuild(gbuf.extent(), |f, render_pass, pipeline| {
            let fbuf = res.device.create_framebuffer(&FramebufferDesc {
                render_pass: render_pass.clone(),
                attachments: vec![require_img(gbuf.compo(f), "compo")?.clone()],
                width: gbuf.width(),
                height: gbuf.height(),
            })?;
            let main_ubuf = main_ubuf(res, Self::NAME, f)?;
            let main_group = main_binding_group(res, &gbuf, pipeline, f, &main_ubuf)?;

            let mut shadow_groups = Vec::with_capacity(maps.slight_count());
            for i in 0..maps.slight_count() {
                shadow_groups.push(res.device.create_binding_group(
                    pipeline,
                    1,
                    &[BindingResource::SampledImage(maps.slight_at(i).img(f).as_ref(), SamplerType::ShadowCompare)],
                )?);
            }

            Ok(FrameData { fbuf, main_ubuf, main_group, shadow_groups })
        })
    }
}

impl RenderPassBase for CompoSlightPass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_resize(&mut self, _width: u32, _height: u32, _res: &RpResources) -> Result<()> {
        self.recreate_frames()
    }

    fn create_task(&self) -> Option<Box<dyn RenderPassTask + '_>> {
        Some(Box::new(CompoSlightTask {
            pass: self,
            frame: None,
            lights: Vec::new(),
            barriers: PendingBarriers::default(),
            out: RecordedCmdBuf::default(),
        }))
    }
}

struct CompoSlightTask<'p> {
    pass: &'p CompoSlightPass,
    frame: Option<&'p FrameData>,
    lights: Vec<(usize, CompoSlightPushConst)>,
    barriers: PendingBarriers,
    out: RecordedCmdBuf,
}

impl RenderPassTask for CompoSlightTask<'_> {
    fn name(&self) -> &str {
        CompoSlightPass::NAME
    }

    fn prepare(&mut self, ctxt: &RpContext, image_states: &mut ImageStateTracker) {
        let pass = self.pass;
        self.frame = pass.lifecycle.frame(ctxt.f_index);
        let (Ok(gbuf), Ok(maps)) = (pass.res.gbuf(), pass.res.shadow_maps()) else {
            return;
        };

        for slot in 0..maps.slight_count() {
            if let Some(light) = ctxt.lights.slight_in_slot(slot) {
                self.lights.push((slot, CompoSlightPushConst::new(light, &ctxt.view_inv)));
            }
        }
        if self.lights.is_empty() {
            return;
        }

        require_gbuf_reads(&mut self.barriers, image_states, &gbuf, ctxt.f_index);
        for (slot, _) in &self.lights {
            self.barriers.require(image_states, maps.slight_at(*slot).img(ctxt.f_index), ImageState::SHADER_READ_FRAGMENT);
        }
        if let Some(compo) = gbuf.compo(ctxt.f_index) {
            self.barriers.require(image_states, compo, ImageState::COLOR_ATTACHMENT_READ_WRITE);
        }
    }

    fn update_task(&self, ctxt: &RpContext) -> Result<()> {
        match self.frame {
            Some(frame) if !self.lights.is_empty() => {
                frame.main_ubuf.update(0, bytemuck::bytes_of(&CompoMainUniform::from_ctxt(ctxt)))
            }
            _ => Ok(()),
        }
    }

    fn record_task(&self, ctxt: &RpContext, cmd_pool: &RpCommandPool) -> Result<()> {
        let Some(frame) = self.frame else {
            return Ok(());
        };
        if self.lights.is_empty() {
            return Ok(());
        }
        let lifecycle = &self.pass.lifecycle;
        let extent = lifecycle.extent();

        record_with_cmdbuf(CompoSlightPass::NAME, ctxt, cmd_pool, &self.barriers, &self.out, |cmd| {
            cmd.begin_render_pass(lifecycle.render_pass(), &frame.fbuf, &[], extent)?;
            cmd.bind_pipeline(lifecycle.pipeline())?;
            cmd.set_viewport(Viewport::from_extent(extent))?;
            cmd.set_scissor(Rect2D::from_extent(extent))?;
            cmd.bind_binding_group(lifecycle.pipeline(), 0, &frame.main_group)?;

            for (slot, push) in &self.lights {
                let Some(group) = frame.shadow_groups.get(*slot) else {
                    continue;
                };
                cmd.bind_binding_group(lifecycle.pipeline(), 1, group)?;
                cmd.push_constants(lifecycle.pipeline(), &[ShaderStage::Fragment], 0, bytemuck::bytes_of(push))?;
                cmd.draw(3, 0)?;
            }

            cmd.end_render_pass()
        })
    }

    fn collect_cmdbuf(&self, out: &CmdBufList, f_index: FrameIndex) {
        self.out.collect(out, f_index);
    }
}
