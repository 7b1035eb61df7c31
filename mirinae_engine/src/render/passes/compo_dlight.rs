/// Directional-light composition
///
/// Clears `compo` and adds one fullscreen draw per directional light that
/// owns a shadow slot. Set 0 carries the g-buffer and the camera block, set 1
/// the shadow map and cascade block of one slot.

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::{DMat4, Mat4, Vec4};
use crate::device::{
    BindingGroup, BindingResource, Buffer, BufferDesc, BufferUsage, ClearValue, ColorBlendState,
    Framebuffer, FramebufferDesc, ImageLayout, ImageState, LoadOp, Rect2D, SamplerType, Viewport,
};
use crate::error::Result;
use crate::frame::{CmdBufList, FrameIndex, RpCommandPool};
use crate::render::passes::{fragment_layout, require_img};
use crate::render::shadow::{ShadowMaps, CASCADE_COUNT};
use crate::render::{
    record_with_cmdbuf, DlightSnapshot, FbufImageBundle, ImageStateTracker, PassBuilder,
    PendingBarriers, RecordedCmdBuf, RenderPassBase, RenderPassLifecycle, RenderPassTask,
    RpContext, RpCreateBundle, RpResources,
};

/// Camera block shared by the composition passes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CompoMainUniform {
    pub proj: Mat4,
    pub proj_inv: Mat4,
    pub view: Mat4,
    pub view_inv: Mat4,
}

impl CompoMainUniform {
    pub fn from_ctxt(ctxt: &RpContext) -> Self {
        Self {
            proj: ctxt.proj_mat.as_mat4(),
            proj_inv: ctxt.proj_inv.as_mat4(),
            view: ctxt.view_mat.as_mat4(),
            view_inv: ctxt.view_inv.as_mat4(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CompoDlightUniform {
    /// View space to cascade clip space
    pub light_mats: [Mat4; CASCADE_COUNT],
    pub cascade_depths: Vec4,
    pub dlight_color: Vec4,
    /// View-space direction towards the light
    pub dlight_dir: Vec4,
}

impl CompoDlightUniform {
    pub fn new(light: &DlightSnapshot, view_inv: &DMat4) -> Self {
        let cascades = &light.cascades;
        let mut light_mats = [Mat4::IDENTITY; CASCADE_COUNT];
        for (dst, cascade) in light_mats.iter_mut().zip(&cascades.cascades) {
            *dst = (cascade.light_mat * *view_inv).as_mat4();
        }
        let d = cascades.far_depths;
        Self {
            light_mats,
            cascade_depths: Vec4::new(d[0] as f32, d[1] as f32, d[2] as f32, d[3] as f32),
            dlight_color: light.color.extend(1.0),
            dlight_dir: light.to_light_dir.as_vec3().extend(0.0),
        }
    }
}

pub(crate) fn main_ubuf(res: &RpResources, owner: &str, f_index: FrameIndex) -> Result<Arc<dyn Buffer>> {
    res.device.create_buffer(&BufferDesc {
        name: format!("{}:main_ubuf_{}", owner, f_index),
        size: std::mem::size_of::<CompoMainUniform>() as u64,
        usage: BufferUsage::Uniform,
    })
}

/// Set 0 of the composition pipelines: depth, albedo, normal, material, camera block
pub(crate) fn main_binding_group(
    res: &RpResources,
    gbuf: &FbufImageBundle,
    pipeline: &Arc<dyn crate::device::Pipeline>,
    f_index: FrameIndex,
    ubuf: &Arc<dyn Buffer>,
) -> Result<Arc<dyn BindingGroup>> {
    res.device.create_binding_group(
        pipeline,
        0,
        &[
            BindingResource::SampledImage(require_img(gbuf.depth(f_index), "gbuf depth")?.as_ref(), SamplerType::NearestClamp),
            BindingResource::SampledImage(require_img(gbuf.albedo(f_index), "gbuf albedo")?.as_ref(), SamplerType::NearestClamp),
            BindingResource::SampledImage(require_img(gbuf.normal(f_index), "gbuf normal")?.as_ref(), SamplerType::NearestClamp),
            BindingResource::SampledImage(require_img(gbuf.material(f_index), "gbuf material")?.as_ref(), SamplerType::NearestClamp),
            BindingResource::UniformBuffer(ubuf.as_ref()),
        ],
    )
}

/// G-buffer inputs of a composition pass become shader-readable
pub(crate) fn require_gbuf_reads(
    barriers: &mut PendingBarriers,
    image_states: &mut ImageStateTracker,
    gbuf: &FbufImageBundle,
    f_index: FrameIndex,
) {
    let inputs = [gbuf.depth(f_index), gbuf.albedo(f_index), gbuf.normal(f_index), gbuf.material(f_index)];
    for image in inputs.into_iter().flatten() {
        barriers.require(image_states, image, ImageState::SHADER_READ_FRAGMENT);
    }
}

struct SlotData {
    ubuf: Arc<dyn Buffer>,
    group: Arc<dyn BindingGroup>,
}

struct FrameData {
    fbuf: Arc<dyn Framebuffer>,
    main_ubuf: Arc<dyn Buffer>,
    main_group: Arc<dyn BindingGroup>,
    slots: Vec<SlotData>,
}

pub struct CompoDlightPass {
    res: Arc<RpResources>,
    lifecycle: RenderPassLifecycle<FrameData>,
}

impl CompoDlightPass {
    pub const NAME: &'static str = "compo_dlight";

    pub fn new(bundle: &RpCreateBundle) -> Result<Self> {
        let res = bundle.resources.clone();
        let lifecycle = PassBuilder::new(Self::NAME)
            .color(bundle.device.image_formats().rgba_hdr, LoadOp::Clear, ImageLayout::ColorAttachment, ColorBlendState::ADDITIVE)
            .shaders("fill_screen.vert", Some("compo_dlight.frag"))
            .binding_layout(fragment_layout(4, true))
            .binding_layout(fragment_layout(1, true))
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

            let mut slots = Vec::with_capacity(maps.dlight_count());
            for i in 0..maps.dlight_count() {
                let ubuf = res.device.create_buffer(&BufferDesc {
                    name: format!("{}:shadow#{}_ubuf_{}", Self::NAME, i, f),
                    size: std::mem::size_of::<CompoDlightUniform>() as u64,
                    usage: BufferUsage::Uniform,
                })?;
                let group = res.device.create_binding_group(
                    pipeline,
                    1,
                    &[
                        BindingResource::SampledImage(maps.dlight_at(i).img(f).as_ref(), SamplerType::ShadowCompare),
                        BindingResource::UniformBuffer(ubuf.as_ref()),
                    ],
                )?;
                slots.push(SlotData { ubuf, group });
            }

            Ok(FrameData { fbuf, main_ubuf, main_group, slots })
        })
    }
}

impl RenderPassBase for CompoDlightPass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_resize(&mut self, _width: u32, _height: u32, _res: &RpResources) -> Result<()> {
        self.recreate_frames()
    }

    fn create_task(&self) -> Option<Box<dyn RenderPassTask + '_>> {
        Some(Box::new(CompoDlightTask {
            pass: self,
            frame: None,
            lights: Vec::new(),
            barriers: PendingBarriers::default(),
            out: RecordedCmdBuf::default(),
        }))
    }
}

struct CompoDlightTask<'p> {
    pass: &'p CompoDlightPass,
    frame: Option<&'p FrameData>,
    /// (shadow slot, uniform block)
    lights: Vec<(usize, CompoDlightUniform)>,
    barriers: PendingBarriers,
    out: RecordedCmdBuf,
}

impl RenderPassTask for CompoDlightTask<'_> {
    fn name(&self) -> &str {
        CompoDlightPass::NAME
    }

    fn prepare(&mut self, ctxt: &RpContext, image_states: &mut ImageStateTracker) {
        let pass = self.pass;
        self.frame = pass.lifecycle.frame(ctxt.f_index);
        let (Ok(gbuf), Ok(maps)) = (pass.res.gbuf(), pass.res.shadow_maps()) else {
            return;
        };

        require_gbuf_reads(&mut self.barriers, image_states, &gbuf, ctxt.f_index);
        if let Some(compo) = gbuf.compo(ctxt.f_index) {
            self.barriers.overwrite(image_states, compo, ImageState::COLOR_ATTACHMENT_WRITE);
        }

        for slot in 0..maps.dlight_count() {
            let Some(light) = ctxt.lights.dlight_in_slot(slot) else {
                continue;
            };
            self.barriers.require(image_states, maps.dlight_at(slot).img(ctxt.f_index), ImageState::SHADER_READ_FRAGMENT);
            self.lights.push((slot, CompoDlightUniform::new(light, &ctxt.view_inv)));
        }
    }

    fn update_task(&self, ctxt: &RpContext) -> Result<()> {
        let Some(frame) = self.frame else {
            return Ok(());
        };
        frame.main_ubuf.update(0, bytemuck::bytes_of(&CompoMainUniform::from_ctxt(ctxt)))?;
        for (slot, data) in &self.lights {
            if let Some(slot_data) = frame.slots.get(*slot) {
                slot_data.ubuf.update(0, bytemuck::bytes_of(data))?;
            }
        }
        Ok(())
    }

    fn record_task(&self, ctxt: &RpContext, cmd_pool: &RpCommandPool) -> Result<()> {
        let Some(frame) = self.frame else {
            return Ok(());
        };
        let lifecycle = &self.pass.lifecycle;
        let extent = lifecycle.extent();

        record_with_cmdbuf(CompoDlightPass::NAME, ctxt, cmd_pool, &self.barriers, &self.out, |cmd| {
            cmd.begin_render_pass(lifecycle.render_pass(), &frame.fbuf, &[ClearValue::Color([0.0, 0.0, 0.0, 1.0])], extent)?;
            cmd.bind_pipeline(lifecycle.pipeline())?;
            cmd.set_viewport(Viewport::from_extent(extent))?;
            cmd.set_scissor(Rect2D::from_extent(extent))?;
            cmd.bind_binding_group(lifecycle.pipeline(), 0, &frame.main_group)?;

            for (slot, _) in &self.lights {
                let Some(slot_data) = frame.slots.get(*slot) else {
                    continue;
                };
                cmd.bind_binding_group(lifecycle.pipeline(), 1, &slot_data.group)?;
                cmd.draw(3, 0)?;
            }

            cmd.end_render_pass()
        })
    }

    fn collect_cmdbuf(&self, out: &CmdBufList, f_index: FrameIndex) {
        self.out.collect(out, f_index);
    }
}
