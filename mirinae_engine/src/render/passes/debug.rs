/// Debug overlay drawn over `compo`
///
/// Triangles come from `RpContext::debug_render`: clip-space ones as they
/// are, world-space ones through the camera. They are streamed into a
/// per-frame vertex buffer that grows on demand. Debug meshes are drawn with
/// a second pipeline taking the full transform as a push constant.

use std::sync::{Arc, Mutex};
use bytemuck::{Pod, Zeroable};
use glam::{DMat4, Mat4, Vec4};
use crate::device::{
    Buffer, BufferDesc, BufferUsage, ColorBlendState, CommandList, Framebuffer, FramebufferDesc,
    GraphicsDevice, ImageLayout, ImageState, LoadOp, Rect2D, ShaderStage, VertexAttribute,
    VertexBinding, VertexFormat, VertexLayout, Viewport,
};
use crate::error::Result;
use crate::frame::{CmdBufList, FrameIndex, RpCommandPool};
use crate::model::VertexStatic;
use crate::render::debug_render::DebugMeshActor;
use crate::render::passes::require_img;
use crate::render::{
    record_with_cmdbuf, ImageStateTracker, PassBuilder, PendingBarriers, RecordedCmdBuf,
    RenderPassBase, RenderPassLifecycle, RenderPassTask, RpContext, RpCreateBundle, RpResources,
};

const MESH_COLOR: Vec4 = Vec4::new(0.0, 1.0, 0.0, 0.5);

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DebugVertex {
    /// Clip-space position
    pub pos: Vec4,
    pub color: Vec4,
}

impl DebugVertex {
    pub fn layout() -> VertexLayout {
        VertexLayout {
            bindings: vec![VertexBinding {
                binding: 0,
                stride: std::mem::size_of::<DebugVertex>() as u32,
            }],
            attributes: vec![
                VertexAttribute { location: 0, binding: 0, format: VertexFormat::Float4, offset: 0 },
                VertexAttribute { location: 1, binding: 0, format: VertexFormat::Float4, offset: 16 },
            ],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct DebugMeshPushConst {
    pvm: Mat4,
    color: Vec4,
}

/// Vertices of every debug triangle of this frame, in clip space
pub fn build_vertices(ctxt: &RpContext) -> Vec<DebugVertex> {
    let tris = ctxt.debug_render.triangles();
    let world_tris = ctxt.debug_render.world_triangles();
    let mut out = Vec::with_capacity((tris.len() + world_tris.len()) * 3);

    for tri in &tris {
        out.extend(tri.vertices.iter().map(|&pos| DebugVertex { pos, color: tri.color }));
    }

    let pv = (ctxt.proj_mat * ctxt.view_mat).as_mat4();
    for tri in &world_tris {
        out.extend(tri.vertices.iter().map(|p| DebugVertex { pos: pv * p.extend(1.0), color: tri.color }));
    }
    out
}

struct TriFrame {
    fbuf: Arc<dyn Framebuffer>,
    vbuf: Mutex<Option<Arc<dyn Buffer>>>,
}

impl TriFrame {
    /// Upload `bytes`, replacing the buffer when it is too small
    fn upload(&self, device: &dyn GraphicsDevice, f_index: FrameIndex, bytes: &[u8]) -> Result<()> {
        let mut slot = self
            .vbuf
            .lock()
            .map_err(|_| crate::error::Error::BackendError("debug vertex buffer lock poisoned".to_string()))?;
        let needed = bytes.len() as u64;
        let too_small = slot.as_ref().map_or(true, |buf| buf.size() < needed);
        if too_small {
            *slot = Some(device.create_buffer(&BufferDesc {
                name: format!("{}:vbuf_{}", DebugPass::NAME, f_index),
                size: needed.next_power_of_two(),
                usage: BufferUsage::Vertex,
            })?);
        }
        match slot.as_ref() {
            Some(buf) => buf.update(0, bytes),
            None => Ok(()),
        }
    }

    fn buffer(&self) -> Option<Arc<dyn Buffer>> {
        self.vbuf.lock().ok().and_then(|slot| slot.clone())
    }
}

pub struct DebugPass {
    res: Arc<RpResources>,
    tri: RenderPassLifecycle<TriFrame>,
    mesh: RenderPassLifecycle<Arc<dyn Framebuffer>>,
}

impl DebugPass {
    pub const NAME: &'static str = "debug";

    pub fn new(bundle: &RpCreateBundle) -> Result<Self> {
        let res = bundle.resources.clone();
        let hdr = bundle.device.image_formats().rgba_hdr;

        let tri = PassBuilder::new(format!("{}:tri", Self::NAME))
            .color(hdr, LoadOp::Load, ImageLayout::ColorAttachment, ColorBlendState::ALPHA)
            .shaders("debug_tri.vert", Some("debug_tri.frag"))
            .vertex_layout(DebugVertex::layout())
            .build(bundle.device.as_ref(), res.shaders.as_ref())?;

        let mesh = PassBuilder::new(format!("{}:mesh", Self::NAME))
            .color(hdr, LoadOp::Load, ImageLayout::ColorAttachment, ColorBlendState::ALPHA)
            .shaders("debug_mesh.vert", Some("debug_mesh.frag"))
            .vertex_layout(VertexStatic::layout())
            .push_constant(&[ShaderStage::Vertex, ShaderStage::Fragment], std::mem::size_of::<DebugMeshPushConst>() as u32)
            .build(bundle.device.as_ref(), res.shaders.as_ref())?;

        let mut pass = Self { res, tri, mesh };
        pass.recreate_frames()?;
        Ok(pass)
    }

    fn recreate_frames(&mut self) -> Result<()> {
        let res = self.res.as_ref();
        let gbuf = res.gbuf()?;
        let make_fbuf = |f: FrameIndex, render_pass: &Arc<dyn crate::device::RenderPass>| {
            res.device.create_framebuffer(&FramebufferDesc {
                render_pass: render_pass.clone(),
                attachments: vec![require_img(gbuf.compo(f), "compo")?.clone()],
                width: gbuf.width(),
                height: gbuf.height(),
            })
        };

        self.tri.rebuild(gbuf.extent(), |f, render_pass, _| {
            Ok(TriFrame { fbuf: make_fbuf(f, render_pass)?, vbuf: Mutex::new(None) })
        })?;
        self.mesh.rebuild(gbuf.extent(), |f, render_pass, _| make_fbuf(f, render_pass))
    }
}

impl RenderPassBase for DebugPass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_resize(&mut self, _width: u32, _height: u32, _res: &RpResources) -> Result<()> {
        self.recreate_frames()
    }

    fn create_task(&self) -> Option<Box<dyn RenderPassTask + '_>> {
        Some(Box::new(DebugTask {
            pass: self,
            f_index: FrameIndex::default(),
            vertices: Vec::new(),
            meshes: Vec::new(),
            barriers: PendingBarriers::default(),
            out: RecordedCmdBuf::default(),
        }))
    }
}

struct DebugTask<'p> {
    pass: &'p DebugPass,
    f_index: FrameIndex,
    vertices: Vec<DebugVertex>,
    meshes: Vec<DebugMeshActor>,
    barriers: PendingBarriers,
    out: RecordedCmdBuf,
}

impl DebugTask<'_> {
    fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.meshes.is_empty()
    }

    fn record_tris(&self, cmd: &mut dyn CommandList, frame: &TriFrame) -> Result<()> {
        let Some(vbuf) = frame.buffer() else {
            return Ok(());
        };
        let lifecycle = &self.pass.tri;
        let extent = lifecycle.extent();
        cmd.begin_render_pass(lifecycle.render_pass(), &frame.fbuf, &[], extent)?;
        cmd.bind_pipeline(lifecycle.pipeline())?;
        cmd.set_viewport(Viewport::from_extent(extent))?;
        cmd.set_scissor(Rect2D::from_extent(extent))?;
        cmd.bind_vertex_buffer(&vbuf, 0)?;
        cmd.draw(self.vertices.len() as u32, 0)?;
        cmd.end_render_pass()
    }

    fn record_meshes(&self, cmd: &mut dyn CommandList, fbuf: &Arc<dyn Framebuffer>, pv: DMat4) -> Result<()> {
        let lifecycle = &self.pass.mesh;
        let extent = lifecycle.extent();
        cmd.begin_render_pass(lifecycle.render_pass(), fbuf, &[], extent)?;
        cmd.bind_pipeline(lifecycle.pipeline())?;
        cmd.set_viewport(Viewport::from_extent(extent))?;
        cmd.set_scissor(Rect2D::from_extent(extent))?;
        for mesh in &self.meshes {
            let push = DebugMeshPushConst { pvm: (pv * mesh.model_mat).as_mat4(), color: MESH_COLOR };
            mesh.unit.record_bind_vbuf(cmd)?;
            cmd.push_constants(
                lifecycle.pipeline(),
                &[ShaderStage::Vertex, ShaderStage::Fragment],
                0,
                bytemuck::bytes_of(&push),
            )?;
            cmd.draw_indexed(mesh.unit.index_count(), 0, 0)?;
        }
        cmd.end_render_pass()
    }
}

impl RenderPassTask for DebugTask<'_> {
    fn name(&self) -> &str {
        DebugPass::NAME
    }

    fn prepare(&mut self, ctxt: &RpContext, image_states: &mut ImageStateTracker) {
        self.f_index = ctxt.f_index;
        self.vertices = build_vertices(ctxt);
        self.meshes = ctxt.debug_render.meshes();
        if self.is_empty() {
            return;
        }
        if let Ok(gbuf) = self.pass.res.gbuf() {
            if let Some(compo) = gbuf.compo(ctxt.f_index) {
                self.barriers.require(image_states, compo, ImageState::COLOR_ATTACHMENT_READ_WRITE);
            }
        }
    }

    fn update_task(&self, _ctxt: &RpContext) -> Result<()> {
        if self.vertices.is_empty() {
            return Ok(());
        }
        match self.pass.tri.frame(self.f_index) {
            Some(frame) => frame.upload(self.pass.res.device.as_ref(), self.f_index, bytemuck::cast_slice(&self.vertices)),
            None => Ok(()),
        }
    }

    fn record_task(&self, ctxt: &RpContext, cmd_pool: &RpCommandPool) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let (Some(tri_frame), Some(mesh_fbuf)) = (self.pass.tri.frame(ctxt.f_index), self.pass.mesh.frame(ctxt.f_index)) else {
            return Ok(());
        };
        let pv = ctxt.proj_mat * ctxt.view_mat;

        record_with_cmdbuf(DebugPass::NAME, ctxt, cmd_pool, &self.barriers, &self.out, |cmd| {
            if !self.vertices.is_empty() {
                self.record_tris(cmd, tri_frame)?;
            }
            if !self.meshes.is_empty() {
                self.record_meshes(cmd, mesh_fbuf, pv)?;
            }
            Ok(())
        })
    }

    fn collect_cmdbuf(&self, out: &CmdBufList, f_index: FrameIndex) {
        self.out.collect(out, f_index);
    }
}
