/// GPU-side models: render units grouped into a model

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use crate::device::{
    Buffer, BufferDesc, BufferUsage, CommandList, GraphicsDevice, IndexType, VertexAttribute,
    VertexBinding, VertexFormat, VertexLayout,
};
use crate::error::Result;

/// Vertex of a static mesh
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexStatic {
    pub pos: Vec3,
    pub normal: Vec3,
    pub texcoord: Vec2,
}

impl VertexStatic {
    pub fn layout() -> VertexLayout {
        VertexLayout {
            bindings: vec![VertexBinding {
                binding: 0,
                stride: std::mem::size_of::<VertexStatic>() as u32,
            }],
            attributes: vec![
                VertexAttribute { location: 0, binding: 0, format: VertexFormat::Float3, offset: 0 },
                VertexAttribute { location: 1, binding: 0, format: VertexFormat::Float3, offset: 12 },
                VertexAttribute { location: 2, binding: 0, format: VertexFormat::Float2, offset: 24 },
            ],
        }
    }
}

/// One drawable piece of a model (one material, one index range)
pub struct RenderUnit {
    pub name: String,
    vertex_buffer: Arc<dyn Buffer>,
    index_buffer: Arc<dyn Buffer>,
    index_count: u32,
}

impl RenderUnit {
    /// Upload `vertices` and `indices` into fresh buffers
    pub fn from_data(
        device: &dyn GraphicsDevice,
        name: impl Into<String>,
        vertices: &[VertexStatic],
        indices: &[u32],
    ) -> Result<Self> {
        let name = name.into();
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);

        let vertex_buffer = device.create_buffer(&BufferDesc {
            name: format!("{}:vbuf", name),
            size: vertex_bytes.len().max(1) as u64,
            usage: BufferUsage::Vertex,
        })?;
        vertex_buffer.update(0, vertex_bytes)?;

        let index_buffer = device.create_buffer(&BufferDesc {
            name: format!("{}:ibuf", name),
            size: index_bytes.len().max(1) as u64,
            usage: BufferUsage::Index,
        })?;
        index_buffer.update(0, index_bytes)?;

        Ok(Self {
            name,
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn record_bind_vbuf(&self, cmd: &mut dyn CommandList) -> Result<()> {
        cmd.bind_vertex_buffer(&self.vertex_buffer, 0)?;
        cmd.bind_index_buffer(&self.index_buffer, 0, IndexType::U32)
    }

    /// Bind buffers and issue one indexed draw
    pub fn record_draw(&self, cmd: &mut dyn CommandList) -> Result<()> {
        self.record_bind_vbuf(cmd)?;
        cmd.draw_indexed(self.index_count, 0, 0)
    }
}

/// A loaded model: opaque units first, then alpha-blended units
#[derive(Default)]
pub struct RenderModel {
    pub units: Vec<Arc<RenderUnit>>,
    pub alpha_units: Vec<Arc<RenderUnit>>,
}

impl RenderModel {
    pub fn new(units: Vec<Arc<RenderUnit>>, alpha_units: Vec<Arc<RenderUnit>>) -> Self {
        Self { units, alpha_units }
    }

    /// Total unit count; alpha unit `i` has visibility index `units.len() + i`
    pub fn ren_unit_count(&self) -> usize {
        self.units.len() + self.alpha_units.len()
    }
}
