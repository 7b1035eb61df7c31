/// Pipeline trait and pipeline descriptors

use std::any::Any;
use std::sync::Arc;
use crate::device::{BindingGroupLayoutDesc, RenderPass, ShaderCode, ShaderStage};

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Vertex attribute formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float2,
    Float3,
    Float4,
    UInt4,
}

/// Vertex attribute description
#[derive(Debug, Clone, Copy)]
pub struct VertexAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: VertexFormat,
    /// Offset in bytes from the start of the vertex
    pub offset: u32,
}

/// Vertex binding description
#[derive(Debug, Clone, Copy)]
pub struct VertexBinding {
    pub binding: u32,
    /// Stride in bytes between consecutive vertices
    pub stride: u32,
}

/// Vertex input layout
#[derive(Debug, Clone, Default)]
pub struct VertexLayout {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
}

/// Push constant range descriptor
#[derive(Debug, Clone)]
pub struct PushConstantRange {
    pub stages: Vec<ShaderStage>,
    pub offset: u32,
    pub size: u32,
}

// ===== FIXED-FUNCTION STATE =====

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Front face winding order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

/// Comparison operator for depth tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Always,
}

/// Depth bias parameters
#[derive(Debug, Clone, Copy)]
pub struct DepthBias {
    pub constant_factor: f32,
    pub slope_factor: f32,
    pub clamp: f32,
}

/// Rasterization fixed-function state
#[derive(Debug, Clone, Copy)]
pub struct RasterizationState {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    /// Depth bias (None = disabled)
    pub depth_bias: Option<DepthBias>,
    /// Clamp fragment depth instead of clipping against near/far
    pub depth_clamp: bool,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            depth_bias: None,
            depth_clamp: false,
        }
    }
}

/// Depth testing state
#[derive(Debug, Clone, Copy)]
pub struct DepthState {
    pub test_enable: bool,
    pub write_enable: bool,
    pub compare_op: CompareOp,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            test_enable: true,
            write_enable: true,
            compare_op: CompareOp::Less,
        }
    }
}

impl DepthState {
    /// No depth test and no depth write (fullscreen passes)
    pub const DISABLED: Self = Self {
        test_enable: false,
        write_enable: false,
        compare_op: CompareOp::Always,
    };
}

/// Blend factor for color blending equations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Per-attachment color blending state
#[derive(Debug, Clone, Copy)]
pub struct ColorBlendState {
    pub blend_enable: bool,
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
}

impl Default for ColorBlendState {
    fn default() -> Self {
        Self {
            blend_enable: false,
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::Zero,
        }
    }
}

impl ColorBlendState {
    /// Additive blending (src + dst)
    pub const ADDITIVE: Self = Self {
        blend_enable: true,
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::One,
    };

    /// Standard alpha blending
    pub const ALPHA: Self = Self {
        blend_enable: true,
        src_factor: BlendFactor::SrcAlpha,
        dst_factor: BlendFactor::OneMinusSrcAlpha,
    };
}

// ===== PIPELINE DESCRIPTORS =====

/// Descriptor for creating a graphics pipeline
///
/// Binding layouts are declared explicitly, one entry per set index.
#[derive(Clone)]
pub struct PipelineDesc {
    pub name: String,
    pub render_pass: Arc<dyn RenderPass>,
    pub vertex_shader: ShaderCode,
    pub fragment_shader: Option<ShaderCode>,
    pub vertex_layout: VertexLayout,
    pub topology: PrimitiveTopology,
    pub binding_layouts: Vec<BindingGroupLayoutDesc>,
    pub push_constant_ranges: Vec<PushConstantRange>,
    pub rasterization: RasterizationState,
    pub depth: DepthState,
    /// One entry per color attachment of `render_pass`
    pub color_blend: Vec<ColorBlendState>,
}

/// Descriptor for creating a compute pipeline
#[derive(Clone)]
pub struct ComputePipelineDesc {
    pub name: String,
    pub shader: ShaderCode,
    pub binding_layouts: Vec<BindingGroupLayoutDesc>,
    pub push_constant_ranges: Vec<PushConstantRange>,
}

/// Whether a pipeline is bound to the graphics or compute bind point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    Graphics,
    Compute,
}

/// Pipeline resource trait
///
/// The pipeline is automatically destroyed when dropped.
pub trait Pipeline: Send + Sync {
    fn kind(&self) -> PipelineKind;

    /// Number of binding group layouts (set indices) of this pipeline
    fn binding_layout_count(&self) -> u32;

    fn as_any(&self) -> &dyn Any;
}
