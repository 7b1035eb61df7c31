/// BindingGroup trait and binding group descriptors
///
/// A BindingGroup is an immutable set of GPU resource bindings (images,
/// buffers, samplers) created against one set index of a pipeline. Passes
/// rebuild theirs whenever the images they point at are recreated.

use std::any::Any;
use bitflags::bitflags;
use crate::device::{Buffer, Image, ShaderStage};

/// Type of resource bound at a given slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingType {
    UniformBuffer,
    CombinedImageSampler,
    StorageImage,
}

bitflags! {
    /// Shader stage visibility flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 0x01;
        const FRAGMENT = 0x02;
        const COMPUTE = 0x04;
        const VERTEX_FRAGMENT = 0x03;
    }
}

impl ShaderStageFlags {
    /// Create from a slice of ShaderStage
    pub fn from_stages(stages: &[ShaderStage]) -> Self {
        stages.iter().fold(Self::empty(), |acc, stage| {
            acc | match stage {
                ShaderStage::Vertex => Self::VERTEX,
                ShaderStage::Fragment => Self::FRAGMENT,
                ShaderStage::Compute => Self::COMPUTE,
            }
        })
    }
}

/// Description of a single binding slot
#[derive(Debug, Clone)]
pub struct BindingSlotDesc {
    /// Binding number (`layout(binding = N)` in GLSL)
    pub binding: u32,
    pub binding_type: BindingType,
    /// Number of descriptors at this binding (>1 for arrays)
    pub count: u32,
    pub stage_flags: ShaderStageFlags,
}

impl BindingSlotDesc {
    pub fn new(binding: u32, binding_type: BindingType, stage_flags: ShaderStageFlags) -> Self {
        Self { binding, binding_type, count: 1, stage_flags }
    }
}

/// Layout of one set index
#[derive(Debug, Clone, Default)]
pub struct BindingGroupLayoutDesc {
    pub entries: Vec<BindingSlotDesc>,
}

/// Sampler kinds resolved by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerType {
    /// Linear filtering, clamp to edge
    LinearClamp,
    /// Nearest filtering, clamp to edge
    NearestClamp,
    /// Depth comparison sampler for shadow maps
    ShadowCompare,
}

/// A concrete resource to bind into a BindingGroup, in slot order
pub enum BindingResource<'a> {
    UniformBuffer(&'a dyn Buffer),
    SampledImage(&'a dyn Image, SamplerType),
    /// Array of sampled images bound at one slot
    SampledImageArray(Vec<&'a dyn Image>, SamplerType),
    StorageImage(&'a dyn Image),
}

/// An immutable set of GPU resource bindings
pub trait BindingGroup: Send + Sync {
    /// Returns the set index this BindingGroup was created for
    fn set_index(&self) -> u32;

    fn as_any(&self) -> &dyn Any;
}
