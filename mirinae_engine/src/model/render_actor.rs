/// Per-entity GPU state: one uniform buffer per frame slot

use std::sync::{Arc, Mutex};
use bytemuck::{Pod, Zeroable};
use glam::{DMat4, Mat4};
use crate::device::{
    BindingGroup, BindingResource, Buffer, BufferDesc, BufferUsage, GraphicsDevice, Pipeline,
};
use crate::error::{Error, Result};
use crate::frame::{FrameIndex, MAX_FRAMES_IN_FLIGHT};

/// Uniform block consumed by the g-buffer vertex shader
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GbufActorUniform {
    pub model: Mat4,
    pub view_model: Mat4,
    pub pvm: Mat4,
}

impl GbufActorUniform {
    pub fn new(model: &DMat4, view: &DMat4, proj: &DMat4) -> Self {
        let view_model = *view * *model;
        Self {
            model: model.as_mat4(),
            view_model: view_model.as_mat4(),
            pvm: (*proj * view_model).as_mat4(),
        }
    }
}

/// Render actor of one model-actor entity
///
/// Binding groups are created lazily by the pass that consumes them and
/// cached per frame slot.
pub struct RenderActor {
    ubufs: Vec<Arc<dyn Buffer>>,
    binding_groups: Mutex<Vec<Option<Arc<dyn BindingGroup>>>>,
}

impl RenderActor {
    pub fn new(device: &dyn GraphicsDevice, name: &str) -> Result<Self> {
        let mut ubufs = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for f_index in FrameIndex::all() {
            ubufs.push(device.create_buffer(&BufferDesc {
                name: format!("{}:actor_ubuf_{}", name, f_index),
                size: std::mem::size_of::<GbufActorUniform>() as u64,
                usage: BufferUsage::Uniform,
            })?);
        }
        Ok(Self {
            ubufs,
            binding_groups: Mutex::new(vec![None; MAX_FRAMES_IN_FLIGHT]),
        })
    }

    pub fn ubuf(&self, f_index: FrameIndex) -> &Arc<dyn Buffer> {
        &self.ubufs[f_index.get()]
    }

    pub fn update_ubuf(&self, f_index: FrameIndex, data: &GbufActorUniform) -> Result<()> {
        self.ubufs[f_index.get()].update(0, bytemuck::bytes_of(data))
    }

    /// Binding group exposing this actor's uniform buffer at `set_index` of `pipeline`
    pub fn binding_group(
        &self,
        f_index: FrameIndex,
        device: &dyn GraphicsDevice,
        pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
    ) -> Result<Arc<dyn BindingGroup>> {
        let mut groups = self
            .binding_groups
            .lock()
            .map_err(|_| Error::BackendError("actor binding group lock poisoned".to_string()))?;
        if let Some(group) = &groups[f_index.get()] {
            return Ok(group.clone());
        }
        let group = device.create_binding_group(
            pipeline,
            set_index,
            &[BindingResource::UniformBuffer(self.ubufs[f_index.get()].as_ref())],
        )?;
        groups[f_index.get()] = Some(group.clone());
        Ok(group)
    }
}
