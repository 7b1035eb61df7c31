/// Shadow map pools for directional and spot lights

use std::sync::Arc;
use hecs::Entity;
use crate::config::ShadowConfig;
use crate::device::{
    Extent2D, Framebuffer, FramebufferDesc, GraphicsDevice, Image, ImageDesc, ImageUsage,
    RenderPass,
};
use crate::error::Result;
use crate::frame::{FrameIndex, MAX_FRAMES_IN_FLIGHT};
use crate::render::shadow::assign_slots;

/// One shadow slot: a depth image and framebuffer per frame slot, plus the
/// light entity currently rendered into it
pub struct ShadowMap {
    images: Vec<Arc<dyn Image>>,
    fbufs: Vec<Arc<dyn Framebuffer>>,
    entity: Option<Entity>,
    width: u32,
    height: u32,
}

/// Directional shadow slot; the 4 cascades are quadrants of one image
pub type DlightShadowMap = ShadowMap;

pub type SlightShadowMap = ShadowMap;

impl ShadowMap {
    fn new(device: &dyn GraphicsDevice, name: &str, width: u32, height: u32) -> Result<Self> {
        let mut images = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for f_index in FrameIndex::all() {
            images.push(device.create_image(&ImageDesc {
                name: format!("{}_{}", name, f_index),
                width,
                height,
                format: device.image_formats().depth,
                usage: ImageUsage::DEPTH_ATTACHMENT | ImageUsage::SAMPLED,
                array_layers: 1,
            })?);
        }
        Ok(Self { images, fbufs: Vec::new(), entity: None, width, height })
    }

    fn recreate_fbufs(&mut self, render_pass: &Arc<dyn RenderPass>, device: &dyn GraphicsDevice) -> Result<()> {
        let mut fbufs = Vec::with_capacity(self.images.len());
        for image in &self.images {
            fbufs.push(device.create_framebuffer(&FramebufferDesc {
                render_pass: render_pass.clone(),
                attachments: vec![image.clone()],
                width: self.width,
                height: self.height,
            })?);
        }
        self.fbufs = fbufs;
        Ok(())
    }

    pub fn img(&self, f_index: FrameIndex) -> &Arc<dyn Image> {
        &self.images[f_index.get()]
    }

    /// `None` until the owning shadow pass created the framebuffers
    pub fn fbuf(&self, f_index: FrameIndex) -> Option<&Arc<dyn Framebuffer>> {
        self.fbufs.get(f_index.get())
    }

    pub fn entity(&self) -> Option<Entity> {
        self.entity
    }

    pub fn set_entity(&mut self, entity: Option<Entity>) {
        self.entity = entity;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn extent(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }
}

/// Which pool of a shadow bundle an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowKind {
    Directional,
    Spot,
}

/// Everything the frame tasks and passes need from a shadow map pool
pub trait ShadowMaps: Send + Sync {
    fn dlight_count(&self) -> usize;

    fn dlight_at(&self, index: usize) -> &DlightShadowMap;

    fn slight_count(&self) -> usize;

    fn slight_at(&self, index: usize) -> &SlightShadowMap;

    /// Bind the selected lights to slots, keeping previous bindings where possible
    ///
    /// Lights beyond capacity are dropped. Returns each slot's new entity.
    fn assign(&mut self, kind: ShadowKind, selected: &[Entity]) -> Vec<Option<Entity>>;

    /// Rebuild the framebuffers of one pool against `render_pass`
    fn recreate_fbufs(
        &mut self,
        kind: ShadowKind,
        render_pass: &Arc<dyn RenderPass>,
        device: &dyn GraphicsDevice,
    ) -> Result<()>;

    fn slot_of(&self, kind: ShadowKind, entity: Entity) -> Option<usize> {
        match kind {
            ShadowKind::Directional => {
                (0..self.dlight_count()).find(|&i| self.dlight_at(i).entity() == Some(entity))
            }
            ShadowKind::Spot => {
                (0..self.slight_count()).find(|&i| self.slight_at(i).entity() == Some(entity))
            }
        }
    }
}

/// Fixed pool of directional and spot shadow maps
pub struct ShadowMapBundle {
    dlights: Vec<DlightShadowMap>,
    slights: Vec<SlightShadowMap>,
}

impl ShadowMapBundle {
    pub fn new(device: &dyn GraphicsDevice, config: &ShadowConfig) -> Result<Self> {
        let mut dlights = Vec::with_capacity(config.dlight_slots);
        for i in 0..config.dlight_slots {
            dlights.push(ShadowMap::new(
                device,
                &format!("shadow_dlight#{}", i),
                config.dlight_resolution,
                config.dlight_resolution,
            )?);
        }

        let mut slights = Vec::with_capacity(config.slight_slots);
        for i in 0..config.slight_slots {
            slights.push(ShadowMap::new(
                device,
                &format!("shadow_slight#{}", i),
                config.slight_resolution,
                config.slight_resolution,
            )?);
        }

        crate::engine_debug!(
            "mirinae::ShadowMapBundle",
            "{} directional and {} spot shadow slots",
            dlights.len(), slights.len()
        );
        Ok(Self { dlights, slights })
    }

    fn pool_mut(&mut self, kind: ShadowKind) -> &mut Vec<ShadowMap> {
        match kind {
            ShadowKind::Directional => &mut self.dlights,
            ShadowKind::Spot => &mut self.slights,
        }
    }
}

impl ShadowMaps for ShadowMapBundle {
    fn dlight_count(&self) -> usize {
        self.dlights.len()
    }

    fn dlight_at(&self, index: usize) -> &DlightShadowMap {
        &self.dlights[index]
    }

    fn slight_count(&self) -> usize {
        self.slights.len()
    }

    fn slight_at(&self, index: usize) -> &SlightShadowMap {
        &self.slights[index]
    }

    fn assign(&mut self, kind: ShadowKind, selected: &[Entity]) -> Vec<Option<Entity>> {
        let pool = self.pool_mut(kind);
        let previous: Vec<Option<Entity>> = pool.iter().map(|m| m.entity()).collect();
        let slots = assign_slots(&previous, selected);
        for (map, entity) in pool.iter_mut().zip(&slots) {
            map.set_entity(*entity);
        }
        slots
    }

    fn recreate_fbufs(
        &mut self,
        kind: ShadowKind,
        render_pass: &Arc<dyn RenderPass>,
        device: &dyn GraphicsDevice,
    ) -> Result<()> {
        for map in self.pool_mut(kind) {
            map.recreate_fbufs(render_pass, device)?;
        }
        Ok(())
    }
}
