/// RpContext - per-frame values shared by every render pass task
///
/// Filled by the frame tasks before `render_passes` runs and only read
/// while passes record.

use std::sync::Arc;
use glam::{DMat4, DVec3, Vec3};
use hecs::Entity;
use crate::cosmos::StandardCamera;
use crate::frame::{FrameIndex, SwapchainImageIndex};
use crate::render::shadow::CascadeInfo;
use crate::render::{DebugRender, DrawSheet, ViewFrustum};

/// Directional light as seen by the composition pass
#[derive(Debug, Clone, PartialEq)]
pub struct DlightSnapshot {
    pub entity: Entity,
    /// View-space direction towards the light
    pub to_light_dir: DVec3,
    pub color: Vec3,
    pub cascades: CascadeInfo,
    /// Shadow map slot, `None` when the light casts no shadow this frame
    pub shadow_slot: Option<usize>,
}

/// Spot light as seen by the composition pass
#[derive(Debug, Clone, PartialEq)]
pub struct SlightSnapshot {
    pub entity: Entity,
    pub view_pos: DVec3,
    pub to_light_dir: DVec3,
    pub color: Vec3,
    pub inner_angle: f64,
    pub outer_angle: f64,
    pub max_distance: f64,
    /// World to light clip space
    pub light_mat: DMat4,
    pub shadow_slot: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightSnapshot {
    pub dlights: Vec<DlightSnapshot>,
    pub slights: Vec<SlightSnapshot>,
}

impl LightSnapshot {
    pub fn clear(&mut self) {
        self.dlights.clear();
        self.slights.clear();
    }

    /// Directional light rendered into shadow slot `slot`
    pub fn dlight_in_slot(&self, slot: usize) -> Option<&DlightSnapshot> {
        self.dlights.iter().find(|d| d.shadow_slot == Some(slot))
    }

    pub fn slight_in_slot(&self, slot: usize) -> Option<&SlightSnapshot> {
        self.slights.iter().find(|s| s.shadow_slot == Some(slot))
    }
}

pub struct RpContext {
    pub f_index: FrameIndex,
    pub i_index: SwapchainImageIndex,
    pub dt: f64,
    pub proj_mat: DMat4,
    pub view_mat: DMat4,
    pub proj_inv: DMat4,
    pub view_inv: DMat4,
    pub view_pos: DVec3,
    /// Width over height of the swapchain
    pub ratio: f64,
    pub camera: StandardCamera,
    pub view_frustum: ViewFrustum,
    pub draw_sheet: Arc<DrawSheet>,
    pub debug_render: DebugRender,
    pub lights: LightSnapshot,
}

impl Default for RpContext {
    fn default() -> Self {
        Self {
            f_index: FrameIndex::default(),
            i_index: SwapchainImageIndex::default(),
            dt: 0.0,
            proj_mat: DMat4::IDENTITY,
            view_mat: DMat4::IDENTITY,
            proj_inv: DMat4::IDENTITY,
            view_inv: DMat4::IDENTITY,
            view_pos: DVec3::ZERO,
            ratio: 1.0,
            camera: StandardCamera::default(),
            view_frustum: ViewFrustum::default(),
            draw_sheet: Arc::new(DrawSheet::default()),
            debug_render: DebugRender::new(),
            lights: LightSnapshot::default(),
        }
    }
}

impl RpContext {
    /// Install the camera matrices and everything derived from them
    pub fn set_camera(&mut self, camera: &StandardCamera, view: DMat4, ratio: f64) {
        self.camera = *camera;
        self.ratio = ratio;
        self.proj_mat = camera.make_proj_mat(ratio);
        self.view_mat = view;
        self.proj_inv = self.proj_mat.inverse();
        self.view_inv = view.inverse();
        self.view_pos = self.view_inv.transform_point3(DVec3::ZERO);
        self.view_frustum.update(&self.proj_mat, &self.view_mat);
    }
}
