/// StandardCamera component

use glam::DMat4;

/// Perspective camera parameters and post-processing settings
///
/// Paired with a `Transform` on the same entity, which provides the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardCamera {
    /// Vertical field of view in radians
    pub fov: f64,
    pub near: f64,
    pub far: f64,
    pub exposure: f32,
    pub gamma: f32,
    pub bloom_radius: f32,
    pub bloom_strength: f32,
}

impl Default for StandardCamera {
    fn default() -> Self {
        Self {
            fov: 80f64.to_radians(),
            near: 0.1,
            far: 1000.0,
            exposure: 1.0,
            gamma: 1.0,
            bloom_radius: 0.005,
            bloom_strength: 0.02,
        }
    }
}

impl StandardCamera {
    /// Right-handed, zero-to-one depth projection with Y pointing down in clip space
    pub fn make_proj_mat(&self, aspect_ratio: f64) -> DMat4 {
        let mut proj = DMat4::perspective_rh(self.fov, aspect_ratio, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }
}
