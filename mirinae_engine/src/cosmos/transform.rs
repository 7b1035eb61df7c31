/// Transform component - position, rotation and scale in double precision

use glam::{DMat4, DQuat, DVec3};

/// World transform of an entity
///
/// The rotation orients the local -Z axis (forward) of cameras and lights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub pos: DVec3,
    pub rot: DQuat,
    pub scale: DVec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            pos: DVec3::ZERO,
            rot: DQuat::IDENTITY,
            scale: DVec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style position setter
    pub fn with_pos(mut self, pos: DVec3) -> Self {
        self.pos = pos;
        self
    }

    pub fn with_scale(mut self, scale: DVec3) -> Self {
        self.scale = scale;
        self
    }

    /// Rotate by `angle` radians around the world-space `axis`
    ///
    /// A zero-length axis leaves the rotation untouched.
    pub fn rotate(&mut self, angle: f64, axis: DVec3) {
        let Some(axis) = axis.try_normalize() else {
            return;
        };
        self.rot = (DQuat::from_axis_angle(axis, angle) * self.rot).normalize();
    }

    pub fn reset_rotation(&mut self) {
        self.rot = DQuat::IDENTITY;
    }

    /// translate × rotate × scale
    pub fn make_model_mat(&self) -> DMat4 {
        DMat4::from_translation(self.pos) * DMat4::from_quat(self.rot) * DMat4::from_scale(self.scale)
    }

    /// Inverse rigid transform (scale ignored)
    pub fn make_view_mat(&self) -> DMat4 {
        DMat4::from_quat(self.rot.conjugate()) * DMat4::from_translation(-self.pos)
    }
}
