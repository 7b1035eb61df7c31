/// Light components: directional (DLight) and spot (SLight)

use glam::{DMat4, DVec3, DVec4, Vec3};
use crate::cosmos::Transform;
use crate::render::shadow::CascadeInfo;

/// Color normalized so its largest channel is 1, scaled by an intensity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorIntensity {
    pub color: Vec3,
    pub intensity: f32,
}

impl ColorIntensity {
    pub fn new(color: Vec3, intensity: f32) -> Self {
        Self { color, intensity }
    }

    pub fn scaled_color(&self) -> Vec3 {
        self.color * self.intensity
    }

    /// Store an HDR color as normalized color + intensity
    pub fn set_scaled_color(&mut self, color: Vec3) {
        self.color = color;
        self.intensity = 1.0;
        self.normalize_color();
    }

    pub fn normalize_color(&mut self) {
        const EPSILON: f32 = 0.0001;

        if self.color.x <= EPSILON && self.color.y <= EPSILON && self.color.z <= EPSILON {
            self.color = Vec3::ZERO;
            self.intensity = 0.0;
            return;
        }

        let max = self.color.max_element();
        self.color /= max;
        self.intensity *= max;
    }
}

/// Direction of local +Z in the space of `view`
fn calc_to_light_dir(view: &DMat4, tform: &Transform) -> DVec3 {
    let v = *view * tform.make_model_mat() * DVec4::new(0.0, 0.0, 1.0, 0.0);
    v.truncate().normalize_or_zero()
}

/// Directional light
///
/// Follows the camera every frame (its transform position is overwritten
/// during composition update); only its rotation matters for lighting.
#[derive(Debug, Clone)]
pub struct DLight {
    pub color: ColorIntensity,
    pub cascades: CascadeInfo,
}

impl Default for DLight {
    fn default() -> Self {
        Self {
            color: ColorIntensity::default(),
            cascades: CascadeInfo::default(),
        }
    }
}

impl DLight {
    /// Direction towards the light, in the space of `view`
    pub fn calc_to_light_dir(&self, view: &DMat4, tform: &Transform) -> DVec3 {
        calc_to_light_dir(view, tform)
    }

    /// Orient `tform` so that light rays travel along `dir`
    pub fn set_light_dir(dir: DVec3, tform: &mut Transform) {
        let Some(dir) = dir.try_normalize() else {
            return;
        };
        let forward = DVec3::NEG_Z;
        let axis = forward.cross(dir);
        let angle = forward.dot(dir).clamp(-1.0, 1.0).acos();

        tform.reset_rotation();
        if axis.length_squared() > 1e-12 {
            tform.rotate(angle, axis);
        } else if angle > 1.0 {
            // Exactly opposite: any perpendicular axis works
            tform.rotate(angle, DVec3::Y);
        }
    }

    /// Light-space matrix fitting the 8 world-space points `p`
    ///
    /// The depth range (-2·z_max + z_min .. -z_min) puts every point in
    /// clip Z [0.5, 1] and leaves room for casters behind the frustum.
    /// The Y-flip matches the projection convention of `StandardCamera`.
    pub fn make_light_mat(p: &[DVec3; 8], tform: &Transform) -> DMat4 {
        let view = tform.make_view_mat();

        let first = view.transform_point3(p[0]);
        let (mut min, mut max) = (first, first);
        for v in p {
            let v = view.transform_point3(*v);
            min = min.min(v);
            max = max.max(v);
        }

        let mut proj = DMat4::orthographic_rh(
            min.x,
            max.x,
            -max.y,
            -min.y,
            -2.0 * max.z + min.z,
            -min.z,
        );
        proj.y_axis.y *= -1.0;

        proj * view
    }
}

/// Spot light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SLight {
    pub color: ColorIntensity,
    /// Half angle of the fully lit cone, radians
    pub inner_angle: f64,
    /// Half angle where the light fades out, radians
    pub outer_angle: f64,
    pub max_distance: f64,
}

impl Default for SLight {
    fn default() -> Self {
        Self {
            color: ColorIntensity::default(),
            inner_angle: 10f64.to_radians(),
            outer_angle: 25f64.to_radians(),
            max_distance: 100.0,
        }
    }
}

impl SLight {
    pub fn calc_view_space_pos(&self, view: &DMat4, tform: &Transform) -> DVec3 {
        view.transform_point3(tform.pos)
    }

    pub fn calc_to_light_dir(&self, view: &DMat4, tform: &Transform) -> DVec3 {
        calc_to_light_dir(view, tform)
    }

    pub fn make_proj_mat(&self) -> DMat4 {
        let mut proj = DMat4::perspective_rh(self.outer_angle * 2.0, 1.0, 0.1, self.max_distance);
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn make_view_mat(&self, tform: &Transform) -> DMat4 {
        tform.make_view_mat()
    }

    pub fn make_light_mat(&self, tform: &Transform) -> DMat4 {
        self.make_proj_mat() * self.make_view_mat(tform)
    }
}
