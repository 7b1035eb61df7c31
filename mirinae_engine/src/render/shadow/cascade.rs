/// Cascaded shadow map partitioning for directional lights

use glam::{DMat4, DVec3};
use crate::cosmos::{DLight, StandardCamera, Transform};

pub const CASCADE_COUNT: usize = 4;

/// One slice of the camera frustum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cascade {
    /// World-space corners: near plane in 0..4, far plane in 4..8
    pub frustum_verts: [DVec3; 8],
    /// Light projection × light view fitted to `frustum_verts`
    pub light_mat: DMat4,
    pub near: f64,
    pub far: f64,
}

impl Default for Cascade {
    fn default() -> Self {
        Self {
            frustum_verts: [DVec3::ZERO; 8],
            light_mat: DMat4::IDENTITY,
            near: 0.0,
            far: 0.0,
        }
    }
}

/// Cascades of one directional light, recomputed every frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeInfo {
    pub cascades: [Cascade; CASCADE_COUNT],
    /// Clip-space depth of each cascade's far plane, in camera projection
    pub far_depths: [f64; CASCADE_COUNT],
}

impl CascadeInfo {
    /// Split the camera frustum `[near, far]` and fit a light matrix to every slice
    pub fn update(&mut self, ratio: f64, view_inv: &DMat4, camera: &StandardCamera, tform: &Transform) {
        let dist = Self::make_plane_distances(camera.near, camera.far);

        for (i, cascade) in self.cascades.iter_mut().enumerate() {
            cascade.near = dist[i];
            cascade.far = dist[i + 1];

            let (near_verts, far_verts) = cascade.frustum_verts.split_at_mut(4);
            Self::make_frustum_vertices(ratio, cascade.near, camera.fov, view_inv, near_verts);
            Self::make_frustum_vertices(ratio, cascade.far, camera.fov, view_inv, far_verts);

            cascade.light_mat = DLight::make_light_mat(&cascade.frustum_verts, tform);
            self.far_depths[i] = Self::calc_clip_depth(-cascade.far, camera.near, camera.far);
        }
    }

    /// Four world-space corners of the view plane at distance `plane_dist`
    ///
    /// Order: (-x,-y), (+x,-y), (-x,+y), (+x,+y).
    pub fn make_frustum_vertices(
        screen_ratio: f64,
        plane_dist: f64,
        fov: f64,
        view_inv: &DMat4,
        out: &mut [DVec3],
    ) {
        let tan_half_v = (fov * 0.5).tan();
        let tan_half_h = tan_half_v * screen_ratio;
        let half_width = plane_dist * tan_half_h;
        let half_height = plane_dist * tan_half_v;

        let corners = [
            DVec3::new(-half_width, -half_height, -plane_dist),
            DVec3::new(half_width, -half_height, -plane_dist),
            DVec3::new(-half_width, half_height, -plane_dist),
            DVec3::new(half_width, half_height, -plane_dist),
        ];
        for (dst, src) in out.iter_mut().zip(corners) {
            *dst = view_inv.transform_point3(src);
        }
    }

    /// `[n, n+d·0.05, n+d·0.2, n+d·0.5, f]` with `d = f - n`
    pub fn make_plane_distances(near: f64, far: f64) -> [f64; CASCADE_COUNT + 1] {
        let d = far - near;
        [near, near + d * 0.05, near + d * 0.2, near + d * 0.5, far]
    }

    /// Clip-space depth of view-space `z` under a zero-to-one perspective (n, f)
    pub fn calc_clip_depth(z: f64, near: f64, far: f64) -> f64 {
        (far * (z + near)) / (z * (far - near))
    }
}

#[cfg(test)]
#[path = "cascade_tests.rs"]
mod tests;
