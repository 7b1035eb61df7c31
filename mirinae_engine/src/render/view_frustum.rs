/// ViewFrustum - camera frustum as corner points and separating axes
///
/// Everything is in view space. The 8 corners are the NDC cube corners
/// unprojected through the inverse projection; the 6 axes are the face
/// normals, usable for separating-axis overlap tests.

use glam::{DMat4, DVec3, DVec4};

/// NDC corners with zero-to-one depth; z = 1 is the far plane
const NDC_CORNERS: [DVec3; 8] = [
    DVec3::new(1.0, 1.0, 1.0),
    DVec3::new(-1.0, 1.0, 1.0),
    DVec3::new(1.0, -1.0, 1.0),
    DVec3::new(1.0, 1.0, 0.0),
    DVec3::new(-1.0, -1.0, 1.0),
    DVec3::new(-1.0, 1.0, 0.0),
    DVec3::new(1.0, -1.0, 0.0),
    DVec3::new(-1.0, -1.0, 0.0),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewFrustum {
    pub vtx: [DVec3; 8],
    pub axes: [DVec3; 6],
    /// Inverse of the view matrix the frustum was built with
    pub view_inv: DMat4,
}

impl Default for ViewFrustum {
    fn default() -> Self {
        Self {
            vtx: [DVec3::ZERO; 8],
            axes: [DVec3::ZERO; 6],
            view_inv: DMat4::IDENTITY,
        }
    }
}

fn face_normal(a: DVec3, b: DVec3, c: DVec3) -> DVec3 {
    (b - a).cross(c - a).normalize_or_zero()
}

impl ViewFrustum {
    pub fn update(&mut self, proj: &DMat4, view: &DMat4) {
        let proj_inv = proj.inverse();
        for (dst, ndc) in self.vtx.iter_mut().zip(NDC_CORNERS) {
            let v = proj_inv * DVec4::new(ndc.x, ndc.y, ndc.z, 1.0);
            *dst = v.truncate() / v.w;
        }

        let v = &self.vtx;
        self.axes = [
            face_normal(v[0], v[2], v[3]),
            face_normal(v[1], v[4], v[5]),
            face_normal(v[0], v[1], v[3]),
            face_normal(v[2], v[4], v[6]),
            face_normal(v[0], v[1], v[2]),
            face_normal(v[3], v[5], v[6]),
        ];

        self.view_inv = view.inverse();
    }

    /// Corners transformed to world space
    pub fn world_vertices(&self) -> [DVec3; 8] {
        self.vtx.map(|v| self.view_inv.transform_point3(v))
    }

    /// Separating-axis test against a view-space point cloud (e.g. an OBB's corners)
    ///
    /// Conservative: only the frustum's own face normals are tried, so
    /// `true` may be returned for shapes that narrowly miss.
    pub fn may_overlap(&self, points: &[DVec3]) -> bool {
        if points.is_empty() {
            return false;
        }
        self.axes.iter().all(|axis| {
            let (f_min, f_max) = project(&self.vtx, *axis);
            let (p_min, p_max) = project(points, *axis);
            p_max >= f_min && p_min <= f_max
        })
    }
}

fn project(points: &[DVec3], axis: DVec3) -> (f64, f64) {
    points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        let d = p.dot(axis);
        (lo.min(d), hi.max(d))
    })
}

#[cfg(test)]
#[path = "view_frustum_tests.rs"]
mod tests;
