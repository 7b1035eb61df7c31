use glam::{DMat4, DVec3};
use crate::cosmos::{StandardCamera, Transform};
use super::*;

fn camera_frustum() -> (StandardCamera, ViewFrustum) {
    let cam = StandardCamera { near: 0.5, far: 50.0, ..StandardCamera::default() };
    let mut frustum = ViewFrustum::default();
    frustum.update(&cam.make_proj_mat(16.0 / 9.0), &DMat4::IDENTITY);
    (cam, frustum)
}

// ============================================================================
// Corners
// ============================================================================

#[test]
fn test_corners_lie_on_near_and_far_planes() {
    let (cam, frustum) = camera_frustum();
    for i in [0, 1, 2, 4] {
        assert!((frustum.vtx[i].z + cam.far).abs() < 1e-6, "vtx {} = {:?}", i, frustum.vtx[i]);
    }
    for i in [3, 5, 6, 7] {
        assert!((frustum.vtx[i].z + cam.near).abs() < 1e-9, "vtx {} = {:?}", i, frustum.vtx[i]);
    }
}

#[test]
fn test_corners_match_field_of_view() {
    let (cam, frustum) = camera_frustum();
    let half_height = cam.far * (cam.fov * 0.5).tan();
    let top = frustum.vtx[0].y.abs().max(frustum.vtx[2].y.abs());
    assert!((top - half_height).abs() < 1e-6);
    assert!((frustum.vtx[0].x.abs() - half_height * 16.0 / 9.0).abs() < 1e-6);
}

#[test]
fn test_axes_are_unit_length() {
    let (_, frustum) = camera_frustum();
    for axis in frustum.axes {
        assert!((axis.length() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_world_vertices_use_view_inverse() {
    let cam = StandardCamera::default();
    let tform = Transform::new().with_pos(DVec3::new(3.0, 0.0, 0.0));
    let mut frustum = ViewFrustum::default();
    frustum.update(&cam.make_proj_mat(1.0), &tform.make_view_mat());

    let world = frustum.world_vertices();
    let near_center = (world[3] + world[5] + world[6] + world[7]) / 4.0;
    assert!((near_center - DVec3::new(3.0, 0.0, -cam.near)).length() < 1e-6);
}

// ============================================================================
// Overlap
// ============================================================================

#[test]
fn test_overlap_inside_and_outside() {
    let (_, frustum) = camera_frustum();
    assert!(frustum.may_overlap(&[DVec3::new(0.0, 0.0, -10.0)]));
    assert!(!frustum.may_overlap(&[DVec3::new(0.0, 0.0, 10.0)]));
    assert!(!frustum.may_overlap(&[DVec3::new(1000.0, 0.0, -10.0)]));
    assert!(!frustum.may_overlap(&[DVec3::new(0.0, 0.0, -100.0)]));
    assert!(!frustum.may_overlap(&[]));
}
