use glam::{DMat4, DQuat, DVec3, DVec4};
use crate::cosmos::{DLight, StandardCamera, Transform};
use super::*;

const EPS: f64 = 1e-6;

fn camera() -> StandardCamera {
    StandardCamera {
        fov: 70f64.to_radians(),
        near: 0.1,
        far: 500.0,
        ..Default::default()
    }
}

// ============================================================================
// make_plane_distances
// ============================================================================

#[test]
fn test_plane_distances_values() {
    let d = CascadeInfo::make_plane_distances(1.0, 101.0);
    assert_eq!(d, [1.0, 6.0, 21.0, 51.0, 101.0]);
}

#[test]
fn test_plane_distances_monotonic_and_covering() {
    for &(n, f) in &[(0.1, 1000.0), (0.5, 20.0), (10.0, 10.5)] {
        let d = CascadeInfo::make_plane_distances(n, f);
        assert_eq!(d[0], n);
        assert_eq!(d[CASCADE_COUNT], f);
        for pair in d.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}

#[test]
fn test_update_cascades_are_contiguous() {
    let cam = camera();
    let mut info = CascadeInfo::default();
    info.update(16.0 / 9.0, &DMat4::IDENTITY, &cam, &Transform::default());

    assert_eq!(info.cascades[0].near, cam.near);
    assert_eq!(info.cascades[CASCADE_COUNT - 1].far, cam.far);
    for i in 1..CASCADE_COUNT {
        assert_eq!(info.cascades[i].near, info.cascades[i - 1].far);
        assert!(info.cascades[i].far > info.cascades[i].near);
    }
}

#[test]
fn test_update_reaches_camera_far_plane() {
    for far in [50.0, 1000.0, 5000.0] {
        let cam = StandardCamera { far, ..camera() };
        let mut info = CascadeInfo::default();
        info.update(1.0, &DMat4::IDENTITY, &cam, &Transform::default());
        assert_eq!(info.cascades[CASCADE_COUNT - 1].far, far);
        assert!((info.far_depths[CASCADE_COUNT - 1] - 1.0).abs() < EPS);
        for cascade in &info.cascades {
            assert!(cascade.light_mat.is_finite());
        }
    }
}

// ============================================================================
// calc_clip_depth
// ============================================================================

#[test]
fn test_clip_depth_matches_projection() {
    let cam = camera();
    let proj = DMat4::perspective_rh(cam.fov, 1.5, cam.near, cam.far);
    for &z in &[-0.1, -1.0, -37.5, -250.0, -500.0] {
        let clip = proj * DVec4::new(0.0, 0.0, z, 1.0);
        let expected = clip.z / clip.w;
        let got = CascadeInfo::calc_clip_depth(z, cam.near, cam.far);
        assert!((expected - got).abs() < EPS, "z = {}: {} vs {}", z, expected, got);
    }
}

#[test]
fn test_clip_depth_endpoints() {
    assert!(CascadeInfo::calc_clip_depth(-0.1, 0.1, 100.0).abs() < EPS);
    assert!((CascadeInfo::calc_clip_depth(-100.0, 0.1, 100.0) - 1.0).abs() < EPS);
}

// ============================================================================
// make_frustum_vertices
// ============================================================================

#[test]
fn test_frustum_vertices_view_space_order() {
    let mut out = [DVec3::ZERO; 4];
    let fov = 90f64.to_radians();
    CascadeInfo::make_frustum_vertices(2.0, 1.0, fov, &DMat4::IDENTITY, &mut out);

    // tan(45°) = 1, so half height 1 and half width 2 at distance 1
    assert!((out[0] - DVec3::new(-2.0, -1.0, -1.0)).length() < EPS);
    assert!((out[1] - DVec3::new(2.0, -1.0, -1.0)).length() < EPS);
    assert!((out[2] - DVec3::new(-2.0, 1.0, -1.0)).length() < EPS);
    assert!((out[3] - DVec3::new(2.0, 1.0, -1.0)).length() < EPS);
}

#[test]
fn test_frustum_vertices_follow_view_inverse() {
    let tform = Transform::default().with_pos(DVec3::new(10.0, 0.0, 0.0));
    let view_inv = tform.make_view_mat().inverse();
    let mut out = [DVec3::ZERO; 4];
    CascadeInfo::make_frustum_vertices(1.0, 5.0, 60f64.to_radians(), &view_inv, &mut out);

    for v in out {
        assert!((v.z + 5.0).abs() < EPS);
        assert!((v.x - 10.0).abs() < 5.0);
    }
}

// ============================================================================
// Light matrix fitting
// ============================================================================

fn assert_corners_in_clip(info: &CascadeInfo) {
    for cascade in &info.cascades {
        for v in &cascade.frustum_verts {
            let clip = cascade.light_mat * v.extend(1.0);
            let ndc = clip.truncate() / clip.w;
            assert!(ndc.x.abs() <= 1.0 + EPS, "x out of range: {}", ndc.x);
            assert!(ndc.y.abs() <= 1.0 + EPS, "y out of range: {}", ndc.y);
            assert!(ndc.z >= 0.5 - EPS && ndc.z <= 1.0 + EPS, "z out of range: {}", ndc.z);
        }
    }
}

#[test]
fn test_light_mat_contains_corners_over_camera_sweep() {
    let cam = camera();
    let light_dirs = [
        DVec3::new(0.0, -1.0, 0.0),
        DVec3::new(1.0, -1.0, 0.3),
        DVec3::new(-0.2, -0.5, -1.0),
    ];

    for yaw_step in 0..8 {
        for pitch_step in -2..=2 {
            let yaw = yaw_step as f64 * std::f64::consts::FRAC_PI_4;
            let pitch = pitch_step as f64 * 0.3;
            let cam_tform = Transform {
                pos: DVec3::new(yaw_step as f64 * 7.0, 3.0, -(pitch_step as f64) * 11.0),
                rot: DQuat::from_rotation_y(yaw) * DQuat::from_rotation_x(pitch),
                scale: DVec3::ONE,
            };
            let view_inv = cam_tform.make_view_mat().inverse();

            for dir in light_dirs {
                let mut light_tform = Transform::default().with_pos(cam_tform.pos);
                DLight::set_light_dir(dir, &mut light_tform);

                let mut info = CascadeInfo::default();
                info.update(16.0 / 9.0, &view_inv, &cam, &light_tform);
                assert_corners_in_clip(&info);
            }
        }
    }
}

#[test]
fn test_light_mat_depth_range_hits_both_ends() {
    let points = [
        DVec3::new(-1.0, -1.0, -1.0),
        DVec3::new(1.0, -1.0, -1.0),
        DVec3::new(-1.0, 1.0, -1.0),
        DVec3::new(1.0, 1.0, -1.0),
        DVec3::new(-1.0, -1.0, -9.0),
        DVec3::new(1.0, -1.0, -9.0),
        DVec3::new(-1.0, 1.0, -9.0),
        DVec3::new(1.0, 1.0, -9.0),
    ];
    let mat = DLight::make_light_mat(&points, &Transform::default());

    let near = mat * points[0].extend(1.0);
    let far = mat * points[4].extend(1.0);
    // z_max (closest to the light) maps to 0.5, z_min to 1
    assert!((near.z - 0.5).abs() < EPS);
    assert!((far.z - 1.0).abs() < EPS);
}

#[test]
fn test_light_mat_flips_y() {
    let mut points = [DVec3::ZERO; 8];
    for (i, p) in points.iter_mut().enumerate() {
        let x = if i % 2 == 0 { -1.0 } else { 1.0 };
        let y = if (i / 2) % 2 == 0 { -1.0 } else { 1.0 };
        let z = if i < 4 { -1.0 } else { -2.0 };
        *p = DVec3::new(x, y, z);
    }
    let mat = DLight::make_light_mat(&points, &Transform::default());
    let top = mat * DVec4::new(0.0, 1.0, -1.5, 1.0);
    assert!((top.y + 1.0).abs() < EPS);
}
