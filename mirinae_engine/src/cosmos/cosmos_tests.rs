use glam::{DMat4, DVec3, DVec4, Vec3};
use super::*;

const EPS: f64 = 1e-9;

// ============================================================================
// Transform
// ============================================================================

#[test]
fn test_view_mat_is_inverse_of_unscaled_model_mat() {
    let mut tform = Transform::default().with_pos(DVec3::new(3.0, -2.0, 7.0));
    tform.rotate(0.7, DVec3::new(0.3, 1.0, -0.2));

    let product = tform.make_view_mat() * tform.make_model_mat();
    assert!(product.abs_diff_eq(DMat4::IDENTITY, 1e-9));
}

#[test]
fn test_model_mat_applies_scale_before_rotation() {
    let mut tform = Transform::default().with_scale(DVec3::new(2.0, 1.0, 1.0));
    tform.rotate(std::f64::consts::FRAC_PI_2, DVec3::Z);

    let p = tform.make_model_mat().transform_point3(DVec3::X);
    assert!((p - DVec3::new(0.0, 2.0, 0.0)).length() < EPS);
}

#[test]
fn test_rotate_ignores_zero_axis() {
    let mut tform = Transform::default();
    tform.rotate(1.0, DVec3::ZERO);
    assert_eq!(tform.rot, glam::DQuat::IDENTITY);
}

// ============================================================================
// StandardCamera
// ============================================================================

#[test]
fn test_camera_defaults() {
    let cam = StandardCamera::default();
    assert!((cam.fov - 80f64.to_radians()).abs() < EPS);
    assert_eq!(cam.near, 0.1);
    assert_eq!(cam.far, 1000.0);
    assert_eq!(cam.exposure, 1.0);
}

#[test]
fn test_camera_proj_flips_y_and_uses_zero_to_one_depth() {
    let cam = StandardCamera::default();
    let proj = cam.make_proj_mat(1.0);

    let up = proj * DVec4::new(0.0, 1.0, -1.0, 1.0);
    assert!(up.y / up.w < 0.0);

    let near = proj * DVec4::new(0.0, 0.0, -cam.near, 1.0);
    let far = proj * DVec4::new(0.0, 0.0, -cam.far, 1.0);
    assert!((near.z / near.w).abs() < 1e-6);
    assert!((far.z / far.w - 1.0).abs() < 1e-6);
}

// ============================================================================
// Lights
// ============================================================================

#[test]
fn test_normalize_color_moves_magnitude_to_intensity() {
    let mut ci = ColorIntensity::default();
    ci.set_scaled_color(Vec3::new(4.0, 2.0, 1.0));
    assert_eq!(ci.color, Vec3::new(1.0, 0.5, 0.25));
    assert_eq!(ci.intensity, 4.0);
    assert_eq!(ci.scaled_color(), Vec3::new(4.0, 2.0, 1.0));
}

#[test]
fn test_normalize_black_color_zeroes_intensity() {
    let mut ci = ColorIntensity::new(Vec3::splat(0.00001), 5.0);
    ci.normalize_color();
    assert_eq!(ci.color, Vec3::ZERO);
    assert_eq!(ci.intensity, 0.0);
}

#[test]
fn test_set_light_dir_points_forward_along_dir() {
    let dir = DVec3::new(1.0, -2.0, 0.5).normalize();
    let mut tform = Transform::default();
    DLight::set_light_dir(dir, &mut tform);

    let forward = tform.rot * DVec3::NEG_Z;
    assert!((forward - dir).length() < 1e-9);

    // Towards the light is the opposite of the ray direction
    let to_light = DLight::default().calc_to_light_dir(&DMat4::IDENTITY, &tform);
    assert!((to_light + dir).length() < 1e-9);
}

#[test]
fn test_set_light_dir_handles_opposite_direction() {
    let mut tform = Transform::default();
    DLight::set_light_dir(DVec3::Z, &mut tform);
    let forward = tform.rot * DVec3::NEG_Z;
    assert!((forward - DVec3::Z).length() < 1e-9);
}

#[test]
fn test_slight_light_mat_is_proj_times_view() {
    let light = SLight::default();
    let tform = Transform::default().with_pos(DVec3::new(0.0, 5.0, 0.0));
    let expected = light.make_proj_mat() * tform.make_view_mat();
    assert!(light.make_light_mat(&tform).abs_diff_eq(expected, EPS));

    let view_pos = light.calc_view_space_pos(&DMat4::IDENTITY, &tform);
    assert_eq!(view_pos, DVec3::new(0.0, 5.0, 0.0));
}

// ============================================================================
// Model actors
// ============================================================================

#[test]
fn test_visibility_defaults_to_visible() {
    let mut vis = VisibilityArray::default();
    assert!(vis.get(0));
    assert!(vis.get(500));

    vis.set(3, false);
    assert!(!vis.get(3));
    assert!(vis.get(2));

    vis.set(3, true);
    assert!(vis.get(3));
}

#[test]
fn test_visibility_ignores_indices_past_capacity() {
    let mut vis = VisibilityArray::default();
    vis.set(128, false);
    assert!(vis.get(128));
}

#[test]
fn test_actor_kinds() {
    assert_eq!(MdlActorStatic::new("a").kind(), crate::model::ModelKind::Static);
    assert_eq!(MdlActorSkinned::new("b").kind(), crate::model::ModelKind::Skinned);
}

// ============================================================================
// Cosmos
// ============================================================================

#[test]
fn test_spawn_camera_sets_main_camera() {
    let mut cosmos = Cosmos::new();
    assert!(cosmos.main_camera().is_none());

    let e = cosmos.spawn_camera(StandardCamera::default(), Transform::default());
    assert_eq!(cosmos.main_camera(), Some(e));
    assert!(cosmos.world().get::<&StandardCamera>(e).is_ok());
}

#[test]
fn test_dt_roundtrip() {
    let mut cosmos = Cosmos::default();
    cosmos.set_dt(0.016);
    assert_eq!(cosmos.dt(), 0.016);
}
