use glam::{DVec3, Vec3};
use crate::cosmos::{ColorIntensity, DLight, SLight, Transform};
use crate::renderer::renderer::tests::Harness;
use super::*;

// ============================================================================
// Graph shape
// ============================================================================

#[test]
fn test_stage_nodes_and_order() {
    let h = Harness::new(1, 1);
    let stage = build_render_stage(&h.renderer, &h.cosmos).unwrap();
    let graph = &stage.graph;
    assert_eq!(graph.len(), 7);
    assert_eq!(graph.name(stage.fence), Some("render_stage_fence"));

    let order: Vec<&str> = graph
        .topological_order()
        .unwrap()
        .into_iter()
        .map(|i| graph.nodes[i].name.as_str())
        .collect();
    let pos = |name: &str| order.iter().position(|n| *n == name).unwrap();

    assert_eq!(pos("update_ren_ctxt"), 0);
    for node in ["init_static_models", "init_skinned_models", "update_dlight"] {
        assert!(pos(node) < pos("update_compo"));
    }
    assert!(pos("update_compo") < pos("render_passes"));
    assert_eq!(pos("render_stage_fence"), 6);
}

#[test]
fn test_prepare_snapshots_entities() {
    let mut h = Harness::new(1, 1);
    h.cosmos.world_mut().spawn((DLight::default(), Transform::new()));
    h.cosmos.world_mut().spawn((DLight::default(), Transform::new()));

    let mut task = UpdateDlight { renderer: &h.renderer, world: h.cosmos.world(), entities: Vec::new() };
    task.prepare();
    assert_eq!(task.entities.len(), 2);
}

// ============================================================================
// Shadow priorities
// ============================================================================

#[test]
fn test_dlight_priority_is_intensity() {
    let weak = DLight { color: ColorIntensity::new(Vec3::ONE, 1.0), ..DLight::default() };
    let strong = DLight { color: ColorIntensity::new(Vec3::ONE, 5.0), ..DLight::default() };
    assert!(dlight_priority(&strong) > dlight_priority(&weak));
}

#[test]
fn test_slight_priority_falls_with_distance() {
    let light = SLight { color: ColorIntensity::new(Vec3::ONE, 10.0), ..SLight::default() };
    let near = Transform::new().with_pos(DVec3::new(1.0, 0.0, 0.0));
    let far = Transform::new().with_pos(DVec3::new(50.0, 0.0, 0.0));
    assert!(slight_priority(&light, &near, DVec3::ZERO) > slight_priority(&light, &far, DVec3::ZERO));
    assert_eq!(slight_priority(&light, &Transform::new(), DVec3::ZERO), 10.0);
}
