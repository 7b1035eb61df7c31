use std::sync::Arc;
use glam::{DMat4, DVec3, Vec2, Vec3, Vec4};
use hecs::Entity;
use crate::config::{RendererConfig, ShadowConfig};
use crate::cosmos::{MdlActorStatic, Transform};
use crate::device::mock_device::{MockCommandList, MockDevice, MockShaderProvider};
use crate::device::{Extent2D, GraphicsDevice, ImageState};
use crate::error::Error;
use crate::frame::{CmdBufList, FrameIndex, SwapchainImageIndex};
use crate::model::{RenderActor, RenderModel, RenderUnit, VertexStatic};
use crate::render::shadow::{CascadeInfo, ShadowMapBundle};
use crate::render::{
    DlightSnapshot, DrawSheet, RenderPassBase, RpContext, RpCreateBundle, RpResources,
    SlightSnapshot, SwapchainImages,
};
use super::bloom_downsample::{downsample_img_id, level_extent, BLOOM_LEVELS};
use super::*;

struct Fixture {
    device: Arc<MockDevice>,
    dyn_device: Arc<dyn GraphicsDevice>,
    res: Arc<RpResources>,
    config: RendererConfig,
}

impl Fixture {
    fn new(dlight_slots: usize, slight_slots: usize) -> Self {
        Self::with_swapchain(dlight_slots, slight_slots, true)
    }

    fn with_swapchain(dlight_slots: usize, slight_slots: usize, swapchain: bool) -> Self {
        let device = Arc::new(MockDevice::new());
        let dyn_device: Arc<dyn GraphicsDevice> = device.clone();
        let shadow = ShadowConfig {
            dlight_slots,
            dlight_resolution: 64,
            slight_slots,
            slight_resolution: 32,
        };
        let maps = ShadowMapBundle::new(device.as_ref(), &shadow).unwrap();
        let res = RpResources::new(dyn_device.clone(), Arc::new(MockShaderProvider), Box::new(maps), 2).unwrap();
        res.gbuf.write().unwrap().init(device.as_ref(), 64, 48).unwrap();
        if swapchain {
            *res.swapchain.write().unwrap() = SwapchainImages::from_swapchain(&device.create_swapchain(80, 60));
        }
        let config = RendererConfig { shadow, ..RendererConfig::default() };
        Self { device, dyn_device, res: Arc::new(res), config }
    }

    fn bundle(&self) -> RpCreateBundle<'_> {
        RpCreateBundle { device: &self.dyn_device, resources: &self.res, config: &self.config }
    }

    fn resize(&self, passes: &mut [Box<dyn RenderPassBase>], width: u32, height: u32) {
        self.res.gbuf.write().unwrap().init(self.device.as_ref(), width, height).unwrap();
        let swapchain = self.device.create_swapchain(width, height);
        *self.res.swapchain.write().unwrap() = SwapchainImages::from_swapchain(&swapchain);
        for pass in passes.iter_mut() {
            pass.on_resize(width, height, &self.res).unwrap();
        }
    }
}

/// Run one frame of `pass` and return the recorded commands
fn run(pass: &dyn RenderPassBase, ctxt: &RpContext, res: &RpResources) -> Vec<String> {
    let Some(mut task) = pass.create_task() else {
        return Vec::new();
    };
    {
        let mut states = res.image_states.lock().unwrap();
        task.prepare(ctxt, &mut states);
    }
    task.update_task(ctxt).unwrap();
    task.record_task(ctxt, &res.cmd_pool).unwrap();

    let list = CmdBufList::new();
    task.collect_cmdbuf(&list, ctxt.f_index);
    list.as_slice(ctxt.f_index)
        .iter()
        .flat_map(|cmdbuf| {
            let guard = cmdbuf.lock().unwrap();
            guard.as_any().downcast_ref::<MockCommandList>().unwrap().commands.clone()
        })
        .collect()
}

fn count(commands: &[String], needle: &str) -> usize {
    commands.iter().filter(|c| c.as_str() == needle).count()
}

fn entities(n: usize) -> Vec<Entity> {
    let mut world = hecs::World::new();
    (0..n).map(|_| world.spawn(())).collect()
}

fn dlight(entity: Entity, slot: Option<usize>) -> DlightSnapshot {
    DlightSnapshot {
        entity,
        to_light_dir: DVec3::Y,
        color: Vec3::ONE,
        cascades: CascadeInfo::default(),
        shadow_slot: slot,
    }
}

fn slight(entity: Entity, slot: Option<usize>) -> SlightSnapshot {
    SlightSnapshot {
        entity,
        view_pos: DVec3::ZERO,
        to_light_dir: DVec3::Z,
        color: Vec3::ONE,
        inner_angle: 0.3,
        outer_angle: 0.5,
        max_distance: 10.0,
        light_mat: DMat4::IDENTITY,
        shadow_slot: slot,
    }
}

fn tri_unit(device: &MockDevice, name: &str) -> Arc<RenderUnit> {
    let v = |x: f32, y: f32| VertexStatic { pos: Vec3::new(x, y, 0.0), normal: Vec3::Z, texcoord: Vec2::ZERO };
    Arc::new(RenderUnit::from_data(device, name, &[v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0)], &[0, 1, 2]).unwrap())
}

fn sheet_of(device: &MockDevice, model: RenderModel, count: usize) -> Arc<DrawSheet> {
    let model = Arc::new(model);
    let mut world = hecs::World::new();
    for i in 0..count {
        let mut mactor = MdlActorStatic::new("tri.dmd");
        mactor.model = Some(model.clone());
        mactor.actor = Some(Arc::new(RenderActor::new(device, &format!("actor{}", i)).unwrap()));
        world.spawn((mactor, Transform::new().with_pos(DVec3::new(i as f64, 0.0, 0.0))));
    }
    Arc::new(DrawSheet::build(&world))
}

fn sheet_with_actors(device: &MockDevice, count: usize) -> Arc<DrawSheet> {
    sheet_of(device, RenderModel::new(vec![tri_unit(device, "tri")], Vec::new()), count)
}

/// Every actor has one opaque and one alpha-blended unit
fn sheet_with_glass(device: &MockDevice, count: usize) -> Arc<DrawSheet> {
    let model = RenderModel::new(vec![tri_unit(device, "tri")], vec![tri_unit(device, "glass")]);
    sheet_of(device, model, count)
}

// ============================================================================
// Pass list
// ============================================================================

#[test]
fn test_create_passes_in_submission_order() {
    let fx = Fixture::new(1, 1);
    let passes = create_passes(&fx.bundle()).unwrap();
    let names: Vec<&str> = passes.iter().map(|p| p.name()).collect();
    assert_eq!(
        names,
        vec![
            "shadow",
            "gbuf",
            "compo_dlight",
            "compo_slight",
            "transp",
            "bloom_downsample",
            "bloom_blend",
            "debug",
            "fillscreen",
        ]
    );
    for f in FrameIndex::all() {
        for level in 0..BLOOM_LEVELS {
            assert!(fx.res.ren_img.contains(&downsample_img_id(f, level)));
        }
    }
}

#[test]
fn test_resize_rebuilds_without_leaks() {
    let fx = Fixture::new(1, 1);
    let mut passes = create_passes(&fx.bundle()).unwrap();
    let fbufs = fx.device.live.framebuffers();
    let images = fx.device.live.images();

    fx.resize(&mut passes, 128, 96);
    assert_eq!(fx.device.live.framebuffers(), fbufs);
    assert_eq!(fx.device.live.images(), images);

    let gbuf = passes.iter().find(|p| p.name() == GbufPass::NAME).unwrap();
    let commands = run(gbuf.as_ref(), &RpContext::default(), &fx.res);
    assert_eq!(count(&commands, "begin_render_pass:gbuf:128x96"), 1);

    let fill = passes.iter().find(|p| p.name() == FillscreenPass::NAME).unwrap();
    let commands = run(fill.as_ref(), &RpContext::default(), &fx.res);
    assert_eq!(count(&commands, "begin_render_pass:fillscreen:128x96"), 1);
}

#[test]
fn test_dropping_passes_releases_render_images() {
    let fx = Fixture::new(1, 1);
    let passes = create_passes(&fx.bundle()).unwrap();
    assert!(!fx.res.ren_img.is_empty());
    drop(passes);
    assert!(fx.res.ren_img.is_empty());
}

// ============================================================================
// Shadow
// ============================================================================

#[test]
fn test_cascade_viewports_are_quadrants() {
    let extent = Extent2D::new(64, 64);
    let corners: Vec<(f32, f32)> = (0..4).map(|i| {
        let vp = shadow::cascade_viewport(extent, i);
        assert_eq!((vp.width, vp.height), (32.0, 32.0));
        (vp.x, vp.y)
    }).collect();
    assert_eq!(corners, vec![(0.0, 0.0), (32.0, 0.0), (0.0, 32.0), (32.0, 32.0)]);
}

#[test]
fn test_shadow_pass_renders_only_slotted_lights() {
    let fx = Fixture::new(2, 1);
    let pass = ShadowPass::new(&fx.bundle()).unwrap();
    let e = entities(3);

    let mut ctxt = RpContext::default();
    ctxt.draw_sheet = sheet_with_actors(&fx.device, 2);
    ctxt.lights.dlights = vec![dlight(e[0], Some(1)), dlight(e[1], None)];
    ctxt.lights.slights = vec![slight(e[2], Some(0))];

    let commands = run(&pass, &ctxt, &fx.res);
    assert_eq!(count(&commands, "begin_render_pass:shadow:64x64"), 1);
    assert_eq!(count(&commands, "begin_render_pass:shadow:32x32"), 1);
    assert_eq!(count(&commands, "set_viewport:32:32:32x32"), 1);
    assert_eq!(count(&commands, "set_viewport:0:0:32x32"), 2);
    // 4 cascades + 1 spot view, two casters each
    assert_eq!(count(&commands, "draw_indexed:3"), 10);
    assert_eq!(count(&commands, "push_constants:64"), 10);
    assert_eq!(count(&commands, "barrier:shadow_dlight#1_f#0:Undefined->DepthStencilAttachment"), 1);
    assert!(!commands.iter().any(|c| c.starts_with("barrier:shadow_dlight#0")));
}

#[test]
fn test_shadow_pass_without_lights_records_nothing() {
    let fx = Fixture::new(1, 1);
    let pass = ShadowPass::new(&fx.bundle()).unwrap();
    let mut ctxt = RpContext::default();
    ctxt.lights.dlights = vec![dlight(entities(1)[0], None)];
    assert!(run(&pass, &ctxt, &fx.res).is_empty());
}

// ============================================================================
// G-buffer and composition
// ============================================================================

#[test]
fn test_gbuf_pass_draws_every_actor() {
    let fx = Fixture::new(0, 0);
    let pass = GbufPass::new(&fx.bundle()).unwrap();
    let mut ctxt = RpContext::default();
    ctxt.draw_sheet = sheet_with_actors(&fx.device, 3);

    let commands = run(&pass, &ctxt, &fx.res);
    assert_eq!(count(&commands, "begin_render_pass:gbuf:64x48"), 1);
    assert_eq!(count(&commands, "bind_vertex_buffer"), 1);
    assert_eq!(count(&commands, "bind_binding_group:0"), 3);
    assert_eq!(count(&commands, "draw_indexed:3"), 3);
    assert_eq!(count(&commands, "barrier:gbuf_depth_f#0:Undefined->DepthStencilAttachment"), 1);
}

#[test]
fn test_compo_dlight_draws_once_per_slotted_light() {
    let fx = Fixture::new(2, 0);
    let pass = CompoDlightPass::new(&fx.bundle()).unwrap();
    let e = entities(3);

    let mut ctxt = RpContext::default();
    ctxt.lights.dlights = vec![dlight(e[0], Some(0)), dlight(e[1], None), dlight(e[2], Some(1))];

    let commands = run(&pass, &ctxt, &fx.res);
    assert_eq!(count(&commands, "begin_render_pass:compo_dlight:64x48"), 1);
    assert_eq!(count(&commands, "bind_binding_group:0"), 1);
    assert_eq!(count(&commands, "bind_binding_group:1"), 2);
    assert_eq!(count(&commands, "draw:3"), 2);
}

#[test]
fn test_compo_dlight_clears_without_lights() {
    let fx = Fixture::new(1, 0);
    let pass = CompoDlightPass::new(&fx.bundle()).unwrap();
    let commands = run(&pass, &RpContext::default(), &fx.res);
    assert_eq!(count(&commands, "begin_render_pass:compo_dlight:64x48"), 1);
    assert_eq!(count(&commands, "draw:3"), 0);
}

#[test]
fn test_compo_slight_pushes_each_light() {
    let fx = Fixture::new(0, 2);
    let pass = CompoSlightPass::new(&fx.bundle()).unwrap();

    assert!(run(&pass, &RpContext::default(), &fx.res).is_empty());

    let e = entities(2);
    let mut ctxt = RpContext::default();
    ctxt.lights.slights = vec![slight(e[0], Some(1)), slight(e[1], None)];
    let commands = run(&pass, &ctxt, &fx.res);
    assert_eq!(count(&commands, "push_constants:112"), 1);
    assert_eq!(count(&commands, "draw:3"), 1);
    assert_eq!(count(&commands, "barrier:shadow_slight#1_f#0:Undefined->ShaderReadOnly"), 1);
}

#[test]
fn test_slight_push_const_stores_cosines() {
    let light = slight(entities(1)[0], Some(0));
    let push = compo_slight::CompoSlightPushConst::new(&light, &DMat4::IDENTITY);
    assert!((push.pos_n_inner_angle.w - 0.3f32.cos()).abs() < 1e-6);
    assert!((push.dir_n_outer_angle.w - 0.5f32.cos()).abs() < 1e-6);
    assert_eq!(push.color_n_max_dist, Vec4::new(1.0, 1.0, 1.0, 10.0));
}

// ============================================================================
// Transparent
// ============================================================================

#[test]
fn test_transp_pass_draws_alpha_units_over_compo() {
    let fx = Fixture::new(0, 0);
    let pass = TranspPass::new(&fx.bundle()).unwrap();
    let mut ctxt = RpContext::default();
    ctxt.draw_sheet = sheet_with_glass(&fx.device, 2);
    ctxt.lights.dlights = vec![dlight(entities(1)[0], None)];

    let commands = run(&pass, &ctxt, &fx.res);
    assert_eq!(count(&commands, "begin_render_pass:transp:64x48"), 1);
    assert_eq!(count(&commands, "bind_vertex_buffer"), 1);
    assert_eq!(count(&commands, "bind_binding_group:0"), 2);
    assert_eq!(count(&commands, "draw_indexed:3"), 2);
    assert_eq!(count(&commands, "push_constants:32"), 1);
    assert_eq!(count(&commands, "barrier:gbuf_compo_f#0:Undefined->ColorAttachment"), 1);
    assert_eq!(count(&commands, "barrier:gbuf_depth_f#0:Undefined->DepthStencilAttachment"), 1);
}

#[test]
fn test_gbuf_pass_skips_alpha_units() {
    let fx = Fixture::new(0, 0);
    let pass = GbufPass::new(&fx.bundle()).unwrap();
    let mut ctxt = RpContext::default();
    ctxt.draw_sheet = sheet_with_glass(&fx.device, 2);

    let commands = run(&pass, &ctxt, &fx.res);
    assert_eq!(count(&commands, "draw_indexed:3"), 2);
    assert_eq!(ctxt.draw_sheet.get_static_trs().len(), 1);
}

#[test]
fn test_transp_pass_without_alpha_units_records_nothing() {
    let fx = Fixture::new(0, 0);
    let pass = TranspPass::new(&fx.bundle()).unwrap();
    let mut ctxt = RpContext::default();
    ctxt.draw_sheet = sheet_with_actors(&fx.device, 3);
    assert!(run(&pass, &ctxt, &fx.res).is_empty());
}

#[test]
fn test_transp_push_const_uses_first_dlight() {
    let e = entities(2);
    let mut ctxt = RpContext::default();
    assert_eq!(transp::TranspPushConst::new(&ctxt).color, Vec4::ZERO);

    let mut second = dlight(e[1], None);
    second.color = Vec3::new(0.5, 0.0, 0.0);
    ctxt.lights.dlights = vec![dlight(e[0], None), second];
    let push = transp::TranspPushConst::new(&ctxt);
    assert_eq!(push.to_light_dir, Vec4::new(0.0, 1.0, 0.0, 0.0));
    assert_eq!(push.color, Vec4::ONE);
}

// ============================================================================
// Bloom
// ============================================================================

#[test]
fn test_bloom_level_extents_halve_down_to_one() {
    let base = Extent2D::new(64, 6);
    let sizes: Vec<(u32, u32)> = (0..4).map(|l| {
        let e = level_extent(base, l);
        (e.width, e.height)
    }).collect();
    assert_eq!(sizes, vec![(32, 3), (16, 1), (8, 1), (4, 1)]);
}

#[test]
fn test_bloom_downsample_renders_every_level() {
    let fx = Fixture::new(0, 0);
    let pass = BloomDownsamplePass::new(&fx.bundle()).unwrap();
    let commands = run(&pass, &RpContext::default(), &fx.res);
    for size in ["32x24", "16x12", "8x6", "4x3"] {
        assert_eq!(count(&commands, &format!("begin_render_pass:bloom_downsample:{}", size)), 1);
    }
    assert_eq!(count(&commands, "draw:3"), BLOOM_LEVELS);
    assert_eq!(count(&commands, "barrier:gbuf_compo_f#0:Undefined->ShaderReadOnly"), 1);

    // Each level is read by the next one right after being written
    let read_back = commands
        .iter()
        .position(|c| c == "barrier:bloom_downsample:downsamples_f#0_lv#0:ColorAttachment->ShaderReadOnly")
        .unwrap();
    let second = commands.iter().position(|c| c == "begin_render_pass:bloom_downsample:16x12").unwrap();
    assert!(read_back < second);
    assert!(!commands.iter().any(|c| c.starts_with("barrier:bloom_downsample:downsamples_f#0_lv#3:ColorAttachment->")));

    drop(pass);
    for level in 0..BLOOM_LEVELS {
        assert!(!fx.res.ren_img.contains(&downsample_img_id(FrameIndex::new(0), level)));
    }
}

#[test]
fn test_bloom_blend_keeps_images_alive_as_reader() {
    let fx = Fixture::new(0, 0);
    let producer = BloomDownsamplePass::new(&fx.bundle()).unwrap();
    let blend = BloomBlendPass::new(&fx.bundle()).unwrap();
    assert!(blend.is_enabled());

    let mut ctxt = RpContext::default();
    ctxt.f_index = FrameIndex::new(1);
    run(&producer, &ctxt, &fx.res);

    drop(producer);
    let ids: Vec<String> = (0..BLOOM_LEVELS).map(|l| downsample_img_id(FrameIndex::new(1), l)).collect();
    assert!(ids.iter().all(|id| fx.res.ren_img.contains(id)));

    let commands = run(&blend, &ctxt, &fx.res);
    assert_eq!(count(&commands, "begin_render_pass:bloom_blend:64x48"), 1);
    assert_eq!(count(&commands, "push_constants:16"), 1);
    assert_eq!(count(&commands, "draw:3"), 1);
    // Only the last level is still a color attachment when blending starts
    assert_eq!(
        count(&commands, "barrier:bloom_downsample:downsamples_f#1_lv#3:ColorAttachment->ShaderReadOnly"),
        1
    );
    assert!(!commands.iter().any(|c| c.starts_with("barrier:bloom_downsample:downsamples_f#1_lv#0")));

    drop(blend);
    assert!(ids.iter().all(|id| !fx.res.ren_img.contains(id)));
}

#[test]
fn test_bloom_blend_push_const_carries_level_count() {
    let push = bloom_blend::BloomBlendPushConst::new(0.1, 0.005);
    assert_eq!(push.level_count, BLOOM_LEVELS as u32);
    assert_eq!(std::mem::size_of_val(&push), 16);
}

#[test]
fn test_bloom_blend_without_producer_is_disabled() {
    let fx = Fixture::new(0, 0);
    let blend = BloomBlendPass::new(&fx.bundle()).unwrap();
    assert!(!blend.is_enabled());
    assert!(blend.create_task().is_none());
    assert!(fx.res.ren_img.is_empty());
}

// ============================================================================
// Debug and fillscreen
// ============================================================================

#[test]
fn test_debug_vertices_include_world_triangles() {
    let ctxt = RpContext::default();
    ctxt.debug_render.add_tri(Vec4::ZERO, Vec4::X, Vec4::Y);
    ctxt.debug_render.tri(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO, Vec3::ONE, Vec4::ONE);

    let vertices = debug::build_vertices(&ctxt);
    assert_eq!(vertices.len(), 6);
    assert_eq!(vertices[3].pos, Vec4::new(1.0, 2.0, 3.0, 1.0));
    assert_eq!(vertices[3].color, Vec4::ONE);
}

#[test]
fn test_debug_pass_streams_triangles() {
    let fx = Fixture::new(0, 0);
    let pass = DebugPass::new(&fx.bundle()).unwrap();
    assert!(run(&pass, &RpContext::default(), &fx.res).is_empty());

    let ctxt = RpContext::default();
    for _ in 0..3 {
        ctxt.debug_render.add_tri(Vec4::ZERO, Vec4::X, Vec4::Y);
    }
    let commands = run(&pass, &ctxt, &fx.res);
    assert_eq!(count(&commands, "begin_render_pass:debug:tri:64x48"), 1);
    assert_eq!(count(&commands, "bind_vertex_buffer"), 1);
    assert_eq!(count(&commands, "draw:9"), 1);
}

#[test]
fn test_fillscreen_targets_acquired_image() {
    let fx = Fixture::new(0, 0);
    let pass = FillscreenPass::new(&fx.bundle()).unwrap();
    let mut ctxt = RpContext::default();
    ctxt.i_index = SwapchainImageIndex::new(2);

    let commands = run(&pass, &ctxt, &fx.res);
    assert_eq!(count(&commands, "barrier:swapchain#2:Undefined->ColorAttachment"), 1);
    assert_eq!(count(&commands, "begin_render_pass:fillscreen:80x60"), 1);
    assert_eq!(count(&commands, "push_constants:16"), 1);

    let image = fx.res.swapchain().unwrap().images[2].clone();
    assert_eq!(fx.res.image_states.lock().unwrap().state(&image), ImageState::PRESENT);
}

#[test]
fn test_fillscreen_requires_swapchain_format() {
    let fx = Fixture::with_swapchain(0, 0, false);
    assert!(matches!(FillscreenPass::new(&fx.bundle()), Err(Error::InitializationFailed(_))));
}
