/// RenderStage - the task graph of one frame
///
/// ```text
/// update_ren_ctxt -+-> init_static_models --+
///                  +-> init_skinned_models -+-> update_compo -> render_passes -> fence
///                  +-> update_dlight -------+
/// ```
///
/// Bodies never fail the graph. Missing components and models still loading
/// are logged and skipped; the frame is aborted only through `dont_render`.

use std::marker::PhantomData;
use std::sync::Arc;
use glam::DVec3;
use hecs::{Entity, World};
use crate::cosmos::{
    Cosmos, DLight, MdlActor, ModelKindTag, SLight, SkinnedTag, StandardCamera, StaticTag,
    Transform,
};
use crate::error::{Error, Result};
use crate::frame::is_fbuf_too_small;
use crate::model::{GbufActorUniform, ReqResult, RenderActor};
use crate::render::shadow::{select_shadow_casters, ShadowCandidate, ShadowKind};
use crate::render::{DlightSnapshot, DrawSheet, LightSnapshot, RpContext, SlightSnapshot};
use crate::renderer::Renderer;
use crate::task::{Task, TaskGraph, TaskHandle};

/// A frame graph ready to be handed to the scheduler
pub struct RenderStage<'a> {
    pub graph: TaskGraph<'a>,
    /// Join this to wait for the whole frame
    pub fence: TaskHandle,
}

/// Build the graph of one frame of `renderer` over `cosmos`
pub fn build_render_stage<'a>(renderer: &'a Renderer, cosmos: &'a Cosmos) -> Result<RenderStage<'a>> {
    let world = cosmos.world();
    let mut graph = TaskGraph::new();

    let update_ctxt = graph.add_task("update_ren_ctxt", Box::new(UpdateRenCtxt { renderer, cosmos }));
    let init_static = graph.add_task(
        "init_static_models",
        Box::new(InitModels::<StaticTag>::new(renderer, world)),
    );
    let init_skinned = graph.add_task(
        "init_skinned_models",
        Box::new(InitModels::<SkinnedTag>::new(renderer, world)),
    );
    let update_dlight = graph.add_task(
        "update_dlight",
        Box::new(UpdateDlight { renderer, world, entities: Vec::new() }),
    );
    let update_compo = graph.add_task(
        "update_compo",
        Box::new(UpdateCompo { renderer, world, dlights: Vec::new(), slights: Vec::new() }),
    );
    let render_passes = graph.add_fn("render_passes", move || renderer.render_passes());
    let fence = graph.add_fence("render_stage_fence");

    graph.succeed(init_static, update_ctxt)?;
    graph.succeed(init_skinned, update_ctxt)?;
    graph.succeed(update_dlight, update_ctxt)?;
    graph.succeed_all(update_compo, &[init_static, init_skinned, update_dlight])?;
    graph.succeed(render_passes, update_compo)?;
    graph.succeed(fence, render_passes)?;

    Ok(RenderStage { graph, fence })
}

fn find_camera(cosmos: &Cosmos) -> Option<(StandardCamera, Transform)> {
    let entity = cosmos.main_camera()?;
    let world = cosmos.world();
    let camera = *world.get::<&StandardCamera>(entity).ok()?;
    let tform = *world.get::<&Transform>(entity).ok()?;
    Some((camera, tform))
}

// ============================================================================
// update_ren_ctxt
// ============================================================================

struct UpdateRenCtxt<'a> {
    renderer: &'a Renderer,
    cosmos: &'a Cosmos,
}

impl UpdateRenCtxt<'_> {
    fn run(&self) -> Result<()> {
        let r = self.renderer;
        let flags = &r.flags;

        if flags.need_resize() {
            flags.set_dont_render(true);
            return Ok(());
        }

        let mut swapchain = r.swapchain.lock().map_err(|_| Error::BackendError("swapchain lock poisoned".to_string()))?;
        if is_fbuf_too_small(swapchain.width(), swapchain.height()) {
            flags.set_need_resize(true);
            flags.set_dont_render(true);
            return Ok(());
        }

        // Checked before touching the fence so a reset fence always gets submitted
        let Some((camera, cam_tform)) = find_camera(self.cosmos) else {
            crate::engine_warn!("mirinae::RenderStage", "No main camera with a transform, frame skipped");
            flags.set_dont_render(true);
            return Ok(());
        };

        let fence = r.sync.cur_in_flight_fence();
        fence.wait()?;
        let i_index = match swapchain.acquire_next_image(r.sync.cur_img_available().as_ref()) {
            Ok(index) => index,
            Err(e) => {
                crate::engine_debug!("mirinae::RenderStage", "Image acquisition failed ({}), resizing", e);
                flags.set_need_resize(true);
                flags.set_dont_render(true);
                return Ok(());
            }
        };
        fence.reset()?;
        flags.set_need_resize(false);
        flags.set_dont_render(false);

        let ratio = swapchain.width() as f64 / swapchain.height() as f64;
        drop(swapchain);

        let mut ctxt = r.ctxt_mut()?;
        ctxt.f_index = r.sync.frame_index();
        ctxt.i_index = i_index;
        ctxt.dt = self.cosmos.dt();
        ctxt.set_camera(&camera, cam_tform.make_view_mat(), ratio);
        ctxt.draw_sheet = Arc::new(DrawSheet::build(self.cosmos.world()));
        ctxt.lights.clear();
        Ok(())
    }
}

impl Task for UpdateRenCtxt<'_> {
    fn execute(&self) {
        if let Err(e) = self.run() {
            crate::engine_error!("mirinae::RenderStage", "update_ren_ctxt failed: {}", e);
            self.renderer.flags.set_dont_render(true);
        }
    }
}

// ============================================================================
// init_static_models / init_skinned_models
// ============================================================================

struct InitModels<'a, K: ModelKindTag> {
    renderer: &'a Renderer,
    world: &'a World,
    entities: Vec<Entity>,
    _kind: PhantomData<K>,
}

impl<'a, K: ModelKindTag> InitModels<'a, K> {
    fn new(renderer: &'a Renderer, world: &'a World) -> Self {
        Self { renderer, world, entities: Vec::new(), _kind: PhantomData }
    }

    fn update_actor(&self, ctxt: &RpContext, entity: Entity, mactor: &mut MdlActor<K>, tform: &Transform) -> Result<()> {
        let r = self.renderer;

        if mactor.model.is_none() {
            match r.models.request(K::KIND, &mactor.model_path) {
                ReqResult::Loading => return Ok(()),
                ReqResult::Error => {
                    let fallback = &r.config.fallback_model_path;
                    if mactor.model_path != *fallback {
                        crate::engine_warn!(
                            "mirinae::RenderStage",
                            "Failed to load model '{}', using '{}'",
                            mactor.model_path,
                            fallback
                        );
                        mactor.model_path = fallback.clone();
                    }
                    return Ok(());
                }
                ReqResult::Ready => {
                    mactor.model = r.models.get(K::KIND, &mactor.model_path);
                    if mactor.model.is_none() {
                        crate::engine_warn!("mirinae::RenderStage", "Model '{}' ready but missing", mactor.model_path);
                        return Ok(());
                    }
                }
            }
        }

        let actor = match &mactor.actor {
            Some(actor) => actor.clone(),
            None => {
                let actor = Arc::new(RenderActor::new(r.device.as_ref(), &format!("actor_{}", entity.id()))?);
                mactor.actor = Some(actor.clone());
                actor
            }
        };
        actor.update_ubuf(
            ctxt.f_index,
            &GbufActorUniform::new(&tform.make_model_mat(), &ctxt.view_mat, &ctxt.proj_mat),
        )
    }
}

impl<K: ModelKindTag> Task for InitModels<'_, K> {
    fn prepare(&mut self) {
        self.entities = self.world.query::<&MdlActor<K>>().iter().map(|(e, _)| e).collect();
    }

    fn execute(&self) {
        let r = self.renderer;
        if r.flags.dont_render() {
            return;
        }
        let Ok(ctxt) = r.ctxt() else {
            return;
        };

        for &entity in &self.entities {
            let Ok(mut query) = self.world.query_one::<(&mut MdlActor<K>, &Transform)>(entity) else {
                crate::engine_debug!("mirinae::RenderStage", "Entity {:?} despawned", entity);
                continue;
            };
            let Some((mactor, tform)) = query.get() else {
                crate::engine_debug!("mirinae::RenderStage", "Model actor {:?} has no transform", entity);
                continue;
            };
            if let Err(e) = self.update_actor(&ctxt, entity, mactor, tform) {
                crate::engine_error!("mirinae::RenderStage", "Failed to update model actor {:?}: {}", entity, e);
            }
        }
    }
}

// ============================================================================
// update_dlight
// ============================================================================

struct UpdateDlight<'a> {
    renderer: &'a Renderer,
    world: &'a World,
    entities: Vec<Entity>,
}

impl Task for UpdateDlight<'_> {
    fn prepare(&mut self) {
        self.entities = self.world.query::<&DLight>().iter().map(|(e, _)| e).collect();
    }

    fn execute(&self) {
        let r = self.renderer;
        if r.flags.dont_render() {
            return;
        }
        let Ok(ctxt) = r.ctxt() else {
            return;
        };

        for &entity in &self.entities {
            // Transform is shared with the model nodes running alongside
            let Ok(mut query) = self.world.query_one::<(&mut DLight, &Transform)>(entity) else {
                continue;
            };
            let Some((dlight, tform)) = query.get() else {
                crate::engine_debug!("mirinae::RenderStage", "Directional light {:?} has no transform", entity);
                continue;
            };
            let follow = Transform { pos: ctxt.view_pos, ..*tform };
            dlight.cascades.update(ctxt.ratio, &ctxt.view_inv, &ctxt.camera, &follow);
        }
    }
}

// ============================================================================
// update_compo
// ============================================================================

/// Shadow priority of a directional light
fn dlight_priority(light: &DLight) -> f64 {
    light.color.intensity as f64
}

/// Shadow priority of a spot light seen from `view_pos`
fn slight_priority(light: &SLight, tform: &Transform, view_pos: DVec3) -> f64 {
    light.color.intensity as f64 / (1.0 + tform.pos.distance_squared(view_pos))
}

struct UpdateCompo<'a> {
    renderer: &'a Renderer,
    world: &'a World,
    dlights: Vec<Entity>,
    slights: Vec<Entity>,
}

impl UpdateCompo<'_> {
    fn run(&self) -> Result<()> {
        let r = self.renderer;
        let mut ctxt = r.ctxt_mut()?;
        let view = ctxt.view_mat;
        let view_pos = ctxt.view_pos;

        let mut dlights = Vec::with_capacity(self.dlights.len());
        for &entity in &self.dlights {
            let Ok(mut query) = self.world.query_one::<(&DLight, &mut Transform)>(entity) else {
                continue;
            };
            if let Some((light, tform)) = query.get() {
                // Directional lights follow the camera
                tform.pos = view_pos;
                dlights.push((entity, light.clone(), *tform));
            }
        }
        let mut slights = Vec::with_capacity(self.slights.len());
        for &entity in &self.slights {
            let Ok(mut query) = self.world.query_one::<(&SLight, &Transform)>(entity) else {
                continue;
            };
            if let Some((light, tform)) = query.get() {
                slights.push((entity, *light, *tform));
            }
        }

        let mut maps = r.res.shadow_maps_mut()?;

        let candidates = dlights
            .iter()
            .map(|(entity, light, _)| ShadowCandidate { entity: *entity, priority: dlight_priority(light) })
            .collect::<Vec<_>>();
        if candidates.len() > maps.dlight_count() {
            crate::engine_debug!(
                "mirinae::RenderStage",
                "{} directional lights for {} shadow slots",
                candidates.len(),
                maps.dlight_count()
            );
        }
        let selected = select_shadow_casters(candidates, maps.dlight_count());
        maps.assign(ShadowKind::Directional, &selected);

        let candidates = slights
            .iter()
            .map(|(entity, light, tform)| ShadowCandidate {
                entity: *entity,
                priority: slight_priority(light, tform, view_pos),
            })
            .collect::<Vec<_>>();
        if candidates.len() > maps.slight_count() {
            crate::engine_debug!(
                "mirinae::RenderStage",
                "{} spot lights for {} shadow slots",
                candidates.len(),
                maps.slight_count()
            );
        }
        let selected = select_shadow_casters(candidates, maps.slight_count());
        maps.assign(ShadowKind::Spot, &selected);

        let lights = LightSnapshot {
            dlights: dlights
                .into_iter()
                .map(|(entity, light, tform)| DlightSnapshot {
                    entity,
                    to_light_dir: light.calc_to_light_dir(&view, &tform),
                    color: light.color.scaled_color(),
                    shadow_slot: maps.slot_of(ShadowKind::Directional, entity),
                    cascades: light.cascades,
                })
                .collect(),
            slights: slights
                .into_iter()
                .map(|(entity, light, tform)| SlightSnapshot {
                    entity,
                    view_pos: light.calc_view_space_pos(&view, &tform),
                    to_light_dir: light.calc_to_light_dir(&view, &tform),
                    color: light.color.scaled_color(),
                    inner_angle: light.inner_angle,
                    outer_angle: light.outer_angle,
                    max_distance: light.max_distance,
                    light_mat: light.make_light_mat(&tform),
                    shadow_slot: maps.slot_of(ShadowKind::Spot, entity),
                })
                .collect(),
        };
        ctxt.lights = lights;
        Ok(())
    }
}

impl Task for UpdateCompo<'_> {
    fn prepare(&mut self) {
        self.dlights = self.world.query::<&DLight>().iter().map(|(e, _)| e).collect();
        self.slights = self.world.query::<&SLight>().iter().map(|(e, _)| e).collect();
    }

    fn execute(&self) {
        if self.renderer.flags.dont_render() {
            return;
        }
        if let Err(e) = self.run() {
            crate::engine_error!("mirinae::RenderStage", "update_compo failed: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "render_stage_tests.rs"]
mod tests;
