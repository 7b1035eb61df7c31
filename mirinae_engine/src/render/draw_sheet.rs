/// DrawSheet - the frame's draw list, grouped by render unit
///
/// Rebuilt from the registry at the start of every frame and shared with
/// the record tasks through an `Arc`.

use std::sync::Arc;
use glam::DMat4;
use hecs::World;
use crate::cosmos::{MdlActor, MdlActorSkinned, MdlActorStatic, ModelKindTag, Transform};
use crate::model::{RenderActor, RenderUnit};

#[derive(Clone)]
pub struct DrawActor {
    pub actor: Arc<RenderActor>,
    pub model_mat: DMat4,
}

/// One render unit and every actor drawing it
#[derive(Clone)]
pub struct DrawItem {
    pub unit: Arc<RenderUnit>,
    pub actors: Vec<DrawActor>,
}

#[derive(Clone, Default)]
pub struct DrawSheet {
    static_: Vec<DrawItem>,
    static_trs: Vec<DrawItem>,
    skinned: Vec<DrawItem>,
    skinned_trs: Vec<DrawItem>,
}

impl DrawSheet {
    /// Collect every actor whose model and render actor are ready
    ///
    /// Hidden units are left out. Alpha unit `i` of a model uses visibility
    /// index `units.len() + i`.
    pub fn build(world: &World) -> Self {
        let mut sheet = Self::default();
        collect(
            world.query::<(&MdlActorStatic, &Transform)>().iter().map(|(_, c)| c),
            &mut sheet.static_,
            &mut sheet.static_trs,
        );
        collect(
            world.query::<(&MdlActorSkinned, &Transform)>().iter().map(|(_, c)| c),
            &mut sheet.skinned,
            &mut sheet.skinned_trs,
        );
        sheet
    }

    pub fn get_static(&self) -> &[DrawItem] {
        &self.static_
    }

    /// Static units drawn with alpha blending
    pub fn get_static_trs(&self) -> &[DrawItem] {
        &self.static_trs
    }

    pub fn get_skinned(&self) -> &[DrawItem] {
        &self.skinned
    }

    pub fn get_skinned_trs(&self) -> &[DrawItem] {
        &self.skinned_trs
    }

    pub fn is_empty(&self) -> bool {
        self.static_.is_empty()
            && self.static_trs.is_empty()
            && self.skinned.is_empty()
            && self.skinned_trs.is_empty()
    }
}

fn collect<'w, K: ModelKindTag>(
    actors: impl Iterator<Item = (&'w MdlActor<K>, &'w Transform)>,
    opaque: &mut Vec<DrawItem>,
    transparent: &mut Vec<DrawItem>,
) {
    for (mactor, tform) in actors {
        let (Some(model), Some(actor)) = (&mactor.model, &mactor.actor) else {
            continue;
        };
        let model_mat = tform.make_model_mat();

        for (i, unit) in model.units.iter().enumerate() {
            if mactor.visibility.get(i) {
                add(opaque, unit, actor, model_mat);
            }
        }
        let offset = model.units.len();
        for (i, unit) in model.alpha_units.iter().enumerate() {
            if mactor.visibility.get(offset + i) {
                add(transparent, unit, actor, model_mat);
            }
        }
    }
}

fn add(list: &mut Vec<DrawItem>, unit: &Arc<RenderUnit>, actor: &Arc<RenderActor>, model_mat: DMat4) {
    let draw_actor = DrawActor { actor: actor.clone(), model_mat };
    match list.iter_mut().find(|item| Arc::ptr_eq(&item.unit, unit)) {
        Some(item) => item.actors.push(draw_actor),
        None => list.push(DrawItem { unit: unit.clone(), actors: vec![draw_actor] }),
    }
}
