/// Model actor components (static and skinned)
///
/// An entity names a model by path; the renderer resolves the path through
/// the model manager and fills in `model` and `actor` once loading finished.

use std::marker::PhantomData;
use std::sync::Arc;
use crate::model::{ModelKind, RenderActor, RenderModel};

/// Per render-unit visibility; units are visible unless hidden
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityArray {
    hidden: Vec<bool>,
}

impl VisibilityArray {
    const MAX_SIZE: usize = 128;

    pub fn get(&self, index: usize) -> bool {
        !self.hidden.get(index).copied().unwrap_or(false)
    }

    /// Indices at or above 128 cannot be hidden
    pub fn set(&mut self, index: usize, visible: bool) {
        if index >= Self::MAX_SIZE {
            return;
        }
        if index >= self.hidden.len() {
            if visible {
                return;
            }
            self.hidden.resize(index + 1, false);
        }
        self.hidden[index] = !visible;
    }
}

/// Type-level tag selecting static or skinned handling
pub trait ModelKindTag: Send + Sync + 'static {
    const KIND: ModelKind;
}

pub struct StaticTag;

pub struct SkinnedTag;

impl ModelKindTag for StaticTag {
    const KIND: ModelKind = ModelKind::Static;
}

impl ModelKindTag for SkinnedTag {
    const KIND: ModelKind = ModelKind::Skinned;
}

/// Model actor component; see `MdlActorStatic` and `MdlActorSkinned`
pub struct MdlActor<K: ModelKindTag> {
    pub model_path: String,
    pub visibility: VisibilityArray,
    /// Managed by the renderer
    pub model: Option<Arc<RenderModel>>,
    /// Managed by the renderer
    pub actor: Option<Arc<RenderActor>>,
    _kind: PhantomData<K>,
}

impl<K: ModelKindTag> MdlActor<K> {
    pub fn new(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            visibility: VisibilityArray::default(),
            model: None,
            actor: None,
            _kind: PhantomData,
        }
    }

    pub fn kind(&self) -> ModelKind {
        K::KIND
    }
}

impl<K: ModelKindTag> Clone for MdlActor<K> {
    fn clone(&self) -> Self {
        Self {
            model_path: self.model_path.clone(),
            visibility: self.visibility.clone(),
            model: self.model.clone(),
            actor: self.actor.clone(),
            _kind: PhantomData,
        }
    }
}

/// Entity rendered with a static model
pub type MdlActorStatic = MdlActor<StaticTag>;

/// Entity rendered with a skinned model
pub type MdlActorSkinned = MdlActor<SkinnedTag>;
