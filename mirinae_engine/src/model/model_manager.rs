/// Model manager - polled, never blocked on

use std::sync::{Arc, RwLock};
use crossbeam_channel::{Receiver, Sender};
use rustc_hash::FxHashMap;
use crate::model::RenderModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Static,
    Skinned,
}

/// Outcome of polling a model path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqResult {
    /// Still loading; ask again next frame
    Loading,
    Ready,
    /// Loading failed; the path will never become ready
    Error,
}

/// Source of render models, shared with the frame tasks
pub trait ModelManager: Send + Sync {
    fn request_static(&self, path: &str) -> ReqResult;

    fn request_skinned(&self, path: &str) -> ReqResult;

    fn get_static(&self, path: &str) -> Option<Arc<RenderModel>>;

    fn get_skinned(&self, path: &str) -> Option<Arc<RenderModel>>;

    fn request(&self, kind: ModelKind, path: &str) -> ReqResult {
        match kind {
            ModelKind::Static => self.request_static(path),
            ModelKind::Skinned => self.request_skinned(path),
        }
    }

    fn get(&self, kind: ModelKind, path: &str) -> Option<Arc<RenderModel>> {
        match kind {
            ModelKind::Static => self.get_static(path),
            ModelKind::Skinned => self.get_skinned(path),
        }
    }
}

enum ModelState {
    Loading,
    Ready(Arc<RenderModel>),
    Failed,
}

/// A load the application still has to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub kind: ModelKind,
    pub path: String,
}

/// In-memory model manager
///
/// The first request of a path queues a `ModelRequest` and reports
/// `Loading`. The application drains the queue (typically on a loader
/// thread) and answers with `insert` or `mark_failed`.
pub struct ModelCache {
    states: RwLock<FxHashMap<(ModelKind, String), ModelState>>,
    request_tx: Sender<ModelRequest>,
    request_rx: Receiver<ModelRequest>,
}

impl ModelCache {
    pub fn new() -> Self {
        let (request_tx, request_rx) = crossbeam_channel::unbounded();
        Self {
            states: RwLock::new(FxHashMap::default()),
            request_tx,
            request_rx,
        }
    }

    /// Queue of paths waiting to be loaded
    pub fn requests(&self) -> &Receiver<ModelRequest> {
        &self.request_rx
    }

    /// Mark `path` ready with `model`
    pub fn insert(&self, kind: ModelKind, path: impl Into<String>, model: Arc<RenderModel>) {
        if let Ok(mut states) = self.states.write() {
            states.insert((kind, path.into()), ModelState::Ready(model));
        }
    }

    pub fn mark_failed(&self, kind: ModelKind, path: impl Into<String>) {
        let path = path.into();
        crate::engine_warn!("mirinae::ModelCache", "Model failed to load: {}", path);
        if let Ok(mut states) = self.states.write() {
            states.insert((kind, path), ModelState::Failed);
        }
    }

    fn poll(&self, kind: ModelKind, path: &str) -> ReqResult {
        let key = (kind, path.to_string());
        if let Ok(states) = self.states.read() {
            match states.get(&key) {
                Some(ModelState::Loading) => return ReqResult::Loading,
                Some(ModelState::Ready(_)) => return ReqResult::Ready,
                Some(ModelState::Failed) => return ReqResult::Error,
                None => {}
            }
        }

        let Ok(mut states) = self.states.write() else {
            return ReqResult::Error;
        };
        // Another thread may have queued it between the two locks
        if states.contains_key(&key) {
            return ReqResult::Loading;
        }
        states.insert(key, ModelState::Loading);
        let _ = self.request_tx.send(ModelRequest { kind, path: path.to_string() });
        crate::engine_debug!("mirinae::ModelCache", "Queued model load: {}", path);
        ReqResult::Loading
    }

    fn fetch(&self, kind: ModelKind, path: &str) -> Option<Arc<RenderModel>> {
        let states = self.states.read().ok()?;
        match states.get(&(kind, path.to_string())) {
            Some(ModelState::Ready(model)) => Some(model.clone()),
            _ => None,
        }
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelManager for ModelCache {
    fn request_static(&self, path: &str) -> ReqResult {
        self.poll(ModelKind::Static, path)
    }

    fn request_skinned(&self, path: &str) -> ReqResult {
        self.poll(ModelKind::Skinned, path)
    }

    fn get_static(&self, path: &str) -> Option<Arc<RenderModel>> {
        self.fetch(ModelKind::Static, path)
    }

    fn get_skinned(&self, path: &str) -> Option<Arc<RenderModel>> {
        self.fetch(ModelKind::Skinned, path)
    }
}
