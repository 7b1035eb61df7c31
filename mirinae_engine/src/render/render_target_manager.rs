/// RenderTargetManager - named render images shared between passes
///
/// A producer pass registers an image with `new_img` and (re)creates the
/// GPU image inside the returned `RenderImage` slot. Consumer passes look it
/// up by id with `get_img_reader`. Every user releases its claim with
/// `free_img`; the record and its GPU image go away with the last user.

use std::sync::{Arc, Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use crate::device::Image;
use crate::error::{Error, Result};

/// Shared slot holding the current GPU image of a render target
///
/// Readers must fetch the image every frame; the producer replaces it on
/// resize.
#[derive(Clone)]
pub struct RenderImage {
    id: Arc<str>,
    slot: Arc<RwLock<Option<Arc<dyn Image>>>>,
}

impl RenderImage {
    fn new(id: &str) -> Self {
        Self {
            id: Arc::from(id),
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// `"<user_id>:<name>"`
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self) -> Option<Arc<dyn Image>> {
        self.slot.read().ok().and_then(|slot| slot.clone())
    }

    pub fn set(&self, image: Arc<dyn Image>) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = Some(image);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.write() {
            slot.take();
        }
    }
}

struct ImageRecord {
    creator: String,
    writers: FxHashSet<String>,
    readers: FxHashSet<String>,
    image: RenderImage,
}

#[derive(Default)]
pub struct RenderTargetManager {
    records: Mutex<FxHashMap<String, ImageRecord>>,
}

impl RenderTargetManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `"<user_id>:<name>"` with `user_id` as its writer
    ///
    /// Fails with `Error::InvalidResource` when the id is already taken.
    pub fn new_img(&self, name: &str, user_id: &str) -> Result<RenderImage> {
        let id = format!("{}:{}", user_id, name);
        let mut records = self.lock()?;

        if let Some(record) = records.get(&id) {
            crate::engine_error!(
                "mirinae::RenderTargetManager",
                "Image '{}' requested by '{}' was already created by '{}'",
                id, user_id, record.creator
            );
            return Err(Error::InvalidResource(format!("render image '{}' already exists", id)));
        }

        let image = RenderImage::new(&id);
        let mut writers = FxHashSet::default();
        writers.insert(user_id.to_string());
        records.insert(
            id.clone(),
            ImageRecord {
                creator: user_id.to_string(),
                writers,
                readers: FxHashSet::default(),
                image: image.clone(),
            },
        );
        crate::engine_debug!("mirinae::RenderTargetManager", "Render image created: {}", id);
        Ok(image)
    }

    /// Claim `id` as a reader; `None` when no producer registered it
    pub fn get_img_reader(&self, id: &str, user_id: &str) -> Option<RenderImage> {
        let mut records = self.records.lock().ok()?;
        let record = records.get_mut(id)?;
        record.readers.insert(user_id.to_string());
        crate::engine_trace!("mirinae::RenderTargetManager", "Render image reader: {} <- {}", id, user_id);
        Some(record.image.clone())
    }

    /// Release `user_id`'s claim on `id`; the last release destroys the image
    pub fn free_img(&self, id: &str, user_id: &str) {
        let Ok(mut records) = self.records.lock() else {
            return;
        };
        let Some(record) = records.get_mut(id) else {
            crate::engine_debug!("mirinae::RenderTargetManager", "free_img of unknown image '{}'", id);
            return;
        };

        let was_writer = record.writers.remove(user_id);
        let was_reader = record.readers.remove(user_id);
        if !was_writer && !was_reader {
            crate::engine_debug!(
                "mirinae::RenderTargetManager",
                "'{}' does not use image '{}'",
                user_id, id
            );
            return;
        }

        if record.writers.is_empty() && record.readers.is_empty() {
            if let Some(record) = records.remove(id) {
                record.image.clear();
            }
            crate::engine_debug!("mirinae::RenderTargetManager", "Render image released: {}", id);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.lock().map(|r| r.contains_key(id)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, FxHashMap<String, ImageRecord>>> {
        self.records
            .lock()
            .map_err(|_| Error::BackendError("render target lock poisoned".to_string()))
    }
}

#[cfg(test)]
#[path = "render_target_manager_tests.rs"]
mod tests;
