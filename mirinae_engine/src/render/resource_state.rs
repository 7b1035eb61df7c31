/// ImageStateTracker - derives image barriers from declared uses
///
/// Passes declare, during their serial `prepare`, the state each image must
/// be in. The tracker compares it with the state the previous user (in pass
/// order) left the image in and hands back the barrier to record. Because
/// `prepare` runs in submission order on one thread, barriers are correct
/// regardless of which worker records a pass first.

use std::sync::{Arc, Weak};
use rustc_hash::FxHashMap;
use crate::device::{Image, ImageBarrier, ImageState};

struct TrackedImage {
    image: Weak<dyn Image>,
    state: ImageState,
}

#[derive(Default)]
pub struct ImageStateTracker {
    states: FxHashMap<usize, TrackedImage>,
}

fn key(image: &Arc<dyn Image>) -> usize {
    Arc::as_ptr(image) as *const () as usize
}

impl ImageStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last recorded state of `image`; unknown or recreated images are UNDEFINED
    pub fn state(&self, image: &Arc<dyn Image>) -> ImageState {
        match self.states.get(&key(image)) {
            Some(tracked) if tracked.image.upgrade().is_some() => tracked.state,
            _ => ImageState::UNDEFINED,
        }
    }

    /// Move `image` to `state`, returning the barrier needed to get there
    ///
    /// No barrier is emitted when the layout is unchanged and neither side
    /// writes.
    pub fn require(&mut self, image: &Arc<dyn Image>, state: ImageState) -> Option<ImageBarrier> {
        let old = self.state(image);
        self.record(image, state);

        let needed = old.layout != state.layout || old.access.has_write() || state.access.has_write();
        needed.then(|| ImageBarrier::whole(image.clone(), old, state))
    }

    /// Record a transition performed implicitly (render pass final layout)
    pub fn set_after_pass(&mut self, image: &Arc<dyn Image>, state: ImageState) {
        self.record(image, state);
    }

    /// Forget the contents of `image`; its next barrier starts from UNDEFINED
    pub fn discard(&mut self, image: &Arc<dyn Image>) {
        self.states.remove(&key(image));
    }

    /// Drop entries of images that no longer exist
    pub fn prune(&mut self) {
        self.states.retain(|_, tracked| tracked.image.strong_count() > 0);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn record(&mut self, image: &Arc<dyn Image>, state: ImageState) {
        self.states.insert(
            key(image),
            TrackedImage { image: Arc::downgrade(image), state },
        );
    }
}

#[cfg(test)]
#[path = "resource_state_tests.rs"]
mod tests;
