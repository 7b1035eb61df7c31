/// Per-frame-slot semaphores and fences

use std::sync::Arc;
use crate::device::{Fence, GraphicsDevice, Semaphore};
use crate::error::Result;
use crate::frame::{FrameIndex, MAX_FRAMES_IN_FLIGHT};

/// Synchronization objects of every frame slot
///
/// In-flight fences start signaled so the first wait of each slot returns
/// immediately.
pub struct FrameSync {
    img_available: Vec<Arc<dyn Semaphore>>,
    render_finished: Vec<Arc<dyn Semaphore>>,
    in_flight_fences: Vec<Arc<dyn Fence>>,
    frame_index: FrameIndex,
}

impl FrameSync {
    pub fn new(device: &dyn GraphicsDevice) -> Result<Self> {
        let mut img_available = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut render_finished = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut in_flight_fences = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            img_available.push(device.create_semaphore()?);
            render_finished.push(device.create_semaphore()?);
            in_flight_fences.push(device.create_fence(true)?);
        }

        Ok(Self {
            img_available,
            render_finished,
            in_flight_fences,
            frame_index: FrameIndex::default(),
        })
    }

    pub fn frame_index(&self) -> FrameIndex {
        self.frame_index
    }

    pub fn cur_img_available(&self) -> &Arc<dyn Semaphore> {
        &self.img_available[self.frame_index.get()]
    }

    pub fn cur_render_finished(&self) -> &Arc<dyn Semaphore> {
        &self.render_finished[self.frame_index.get()]
    }

    pub fn cur_in_flight_fence(&self) -> &Arc<dyn Fence> {
        &self.in_flight_fences[self.frame_index.get()]
    }

    pub fn increase_frame_index(&mut self) {
        self.frame_index = self.frame_index.next();
    }
}

#[cfg(test)]
#[path = "frame_sync_tests.rs"]
mod tests;
