/// Command buffer pool indexed by (frame slot, worker thread)

use std::sync::Mutex;
use crate::device::{CommandBuffer, CommandPool, GraphicsDevice};
use crate::error::{Error, Result};
use crate::frame::{FrameIndex, MAX_FRAMES_IN_FLIGHT};

/// Number of buffers allocated whenever a pool runs dry
const GROW_STEP: usize = 4;

struct PoolSlot {
    pool: Box<dyn CommandPool>,
    buffers: Vec<CommandBuffer>,
    cursor: usize,
}

impl PoolSlot {
    fn next(&mut self) -> Result<CommandBuffer> {
        if self.cursor >= self.buffers.len() {
            let mut more = self.pool.allocate(GROW_STEP)?;
            self.buffers.append(&mut more);
        }
        let cmdbuf = self.buffers[self.cursor].clone();
        self.cursor += 1;
        Ok(cmdbuf)
    }
}

/// One native command pool per (frame slot, thread)
///
/// `get` never hands the same buffer out twice between two `reset_pool`
/// calls of a frame slot. `reset_pool(f)` must only run once the in-flight
/// fence of slot `f` was waited on.
pub struct RpCommandPool {
    slots: Vec<Vec<Mutex<PoolSlot>>>,
}

impl RpCommandPool {
    /// `thread_count` should be the worker count plus one; the last slot is
    /// shared by threads outside the worker pool.
    pub fn new(device: &dyn GraphicsDevice, thread_count: usize) -> Result<Self> {
        let thread_count = thread_count.max(1);
        let mut slots = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let mut per_thread = Vec::with_capacity(thread_count);
            for _ in 0..thread_count {
                per_thread.push(Mutex::new(PoolSlot {
                    pool: device.create_command_pool()?,
                    buffers: Vec::new(),
                    cursor: 0,
                }));
            }
            slots.push(per_thread);
        }
        Ok(Self { slots })
    }

    pub fn thread_count(&self) -> usize {
        self.slots[0].len()
    }

    /// Slot of the calling thread: its worker index, or the shared last slot
    pub fn current_thread_slot(&self) -> usize {
        let fallback = self.thread_count() - 1;
        match rayon::current_thread_index() {
            Some(index) if index < fallback => index,
            _ => fallback,
        }
    }

    /// Next unused command buffer of (`f_index`, `tid`)
    pub fn get(&self, f_index: FrameIndex, tid: usize) -> Result<CommandBuffer> {
        let per_thread = &self.slots[f_index.get()];
        let slot = per_thread.get(tid).unwrap_or(&per_thread[per_thread.len() - 1]);
        let mut slot = slot
            .lock()
            .map_err(|_| Error::BackendError("command pool lock poisoned".to_string()))?;
        slot.next()
    }

    /// Next unused command buffer for the calling thread
    pub fn get_for_current_thread(&self, f_index: FrameIndex) -> Result<CommandBuffer> {
        self.get(f_index, self.current_thread_slot())
    }

    /// Reset every thread's native pool of `f_index` and rewind the cursors
    pub fn reset_pool(&self, f_index: FrameIndex) -> Result<()> {
        for slot in &self.slots[f_index.get()] {
            let mut slot = slot
                .lock()
                .map_err(|_| Error::BackendError("command pool lock poisoned".to_string()))?;
            slot.pool.reset()?;
            slot.cursor = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "command_pool_tests.rs"]
mod tests;
