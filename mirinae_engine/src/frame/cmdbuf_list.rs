/// Per-frame list of command buffers waiting for submission

use std::sync::Mutex;
use crate::device::CommandBuffer;
use crate::frame::{FrameIndex, MAX_FRAMES_IN_FLIGHT};

/// Command buffers collected from the pass tasks, one list per frame slot
pub struct CmdBufList {
    lists: Vec<Mutex<Vec<CommandBuffer>>>,
}

impl CmdBufList {
    pub fn new() -> Self {
        Self {
            lists: (0..MAX_FRAMES_IN_FLIGHT).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    pub fn clear(&self, f_index: FrameIndex) {
        if let Ok(mut list) = self.lists[f_index.get()].lock() {
            list.clear();
        }
    }

    pub fn add(&self, f_index: FrameIndex, cmdbuf: CommandBuffer) {
        if let Ok(mut list) = self.lists[f_index.get()].lock() {
            list.push(cmdbuf);
        }
    }

    /// Snapshot of the list in submission order
    pub fn as_slice(&self, f_index: FrameIndex) -> Vec<CommandBuffer> {
        self.lists[f_index.get()]
            .lock()
            .map(|list| list.clone())
            .unwrap_or_default()
    }

    pub fn len(&self, f_index: FrameIndex) -> usize {
        self.lists[f_index.get()].lock().map(|list| list.len()).unwrap_or(0)
    }
}

impl Default for CmdBufList {
    fn default() -> Self {
        Self::new()
    }
}
