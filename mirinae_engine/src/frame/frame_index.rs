/// Frame slot and swapchain image indices
///
/// The two are deliberately distinct types: the frame slot cycles through
/// `MAX_FRAMES_IN_FLIGHT`, the swapchain image index is whatever acquire
/// returned.

use std::fmt;

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Index of the current frame slot, always in `[0, MAX_FRAMES_IN_FLIGHT)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct FrameIndex(usize);

impl FrameIndex {
    /// Wraps `index` into the valid range
    pub fn new(index: usize) -> Self {
        Self(index % MAX_FRAMES_IN_FLIGHT)
    }

    pub fn get(&self) -> usize {
        self.0
    }

    /// The slot after this one
    pub fn next(&self) -> Self {
        Self::new(self.0 + 1)
    }

    /// Every frame slot in order
    pub fn all() -> impl Iterator<Item = FrameIndex> {
        (0..MAX_FRAMES_IN_FLIGHT).map(FrameIndex)
    }
}

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f#{}", self.0)
    }
}

/// Index of an acquired swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SwapchainImageIndex(usize);

impl SwapchainImageIndex {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

#[cfg(test)]
#[path = "frame_index_tests.rs"]
mod tests;
