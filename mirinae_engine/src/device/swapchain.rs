/// Swapchain trait - presentation surface images

use std::sync::Arc;
use crate::error::Result;
use crate::device::{Image, ImageFormat, Semaphore};
use crate::frame::SwapchainImageIndex;

/// Swapchain trait
///
/// Owned by the renderer; the backend creates it from a window.
pub trait Swapchain: Send + Sync {
    /// Acquire the next presentable image, signaling `signal` when ready
    ///
    /// Returns `Error::SurfaceOutOfDate` when the surface changed.
    fn acquire_next_image(&mut self, signal: &dyn Semaphore) -> Result<SwapchainImageIndex>;

    /// Present `index` once `wait` is signaled
    ///
    /// Returns `Error::SurfaceOutOfDate` when out of date or suboptimal.
    fn present(&mut self, index: SwapchainImageIndex, wait: &dyn Semaphore) -> Result<()>;

    /// Recreate every swapchain image at the new size
    fn recreate(&mut self, width: u32, height: u32) -> Result<()>;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn image_count(&self) -> usize;

    fn format(&self) -> ImageFormat;

    /// Image behind `index` (usable as a framebuffer attachment)
    fn image(&self, index: usize) -> Arc<dyn Image>;
}
