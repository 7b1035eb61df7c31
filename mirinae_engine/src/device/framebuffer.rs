/// Framebuffer trait and descriptor

use std::any::Any;
use std::sync::Arc;
use crate::device::{Image, RenderPass};

/// Descriptor for creating a framebuffer
#[derive(Clone)]
pub struct FramebufferDesc {
    pub render_pass: Arc<dyn RenderPass>,
    /// Attachments in render pass order (colors first, depth last)
    pub attachments: Vec<Arc<dyn Image>>,
    pub width: u32,
    pub height: u32,
}

/// Framebuffer resource trait
///
/// Keeps its attachments alive; destroyed when dropped.
pub trait Framebuffer: Send + Sync {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn as_any(&self) -> &dyn Any;
}
