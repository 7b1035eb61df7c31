/// RenderPass trait - describes how attachments are loaded, stored and transitioned

use std::any::Any;
use crate::device::{ImageFormat, ImageLayout};

/// Render pass trait
pub trait RenderPass: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Descriptor for creating a render pass
#[derive(Debug, Clone)]
pub struct RenderPassDesc {
    pub name: String,
    pub color_attachments: Vec<AttachmentDesc>,
    pub depth_attachment: Option<AttachmentDesc>,
}

/// Descriptor for a single attachment in a render pass
///
/// `initial_layout` must match the layout the pass's barriers leave the
/// image in; `final_layout` is what the image state tracker records after
/// the pass.
#[derive(Debug, Clone)]
pub struct AttachmentDesc {
    pub format: ImageFormat,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

/// Load operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

/// Store operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Store,
    DontCare,
}
