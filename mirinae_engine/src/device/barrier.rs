/// Image layouts, synchronization scopes and image barriers

use std::sync::Arc;
use bitflags::bitflags;
use crate::device::Image;

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// Contents are discarded
    Undefined,
    /// Storage image access from compute shaders
    General,
    ColorAttachment,
    DepthStencilAttachment,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    /// Ready to be handed to the presentation engine
    PresentSrc,
}

bitflags! {
    /// Pipeline stages taking part in a dependency
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE = 0x001;
        const VERTEX_SHADER = 0x002;
        const FRAGMENT_SHADER = 0x004;
        const EARLY_FRAGMENT_TESTS = 0x008;
        const LATE_FRAGMENT_TESTS = 0x010;
        const COLOR_ATTACHMENT_OUTPUT = 0x020;
        const COMPUTE_SHADER = 0x040;
        const TRANSFER = 0x080;
        const BOTTOM_OF_PIPE = 0x100;
    }
}

bitflags! {
    /// Memory accesses taking part in a dependency
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const SHADER_READ = 0x001;
        const SHADER_WRITE = 0x002;
        const COLOR_ATTACHMENT_READ = 0x004;
        const COLOR_ATTACHMENT_WRITE = 0x008;
        const DEPTH_STENCIL_ATTACHMENT_READ = 0x010;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 0x020;
        const TRANSFER_READ = 0x040;
        const TRANSFER_WRITE = 0x080;
    }
}

impl AccessFlags {
    /// Access bits that modify memory
    pub const WRITES: Self = Self::SHADER_WRITE
        .union(Self::COLOR_ATTACHMENT_WRITE)
        .union(Self::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .union(Self::TRANSFER_WRITE);

    pub fn has_write(&self) -> bool {
        self.intersects(Self::WRITES)
    }
}

/// Aspect of an image addressed by a barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageAspect {
    Color,
    Depth,
}

/// Layout plus the stage/access scope of the last (or next) use of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageState {
    pub layout: ImageLayout,
    pub stages: PipelineStages,
    pub access: AccessFlags,
}

impl ImageState {
    pub const UNDEFINED: Self = Self {
        layout: ImageLayout::Undefined,
        stages: PipelineStages::TOP_OF_PIPE,
        access: AccessFlags::empty(),
    };

    pub const COLOR_ATTACHMENT_WRITE: Self = Self {
        layout: ImageLayout::ColorAttachment,
        stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT,
        access: AccessFlags::COLOR_ATTACHMENT_WRITE,
    };

    pub const COLOR_ATTACHMENT_READ_WRITE: Self = Self {
        layout: ImageLayout::ColorAttachment,
        stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT,
        access: AccessFlags::COLOR_ATTACHMENT_READ.union(AccessFlags::COLOR_ATTACHMENT_WRITE),
    };

    pub const DEPTH_ATTACHMENT_WRITE: Self = Self {
        layout: ImageLayout::DepthStencilAttachment,
        stages: PipelineStages::EARLY_FRAGMENT_TESTS.union(PipelineStages::LATE_FRAGMENT_TESTS),
        access: AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
            .union(AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE),
    };

    pub const SHADER_READ_FRAGMENT: Self = Self {
        layout: ImageLayout::ShaderReadOnly,
        stages: PipelineStages::FRAGMENT_SHADER,
        access: AccessFlags::SHADER_READ,
    };

    pub const SHADER_READ_COMPUTE: Self = Self {
        layout: ImageLayout::ShaderReadOnly,
        stages: PipelineStages::COMPUTE_SHADER,
        access: AccessFlags::SHADER_READ,
    };

    pub const STORAGE_WRITE_COMPUTE: Self = Self {
        layout: ImageLayout::General,
        stages: PipelineStages::COMPUTE_SHADER,
        access: AccessFlags::SHADER_WRITE,
    };

    pub const PRESENT: Self = Self {
        layout: ImageLayout::PresentSrc,
        stages: PipelineStages::BOTTOM_OF_PIPE,
        access: AccessFlags::empty(),
    };
}

/// Layout transition and/or memory dependency for one image
#[derive(Clone)]
pub struct ImageBarrier {
    pub image: Arc<dyn Image>,
    pub old: ImageState,
    pub new: ImageState,
    pub aspect: ImageAspect,
    pub base_layer: u32,
    pub layer_count: u32,
}

impl ImageBarrier {
    /// Barrier covering every layer of `image`
    pub fn whole(image: Arc<dyn Image>, old: ImageState, new: ImageState) -> Self {
        let info = image.info();
        let aspect = if info.format.is_depth() { ImageAspect::Depth } else { ImageAspect::Color };
        let layer_count = info.array_layers;
        Self { image, old, new, aspect, base_layer: 0, layer_count }
    }
}

impl std::fmt::Debug for ImageBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBarrier")
            .field("image", &self.image.info().name)
            .field("old", &self.old.layout)
            .field("new", &self.new.layout)
            .field("aspect", &self.aspect)
            .finish()
    }
}
