/// G-buffer images, one set per frame slot

use std::sync::Arc;
use crate::device::{Extent2D, GraphicsDevice, Image, ImageDesc, ImageFormat, ImageUsage};
use crate::error::Result;
use crate::frame::{FrameIndex, MAX_FRAMES_IN_FLIGHT};

/// G-buffer size for a swapchain of `width` × `height`
pub fn calc_scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    ((scale * width as f64) as u32, (scale * height as f64) as u32)
}

struct FrameImages {
    depth: Arc<dyn Image>,
    albedo: Arc<dyn Image>,
    normal: Arc<dyn Image>,
    material: Arc<dyn Image>,
    compo: Arc<dyn Image>,
}

/// Depth, albedo, normal, material and composition targets
///
/// Empty until `init`; `init` again on resize replaces every image.
#[derive(Default)]
pub struct FbufImageBundle {
    frames: Vec<FrameImages>,
    width: u32,
    height: u32,
}

impl FbufImageBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self, device: &dyn GraphicsDevice, width: u32, height: u32) -> Result<()> {
        let formats = device.image_formats();
        let make = |name: &str, f_index: FrameIndex, format: ImageFormat, usage: ImageUsage| {
            device.create_image(&ImageDesc {
                name: format!("gbuf_{}_{}", name, f_index),
                width,
                height,
                format,
                usage: usage | ImageUsage::SAMPLED,
                array_layers: 1,
            })
        };

        let mut frames = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for f in FrameIndex::all() {
            frames.push(FrameImages {
                depth: make("depth", f, formats.depth, ImageUsage::DEPTH_ATTACHMENT)?,
                albedo: make("albedo", f, formats.rgba_unorm, ImageUsage::COLOR_ATTACHMENT)?,
                normal: make("normal", f, formats.rgba_unorm, ImageUsage::COLOR_ATTACHMENT)?,
                material: make("material", f, formats.rgba_unorm, ImageUsage::COLOR_ATTACHMENT)?,
                compo: make("compo", f, formats.rgba_hdr, ImageUsage::COLOR_ATTACHMENT)?,
            });
        }

        self.frames = frames;
        self.width = width;
        self.height = height;
        crate::engine_debug!("mirinae::FbufImageBundle", "G-buffer created at {}x{}", width, height);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn extent(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }

    pub fn depth(&self, f_index: FrameIndex) -> Option<&Arc<dyn Image>> {
        self.frames.get(f_index.get()).map(|f| &f.depth)
    }

    pub fn albedo(&self, f_index: FrameIndex) -> Option<&Arc<dyn Image>> {
        self.frames.get(f_index.get()).map(|f| &f.albedo)
    }

    pub fn normal(&self, f_index: FrameIndex) -> Option<&Arc<dyn Image>> {
        self.frames.get(f_index.get()).map(|f| &f.normal)
    }

    pub fn material(&self, f_index: FrameIndex) -> Option<&Arc<dyn Image>> {
        self.frames.get(f_index.get()).map(|f| &f.material)
    }

    pub fn compo(&self, f_index: FrameIndex) -> Option<&Arc<dyn Image>> {
        self.frames.get(f_index.get()).map(|f| &f.compo)
    }
}
