/// Image trait, image descriptor, and image info

use std::any::Any;
use bitflags::bitflags;

/// Image and attachment formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum ImageFormat {
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    B8G8R8A8_SRGB,
    B8G8R8A8_UNORM,
    R16G16B16A16_SFLOAT,
    R32G32B32A32_SFLOAT,
    D16_UNORM,
    D32_SFLOAT,
    D24_UNORM_S8_UINT,
}

impl ImageFormat {
    /// Returns true for depth and depth/stencil formats
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            ImageFormat::D16_UNORM | ImageFormat::D32_SFLOAT | ImageFormat::D24_UNORM_S8_UINT
        )
    }
}

bitflags! {
    /// How an image may be used by the GPU
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const SAMPLED = 0x01;
        const COLOR_ATTACHMENT = 0x02;
        const DEPTH_ATTACHMENT = 0x04;
        const STORAGE = 0x08;
        const TRANSFER_SRC = 0x10;
        const TRANSFER_DST = 0x20;
    }
}

/// Descriptor for creating an image
#[derive(Debug, Clone)]
pub struct ImageDesc {
    /// Debug name (also used by the mock device to identify objects)
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub usage: ImageUsage,
    /// Number of array layers (1 = simple 2D image)
    pub array_layers: u32,
}

/// Read-only properties of a created image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub usage: ImageUsage,
    pub array_layers: u32,
}

impl From<&ImageDesc> for ImageInfo {
    fn from(desc: &ImageDesc) -> Self {
        Self {
            name: desc.name.clone(),
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
            array_layers: desc.array_layers,
        }
    }
}

/// Image resource trait
///
/// Implemented by backend-specific image types (e.g., VulkanImage).
/// The image is automatically destroyed when dropped.
pub trait Image: Send + Sync {
    /// Get the read-only properties of this image
    fn info(&self) -> &ImageInfo;

    fn as_any(&self) -> &dyn Any;
}

/// Formats picked by the device for the renderer's attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageFormats {
    /// Depth format for g-buffer and shadow maps
    pub depth: ImageFormat,
    /// HDR color format for composition and bloom targets
    pub rgba_hdr: ImageFormat,
    /// 8-bit color format for albedo/normal/material
    pub rgba_unorm: ImageFormat,
}

impl Default for ImageFormats {
    fn default() -> Self {
        Self {
            depth: ImageFormat::D32_SFLOAT,
            rgba_hdr: ImageFormat::R16G16B16A16_SFLOAT,
            rgba_unorm: ImageFormat::R8G8B8A8_UNORM,
        }
    }
}
