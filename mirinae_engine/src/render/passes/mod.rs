/// Passes module - the concrete render passes, in submission order
///
/// 1. `shadow` - static geometry into every assigned shadow slot
/// 2. `gbuf` - depth, albedo, normal and material
/// 3. `compo_dlight` - directional lighting into `compo`
/// 4. `compo_slight` - spot lighting added onto `compo`
/// 5. `transp` - alpha-blended units over `compo`, tested against g-buffer depth
/// 6. `bloom_downsample` - chain of halving copies of `compo`, shared as render images
/// 7. `bloom_blend` - upsamples every level of the chain back onto `compo`
/// 8. `debug` - debug triangles and meshes over `compo`
/// 9. `fillscreen` - tone-maps `compo` into the swapchain image

pub mod shadow;
pub mod gbuf;
pub mod compo_dlight;
pub mod compo_slight;
pub mod transp;
pub mod bloom_downsample;
pub mod bloom_blend;
pub mod debug;
pub mod fillscreen;

pub use shadow::ShadowPass;
pub use gbuf::GbufPass;
pub use compo_dlight::CompoDlightPass;
pub use compo_slight::CompoSlightPass;
pub use transp::TranspPass;
pub use bloom_downsample::BloomDownsamplePass;
pub use bloom_blend::BloomBlendPass;
pub use debug::DebugPass;
pub use fillscreen::FillscreenPass;

use std::sync::Arc;
use crate::device::{
    BindingGroupLayoutDesc, BindingSlotDesc, BindingType, Image, Rect2D, ShaderStageFlags, Viewport,
};
use crate::error::{Error, Result};
use crate::render::{RenderPassBase, RpCreateBundle};

/// Construct every pass in submission order
pub fn create_passes(bundle: &RpCreateBundle) -> Result<Vec<Box<dyn RenderPassBase>>> {
    let passes: Vec<Box<dyn RenderPassBase>> = vec![
        Box::new(ShadowPass::new(bundle)?),
        Box::new(GbufPass::new(bundle)?),
        Box::new(CompoDlightPass::new(bundle)?),
        Box::new(CompoSlightPass::new(bundle)?),
        Box::new(TranspPass::new(bundle)?),
        Box::new(BloomDownsamplePass::new(bundle)?),
        Box::new(BloomBlendPass::new(bundle)?),
        Box::new(DebugPass::new(bundle)?),
        Box::new(FillscreenPass::new(bundle)?),
    ];
    crate::engine_info!("mirinae::Renderer", "{} render passes created", passes.len());
    Ok(passes)
}

/// Scissor covering exactly `viewport`
pub(crate) fn scissor_of(viewport: &Viewport) -> Rect2D {
    Rect2D {
        x: viewport.x as i32,
        y: viewport.y as i32,
        width: viewport.width as u32,
        height: viewport.height as u32,
    }
}

pub(crate) fn require_img<'a>(image: Option<&'a Arc<dyn Image>>, what: &str) -> Result<&'a Arc<dyn Image>> {
    image.ok_or_else(|| Error::InvalidResource(format!("{} is not created", what)))
}

/// Fragment-stage layout: `images` samplers at bindings 0.., then an
/// optional uniform buffer
pub(crate) fn fragment_layout(images: u32, uniform: bool) -> BindingGroupLayoutDesc {
    let mut entries: Vec<BindingSlotDesc> = (0..images)
        .map(|i| BindingSlotDesc::new(i, BindingType::CombinedImageSampler, ShaderStageFlags::FRAGMENT))
        .collect();
    if uniform {
        entries.push(BindingSlotDesc::new(images, BindingType::UniformBuffer, ShaderStageFlags::FRAGMENT));
    }
    BindingGroupLayoutDesc { entries }
}

#[cfg(test)]
#[path = "passes_tests.rs"]
mod tests;
