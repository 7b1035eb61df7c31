/// SamplerCache - VkSampler objects shared by every binding group
///
/// Samplers are created on first use and live as long as the device.

use ash::vk;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use mirinae_engine::device::SamplerType;
use mirinae_engine::mirinae::Result;
use mirinae_engine::engine_err;

use crate::vulkan_context::GpuContext;

pub(crate) struct SamplerCache {
    ctx: Arc<GpuContext>,
    cache: FxHashMap<SamplerType, vk::Sampler>,
}

impl SamplerCache {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Self {
        Self {
            ctx,
            cache: FxHashMap::default(),
        }
    }

    /// Get or create the VkSampler for `sampler_type`
    pub(crate) fn get(&mut self, sampler_type: SamplerType) -> Result<vk::Sampler> {
        if let Some(&sampler) = self.cache.get(&sampler_type) {
            return Ok(sampler);
        }

        let create_info = sampler_create_info(sampler_type);
        let sampler = unsafe { self.ctx.device.create_sampler(&create_info, None) }.map_err(|e| {
            engine_err!("mirinae::vulkan::Sampler", "Failed to create {:?} sampler: {:?}", sampler_type, e)
        })?;
        self.cache.insert(sampler_type, sampler);
        Ok(sampler)
    }
}

/// Fixed sampler state for each sampler kind
pub(crate) fn sampler_create_info(sampler_type: SamplerType) -> vk::SamplerCreateInfo<'static> {
    let (filter, mipmap, address, border, compare) = match sampler_type {
        SamplerType::LinearClamp => (
            vk::Filter::LINEAR,
            vk::SamplerMipmapMode::LINEAR,
            vk::SamplerAddressMode::CLAMP_TO_EDGE,
            vk::BorderColor::FLOAT_OPAQUE_BLACK,
            false,
        ),
        SamplerType::NearestClamp => (
            vk::Filter::NEAREST,
            vk::SamplerMipmapMode::NEAREST,
            vk::SamplerAddressMode::CLAMP_TO_EDGE,
            vk::BorderColor::FLOAT_OPAQUE_BLACK,
            false,
        ),
        // Outside the shadow map counts as lit
        SamplerType::ShadowCompare => (
            vk::Filter::LINEAR,
            vk::SamplerMipmapMode::NEAREST,
            vk::SamplerAddressMode::CLAMP_TO_BORDER,
            vk::BorderColor::FLOAT_OPAQUE_WHITE,
            true,
        ),
    };

    vk::SamplerCreateInfo::default()
        .mag_filter(filter)
        .min_filter(filter)
        .mipmap_mode(mipmap)
        .address_mode_u(address)
        .address_mode_v(address)
        .address_mode_w(address)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(vk::LOD_CLAMP_NONE)
        .border_color(border)
        .anisotropy_enable(false)
        .max_anisotropy(1.0)
        .compare_enable(compare)
        .compare_op(if compare { vk::CompareOp::LESS_OR_EQUAL } else { vk::CompareOp::ALWAYS })
        .unnormalized_coordinates(false)
}

impl Drop for SamplerCache {
    fn drop(&mut self) {
        for (_, sampler) in self.cache.drain() {
            unsafe { self.ctx.device.destroy_sampler(sampler, None) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadow_sampler_compares_with_white_border() {
        let info = sampler_create_info(SamplerType::ShadowCompare);
        assert_eq!(info.compare_enable, vk::TRUE);
        assert_eq!(info.compare_op, vk::CompareOp::LESS_OR_EQUAL);
        assert_eq!(info.border_color, vk::BorderColor::FLOAT_OPAQUE_WHITE);
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::CLAMP_TO_BORDER);
    }

    #[test]
    fn test_clamp_samplers_do_not_compare() {
        for sampler_type in [SamplerType::LinearClamp, SamplerType::NearestClamp] {
            let info = sampler_create_info(sampler_type);
            assert_eq!(info.compare_enable, vk::FALSE);
            assert_eq!(info.address_mode_v, vk::SamplerAddressMode::CLAMP_TO_EDGE);
        }
        assert_eq!(sampler_create_info(SamplerType::LinearClamp).mag_filter, vk::Filter::LINEAR);
        assert_eq!(sampler_create_info(SamplerType::NearestClamp).min_filter, vk::Filter::NEAREST);
    }
}
