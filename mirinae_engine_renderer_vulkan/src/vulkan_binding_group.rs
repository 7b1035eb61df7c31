/// VulkanBindingGroup - Vulkan implementation of the BindingGroup trait
///
/// Descriptor sets come from a growing list of pools created with
/// FREE_DESCRIPTOR_SET, so a binding group returns its set when dropped.
/// Passes rebuild their groups on every resize; without the free the pools
/// would only ever grow.

use ash::vk;
use std::any::Any;
use std::sync::{Arc, Mutex};
use mirinae_engine::device::{BindingGroup, BindingResource, BindingType, Buffer, Image};
use mirinae_engine::mirinae::{Error, Result};
use mirinae_engine::{engine_bail, engine_err, engine_error, engine_info};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_image::VulkanImage;
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_sampler::SamplerCache;

const SETS_PER_POOL: u32 = 256;

/// Descriptor pools of one device
pub(crate) struct DescriptorAllocator {
    ctx: Arc<GpuContext>,
    /// Last pool is the one allocated from; also serializes frees
    pools: Mutex<Vec<vk::DescriptorPool>>,
}

impl DescriptorAllocator {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let pool = Self::create_pool(&ctx)?;
        Ok(Self {
            ctx,
            pools: Mutex::new(vec![pool]),
        })
    }

    fn create_pool(ctx: &GpuContext) -> Result<vk::DescriptorPool> {
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: SETS_PER_POOL * 4,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: SETS_PER_POOL,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_IMAGE,
                descriptor_count: SETS_PER_POOL / 4,
            },
        ];
        let info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .pool_sizes(&pool_sizes)
            .max_sets(SETS_PER_POOL);

        unsafe { ctx.device.create_descriptor_pool(&info, None) }.map_err(|e| {
            engine_error!("mirinae::vulkan::BindingGroup", "Failed to create descriptor pool: {:?}", e);
            Error::OutOfMemory
        })
    }

    fn lock_pools(&self) -> Result<std::sync::MutexGuard<'_, Vec<vk::DescriptorPool>>> {
        self.pools
            .lock()
            .map_err(|_| Error::BackendError("descriptor pool lock poisoned".to_string()))
    }

    /// Allocate one set, adding a pool when the current one is exhausted
    pub(crate) fn allocate(&self, layout: vk::DescriptorSetLayout) -> Result<(vk::DescriptorPool, vk::DescriptorSet)> {
        let layouts = [layout];
        let mut pools = self.lock_pools()?;
        let current_pool = *pools
            .last()
            .ok_or_else(|| Error::BackendError("no descriptor pool".to_string()))?;
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(current_pool)
            .set_layouts(&layouts);

        match unsafe { self.ctx.device.allocate_descriptor_sets(&allocate_info) } {
            Ok(sets) => Ok((current_pool, sets[0])),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                let new_pool = Self::create_pool(&self.ctx)?;
                pools.push(new_pool);
                engine_info!(
                    "mirinae::vulkan::BindingGroup",
                    "Descriptor pool exhausted, created new pool (total: {})",
                    pools.len()
                );
                let retry_info = vk::DescriptorSetAllocateInfo::default()
                    .descriptor_pool(new_pool)
                    .set_layouts(&layouts);
                let sets = unsafe { self.ctx.device.allocate_descriptor_sets(&retry_info) }.map_err(|e| {
                    engine_err!("mirinae::vulkan::BindingGroup", "Failed to allocate descriptor set after pool growth: {:?}", e)
                })?;
                Ok((new_pool, sets[0]))
            }
            Err(e) => Err(engine_err!("mirinae::vulkan::BindingGroup", "Failed to allocate descriptor set: {:?}", e)),
        }
    }

    fn free(&self, pool: vk::DescriptorPool, set: vk::DescriptorSet) {
        if let Ok(_pools) = self.pools.lock() {
            unsafe { self.ctx.device.free_descriptor_sets(pool, &[set]).ok() };
        }
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        if let Ok(pools) = self.pools.get_mut() {
            for pool in pools.drain(..) {
                unsafe { self.ctx.device.destroy_descriptor_pool(pool, None) };
            }
        }
    }
}

/// Immutable descriptor set for one set index of a pipeline
pub struct VulkanBindingGroup {
    allocator: Arc<DescriptorAllocator>,
    pool: vk::DescriptorPool,
    pub(crate) descriptor_set: vk::DescriptorSet,
    set_index: u32,
}

enum DescriptorInfo {
    Buffer(vk::DescriptorBufferInfo),
    Images(Vec<vk::DescriptorImageInfo>),
}

fn vk_image<'a>(image: &'a dyn Image) -> Result<&'a VulkanImage> {
    image.as_any().downcast_ref::<VulkanImage>().ok_or_else(|| {
        engine_err!("mirinae::vulkan::BindingGroup", "Image '{}' is not a Vulkan image", image.info().name)
    })
}

fn vk_buffer(buffer: &dyn Buffer) -> Result<&VulkanBuffer> {
    buffer
        .as_any()
        .downcast_ref::<VulkanBuffer>()
        .ok_or_else(|| engine_err!("mirinae::vulkan::BindingGroup", "Buffer is not a Vulkan buffer"))
}

impl VulkanBindingGroup {
    /// Resource `i` is written to the binding of layout entry `i`
    pub(crate) fn new(
        allocator: &Arc<DescriptorAllocator>,
        samplers: &Mutex<SamplerCache>,
        pipeline: &VulkanPipeline,
        set_index: u32,
        resources: &[BindingResource],
    ) -> Result<Self> {
        let Some(layout_desc) = pipeline.binding_layouts.get(set_index as usize) else {
            engine_bail!(
                "mirinae::vulkan::BindingGroup",
                "set_index {} out of range (pipeline has {} layouts)",
                set_index, pipeline.binding_layouts.len()
            );
        };
        if resources.len() != layout_desc.entries.len() {
            engine_bail!(
                "mirinae::vulkan::BindingGroup",
                "Set {} expects {} resources, got {}",
                set_index, layout_desc.entries.len(), resources.len()
            );
        }

        let mut samplers = samplers
            .lock()
            .map_err(|_| Error::BackendError("sampler cache lock poisoned".to_string()))?;

        let mut infos = Vec::with_capacity(resources.len());
        for (entry, resource) in layout_desc.entries.iter().zip(resources) {
            let info = match (entry.binding_type, resource) {
                (BindingType::UniformBuffer, BindingResource::UniformBuffer(buffer)) => {
                    DescriptorInfo::Buffer(
                        vk::DescriptorBufferInfo::default()
                            .buffer(vk_buffer(*buffer)?.buffer)
                            .offset(0)
                            .range(vk::WHOLE_SIZE),
                    )
                }
                (BindingType::CombinedImageSampler, BindingResource::SampledImage(image, sampler_type)) => {
                    DescriptorInfo::Images(vec![vk::DescriptorImageInfo::default()
                        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                        .image_view(vk_image(*image)?.view)
                        .sampler(samplers.get(*sampler_type)?)])
                }
                (BindingType::CombinedImageSampler, BindingResource::SampledImageArray(images, sampler_type)) => {
                    if images.is_empty() || images.len() > entry.count as usize {
                        engine_bail!(
                            "mirinae::vulkan::BindingGroup",
                            "Binding {} holds {} images, got {}",
                            entry.binding, entry.count, images.len()
                        );
                    }
                    let sampler = samplers.get(*sampler_type)?;
                    let mut image_infos = Vec::with_capacity(images.len());
                    for image in images {
                        image_infos.push(
                            vk::DescriptorImageInfo::default()
                                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                                .image_view(vk_image(*image)?.view)
                                .sampler(sampler),
                        );
                    }
                    DescriptorInfo::Images(image_infos)
                }
                (BindingType::StorageImage, BindingResource::StorageImage(image)) => {
                    DescriptorInfo::Images(vec![vk::DescriptorImageInfo::default()
                        .image_layout(vk::ImageLayout::GENERAL)
                        .image_view(vk_image(*image)?.view)])
                }
                (binding_type, _) => {
                    engine_bail!(
                        "mirinae::vulkan::BindingGroup",
                        "Resource for binding {} does not match slot type {:?}",
                        entry.binding, binding_type
                    );
                }
            };
            infos.push(info);
        }
        drop(samplers);

        let set_layout = pipeline.set_layouts[set_index as usize];
        let (pool, descriptor_set) = allocator.allocate(set_layout)?;

        let writes: Vec<vk::WriteDescriptorSet> = layout_desc
            .entries
            .iter()
            .zip(&infos)
            .map(|(entry, info)| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(descriptor_set)
                    .dst_binding(entry.binding)
                    .dst_array_element(0)
                    .descriptor_type(crate::vulkan_format::binding_type_to_vk(entry.binding_type));
                match info {
                    DescriptorInfo::Buffer(buffer_info) => write.buffer_info(std::slice::from_ref(buffer_info)),
                    DescriptorInfo::Images(image_infos) => write.image_info(image_infos),
                }
            })
            .collect();

        unsafe { allocator.ctx.device.update_descriptor_sets(&writes, &[]) };

        Ok(Self {
            allocator: Arc::clone(allocator),
            pool,
            descriptor_set,
            set_index,
        })
    }
}

impl BindingGroup for VulkanBindingGroup {
    fn set_index(&self) -> u32 {
        self.set_index
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBindingGroup {
    fn drop(&mut self) {
        self.allocator.free(self.pool, self.descriptor_set);
    }
}
