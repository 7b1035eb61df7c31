/// VulkanPipeline - graphics and compute pipelines
///
/// Descriptor set layouts come from the explicit `BindingGroupLayoutDesc`s
/// of the pipeline descriptor, one per set index. Viewport and scissor are
/// dynamic state.

use ash::vk;
use std::any::Any;
use std::ffi::CString;
use std::io::Cursor;
use std::sync::Arc;
use mirinae_engine::device::{
    BindingGroupLayoutDesc, ComputePipelineDesc, Pipeline, PipelineDesc, PipelineKind,
    PushConstantRange, ShaderCode,
};
use mirinae_engine::mirinae::{Error, Result};
use mirinae_engine::{engine_bail, engine_err};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    binding_type_to_vk, blend_factor_to_vk, compare_op_to_vk, cull_mode_to_vk, front_face_to_vk,
    shader_stage_to_vk, shader_stages_to_vk, stage_flags_to_vk, topology_to_vk,
    vertex_format_to_vk,
};
use crate::vulkan_render_pass::VulkanRenderPass;

pub struct VulkanPipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) layout: vk::PipelineLayout,
    pub(crate) set_layouts: Vec<vk::DescriptorSetLayout>,
    /// Layout descriptions, indexed by set index
    pub(crate) binding_layouts: Vec<BindingGroupLayoutDesc>,
    kind: PipelineKind,
}

impl VulkanPipeline {
    pub(crate) fn bind_point(&self) -> vk::PipelineBindPoint {
        match self.kind {
            PipelineKind::Graphics => vk::PipelineBindPoint::GRAPHICS,
            PipelineKind::Compute => vk::PipelineBindPoint::COMPUTE,
        }
    }

    pub(crate) fn new_graphics(ctx: Arc<GpuContext>, desc: &PipelineDesc) -> Result<Self> {
        let Some(render_pass) = desc.render_pass.as_any().downcast_ref::<VulkanRenderPass>() else {
            engine_bail!("mirinae::vulkan::Pipeline", "Pipeline '{}': render pass is not a Vulkan render pass", desc.name);
        };
        if desc.color_blend.len() != render_pass.color_count {
            engine_bail!(
                "mirinae::vulkan::Pipeline",
                "Pipeline '{}': {} blend states for {} color attachments",
                desc.name, desc.color_blend.len(), render_pass.color_count
            );
        }

        let (layout, set_layouts) =
            create_layout(&ctx, &desc.name, &desc.binding_layouts, &desc.push_constant_ranges)?;

        let mut modules = Vec::with_capacity(2);
        let created = build_graphics(&ctx, desc, render_pass.render_pass, layout, &mut modules);
        for module in modules {
            unsafe { ctx.device.destroy_shader_module(module, None) };
        }
        let pipeline = match created {
            Ok(pipeline) => pipeline,
            Err(e) => {
                destroy_layout(&ctx, layout, &set_layouts);
                return Err(e);
            }
        };

        Ok(Self {
            ctx,
            pipeline,
            layout,
            set_layouts,
            binding_layouts: desc.binding_layouts.clone(),
            kind: PipelineKind::Graphics,
        })
    }

    pub(crate) fn new_compute(ctx: Arc<GpuContext>, desc: &ComputePipelineDesc) -> Result<Self> {
        let (layout, set_layouts) =
            create_layout(&ctx, &desc.name, &desc.binding_layouts, &desc.push_constant_ranges)?;

        let created = (|| {
            let module = create_shader_module(&ctx, &desc.shader)?;
            let entry_point = entry_point_name(&desc.shader)?;
            let stage = vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::COMPUTE)
                .module(module)
                .name(&entry_point);
            let create_info = vk::ComputePipelineCreateInfo::default().stage(stage).layout(layout);

            let result = unsafe {
                ctx.device.create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
            };
            unsafe { ctx.device.destroy_shader_module(module, None) };
            result
                .map(|pipelines| pipelines[0])
                .map_err(|(_, e)| engine_err!("mirinae::vulkan::Pipeline", "Failed to create compute pipeline '{}': {:?}", desc.name, e))
        })();

        let pipeline = match created {
            Ok(pipeline) => pipeline,
            Err(e) => {
                destroy_layout(&ctx, layout, &set_layouts);
                return Err(e);
            }
        };

        Ok(Self {
            ctx,
            pipeline,
            layout,
            set_layouts,
            binding_layouts: desc.binding_layouts.clone(),
            kind: PipelineKind::Compute,
        })
    }
}

fn create_shader_module(ctx: &GpuContext, shader: &ShaderCode) -> Result<vk::ShaderModule> {
    let code = ash::util::read_spv(&mut Cursor::new(&shader.code)).map_err(|e| {
        engine_err!("mirinae::vulkan::Pipeline", "Invalid SPIR-V for {:?} shader: {}", shader.stage, e)
    })?;
    let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
    unsafe { ctx.device.create_shader_module(&create_info, None) }
        .map_err(|e| engine_err!("mirinae::vulkan::Pipeline", "Failed to create shader module: {:?}", e))
}

fn entry_point_name(shader: &ShaderCode) -> Result<CString> {
    CString::new(shader.entry_point.as_str())
        .map_err(|_| Error::InvalidResource(format!("entry point '{}' contains a NUL byte", shader.entry_point)))
}

fn create_layout(
    ctx: &GpuContext,
    name: &str,
    binding_layouts: &[BindingGroupLayoutDesc],
    push_constant_ranges: &[PushConstantRange],
) -> Result<(vk::PipelineLayout, Vec<vk::DescriptorSetLayout>)> {
    let mut set_layouts = Vec::with_capacity(binding_layouts.len());
    for layout_desc in binding_layouts {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = layout_desc
            .entries
            .iter()
            .map(|entry| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(entry.binding)
                    .descriptor_type(binding_type_to_vk(entry.binding_type))
                    .descriptor_count(entry.count)
                    .stage_flags(stage_flags_to_vk(entry.stage_flags))
            })
            .collect();
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

        match unsafe { ctx.device.create_descriptor_set_layout(&create_info, None) } {
            Ok(set_layout) => set_layouts.push(set_layout),
            Err(e) => {
                destroy_layout(ctx, vk::PipelineLayout::null(), &set_layouts);
                engine_bail!("mirinae::vulkan::Pipeline", "Failed to create descriptor set layout for '{}': {:?}", name, e);
            }
        }
    }

    let push_constants: Vec<vk::PushConstantRange> = push_constant_ranges
        .iter()
        .map(|range| vk::PushConstantRange {
            stage_flags: shader_stages_to_vk(&range.stages),
            offset: range.offset,
            size: range.size,
        })
        .collect();

    let create_info = vk::PipelineLayoutCreateInfo::default()
        .set_layouts(&set_layouts)
        .push_constant_ranges(&push_constants);

    match unsafe { ctx.device.create_pipeline_layout(&create_info, None) } {
        Ok(layout) => Ok((layout, set_layouts)),
        Err(e) => {
            destroy_layout(ctx, vk::PipelineLayout::null(), &set_layouts);
            Err(engine_err!("mirinae::vulkan::Pipeline", "Failed to create pipeline layout for '{}': {:?}", name, e))
        }
    }
}

fn destroy_layout(ctx: &GpuContext, layout: vk::PipelineLayout, set_layouts: &[vk::DescriptorSetLayout]) {
    unsafe {
        if layout != vk::PipelineLayout::null() {
            ctx.device.destroy_pipeline_layout(layout, None);
        }
        for &set_layout in set_layouts {
            ctx.device.destroy_descriptor_set_layout(set_layout, None);
        }
    }
}

/// Created shader modules are pushed to `modules` so the caller can destroy
/// them whether or not pipeline creation succeeded.
fn build_graphics(
    ctx: &GpuContext,
    desc: &PipelineDesc,
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
    modules: &mut Vec<vk::ShaderModule>,
) -> Result<vk::Pipeline> {
    let shaders: Vec<&ShaderCode> = std::iter::once(&desc.vertex_shader)
        .chain(desc.fragment_shader.as_ref())
        .collect();
    let mut entry_points = Vec::with_capacity(shaders.len());
    for shader in &shaders {
        modules.push(create_shader_module(ctx, shader)?);
        entry_points.push(entry_point_name(shader)?);
    }
    let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = shaders
        .iter()
        .zip(modules.iter())
        .zip(entry_points.iter())
        .map(|((shader, module), entry_point)| {
            vk::PipelineShaderStageCreateInfo::default()
                .stage(shader_stage_to_vk(shader.stage))
                .module(*module)
                .name(entry_point)
        })
        .collect();

    let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc
        .vertex_layout
        .bindings
        .iter()
        .map(|binding| vk::VertexInputBindingDescription {
            binding: binding.binding,
            stride: binding.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        })
        .collect();
    let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
        .vertex_layout
        .attributes
        .iter()
        .map(|attribute| vk::VertexInputAttributeDescription {
            location: attribute.location,
            binding: attribute.binding,
            format: vertex_format_to_vk(attribute.format),
            offset: attribute.offset,
        })
        .collect();
    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&vertex_bindings)
        .vertex_attribute_descriptions(&vertex_attributes);

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(topology_to_vk(desc.topology))
        .primitive_restart_enable(false);

    // Dynamic, counts only
    let viewports = [vk::Viewport::default()];
    let scissors = [vk::Rect2D::default()];
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewports(&viewports)
        .scissors(&scissors);

    let raster = &desc.rasterization;
    let mut rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(raster.depth_clamp)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(cull_mode_to_vk(raster.cull_mode))
        .front_face(front_face_to_vk(raster.front_face));
    if let Some(bias) = raster.depth_bias {
        rasterization_state = rasterization_state
            .depth_bias_enable(true)
            .depth_bias_constant_factor(bias.constant_factor)
            .depth_bias_slope_factor(bias.slope_factor)
            .depth_bias_clamp(bias.clamp);
    }

    let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(desc.depth.test_enable)
        .depth_write_enable(desc.depth.write_enable)
        .depth_compare_op(compare_op_to_vk(desc.depth.compare_op))
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = desc
        .color_blend
        .iter()
        .map(|blend| {
            let attachment = vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(blend.blend_enable);
            if !blend.blend_enable {
                return attachment;
            }
            attachment
                .src_color_blend_factor(blend_factor_to_vk(blend.src_factor))
                .dst_color_blend_factor(blend_factor_to_vk(blend.dst_factor))
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(blend_factor_to_vk(blend.src_factor))
                .dst_alpha_blend_factor(blend_factor_to_vk(blend.dst_factor))
                .alpha_blend_op(vk::BlendOp::ADD)
        })
        .collect();
    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&blend_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let create_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .depth_stencil_state(&depth_stencil_state)
        .multisample_state(&multisample_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipelines = unsafe {
        ctx.device.create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
    }
    .map_err(|(_, e)| engine_err!("mirinae::vulkan::Pipeline", "Failed to create graphics pipeline '{}': {:?}", desc.name, e))?;

    Ok(pipelines[0])
}

impl Pipeline for VulkanPipeline {
    fn kind(&self) -> PipelineKind {
        self.kind
    }

    fn binding_layout_count(&self) -> u32 {
        self.binding_layouts.len() as u32
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
        destroy_layout(&self.ctx, self.layout, &self.set_layouts);
    }
}
