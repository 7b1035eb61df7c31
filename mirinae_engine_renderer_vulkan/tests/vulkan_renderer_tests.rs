//! GPU tests for the Vulkan backend
//!
//! Every test needs a GPU and a display, so all of them are ignored by
//! default. They share the windowing system and run serially.
//!
//! Run with: cargo test -p mirinae_engine_renderer_vulkan --test vulkan_renderer_tests -- --ignored

use std::sync::Arc;
use mirinae_engine::device::{
    AttachmentDesc, BufferDesc, BufferUsage, ClearValue, Extent2D, FramebufferDesc,
    GraphicsDevice, ImageBarrier, ImageDesc, ImageFormat, ImageLayout, ImageState, ImageUsage,
    LoadOp, PipelineStages, RenderPassDesc, StoreOp, Submission, Swapchain,
};
use mirinae_engine::mirinae::{Error, RendererConfig};
use mirinae_engine_renderer_vulkan::VulkanDevice;
use serial_test::serial;
use winit::event_loop::EventLoop;
use winit::window::Window;

/// Helper to create a hidden test window
#[allow(deprecated)]
fn create_test_window() -> (Window, EventLoop<()>) {
    let event_loop = EventLoop::new().unwrap();
    let window_attrs = Window::default_attributes()
        .with_title("Mirinae Vulkan Test")
        .with_inner_size(winit::dpi::PhysicalSize::new(800, 600))
        .with_visible(false);
    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}

fn test_config() -> RendererConfig {
    RendererConfig {
        app_name: "mirinae_vulkan_tests".to_string(),
        ..Default::default()
    }
}

fn color_pass_desc(format: ImageFormat) -> RenderPassDesc {
    RenderPassDesc {
        name: "test_color".to_string(),
        color_attachments: vec![AttachmentDesc {
            format,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            initial_layout: ImageLayout::ColorAttachment,
            final_layout: ImageLayout::ColorAttachment,
        }],
        depth_attachment: None,
    }
}

// ============================================================================
// RESOURCE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_create_color_image() {
    let (window, _event_loop) = create_test_window();
    let device = VulkanDevice::new(&window, &test_config()).unwrap();
    let formats = device.image_formats();

    let image = device
        .create_image(&ImageDesc {
            name: "color".to_string(),
            width: 256,
            height: 128,
            format: formats.rgba_hdr,
            usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED,
            array_layers: 1,
        })
        .unwrap();

    let info = image.info();
    assert_eq!(info.width, 256);
    assert_eq!(info.height, 128);
    assert_eq!(info.format, formats.rgba_hdr);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_create_layered_depth_image() {
    let (window, _event_loop) = create_test_window();
    let device = VulkanDevice::new(&window, &test_config()).unwrap();
    let depth = device.image_formats().depth;
    assert!(depth.is_depth());

    let image = device
        .create_image(&ImageDesc {
            name: "shadow_array".to_string(),
            width: 512,
            height: 512,
            format: depth,
            usage: ImageUsage::DEPTH_ATTACHMENT | ImageUsage::SAMPLED,
            array_layers: 4,
        })
        .unwrap();
    assert_eq!(image.info().array_layers, 4);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_zero_sized_image_rejected() {
    let (window, _event_loop) = create_test_window();
    let device = VulkanDevice::new(&window, &test_config()).unwrap();

    let result = device.create_image(&ImageDesc {
        name: "empty".to_string(),
        width: 0,
        height: 64,
        format: ImageFormat::R8G8B8A8_UNORM,
        usage: ImageUsage::SAMPLED,
        array_layers: 1,
    });
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_buffer_update_and_bounds() {
    let (window, _event_loop) = create_test_window();
    let device = VulkanDevice::new(&window, &test_config()).unwrap();

    let buffer = device
        .create_buffer(&BufferDesc {
            name: "ubuf".to_string(),
            size: 64,
            usage: BufferUsage::Uniform,
        })
        .unwrap();
    assert_eq!(buffer.size(), 64);

    assert!(buffer.update(0, &[1u8; 64]).is_ok());
    assert!(buffer.update(48, &[2u8; 16]).is_ok());
    assert!(buffer.update(60, &[3u8; 8]).is_err());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_render_pass_and_framebuffer() {
    let (window, _event_loop) = create_test_window();
    let device = VulkanDevice::new(&window, &test_config()).unwrap();
    let format = device.image_formats().rgba_unorm;

    let render_pass = device.create_render_pass(&color_pass_desc(format)).unwrap();
    let image = device
        .create_image(&ImageDesc {
            name: "target".to_string(),
            width: 320,
            height: 240,
            format,
            usage: ImageUsage::COLOR_ATTACHMENT,
            array_layers: 1,
        })
        .unwrap();

    let framebuffer = device
        .create_framebuffer(&FramebufferDesc {
            render_pass: render_pass.clone(),
            attachments: vec![image.clone()],
            width: 320,
            height: 240,
        })
        .unwrap();
    assert_eq!((framebuffer.width(), framebuffer.height()), (320, 240));

    // Larger than its attachment
    let too_big = device.create_framebuffer(&FramebufferDesc {
        render_pass,
        attachments: vec![image],
        width: 640,
        height: 480,
    });
    assert!(too_big.is_err());
}

// ============================================================================
// SYNCHRONIZATION AND SUBMISSION TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_fence_states() {
    let (window, _event_loop) = create_test_window();
    let device = VulkanDevice::new(&window, &test_config()).unwrap();

    let fence = device.create_fence(true).unwrap();
    assert!(fence.is_signaled().unwrap());
    fence.wait().unwrap();
    fence.reset().unwrap();
    assert!(!fence.is_signaled().unwrap());

    let unsignaled = device.create_fence(false).unwrap();
    assert!(!unsignaled.is_signaled().unwrap());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_record_and_submit_clear_pass() {
    let (window, _event_loop) = create_test_window();
    let device = VulkanDevice::new(&window, &test_config()).unwrap();
    let format = device.image_formats().rgba_unorm;

    let render_pass = device.create_render_pass(&color_pass_desc(format)).unwrap();
    let image = device
        .create_image(&ImageDesc {
            name: "target".to_string(),
            width: 64,
            height: 64,
            format,
            usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED,
            array_layers: 1,
        })
        .unwrap();
    let framebuffer = device
        .create_framebuffer(&FramebufferDesc {
            render_pass: render_pass.clone(),
            attachments: vec![image.clone()],
            width: 64,
            height: 64,
        })
        .unwrap();

    let mut pool = device.create_command_pool().unwrap();
    let cmdbufs = pool.allocate(2).unwrap();
    assert_eq!(cmdbufs.len(), 2);
    {
        let mut cmd = cmdbufs[0].lock().unwrap();
        cmd.begin().unwrap();
        cmd.begin_label("clear").unwrap();
        cmd.pipeline_barrier(&[ImageBarrier::whole(
            image.clone(),
            ImageState::UNDEFINED,
            ImageState::COLOR_ATTACHMENT_WRITE,
        )])
        .unwrap();
        cmd.begin_render_pass(
            &render_pass,
            &framebuffer,
            &[ClearValue::Color([0.1, 0.2, 0.3, 1.0])],
            Extent2D::new(64, 64),
        )
        .unwrap();
        // Render passes do not nest
        assert!(cmd
            .begin_render_pass(&render_pass, &framebuffer, &[], Extent2D::new(64, 64))
            .is_err());
        cmd.end_render_pass().unwrap();
        cmd.pipeline_barrier(&[ImageBarrier::whole(
            image.clone(),
            ImageState::COLOR_ATTACHMENT_WRITE,
            ImageState::SHADER_READ_FRAGMENT,
        )])
        .unwrap();
        cmd.end_label().unwrap();
        cmd.end().unwrap();
    }

    let fence = device.create_fence(false).unwrap();
    device
        .submit(&Submission {
            command_buffers: &cmdbufs[..1],
            wait: None,
            signal: None,
            fence: Some(fence.as_ref()),
        })
        .unwrap();
    fence.wait().unwrap();
    assert!(fence.is_signaled().unwrap());

    // Buffers are reusable after a pool reset
    pool.reset().unwrap();
    let mut cmd = cmdbufs[0].lock().unwrap();
    cmd.begin().unwrap();
    cmd.end().unwrap();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_commands_rejected_outside_recording() {
    let (window, _event_loop) = create_test_window();
    let device = VulkanDevice::new(&window, &test_config()).unwrap();

    let mut pool = device.create_command_pool().unwrap();
    let cmdbufs = pool.allocate(1).unwrap();
    let mut cmd = cmdbufs[0].lock().unwrap();
    assert!(cmd.end().is_err());
    assert!(cmd.draw(3, 0).is_err());

    cmd.begin().unwrap();
    assert!(cmd.begin().is_err());
    // Draws need an active render pass
    assert!(cmd.draw(3, 0).is_err());
    cmd.end().unwrap();
}

// ============================================================================
// SWAPCHAIN TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_swapchain_acquire_and_present() {
    let (window, _event_loop) = create_test_window();
    let device = Arc::new(VulkanDevice::new(&window, &test_config()).unwrap());
    let mut swapchain = device.create_swapchain(&window, 800, 600).unwrap();

    assert!(swapchain.image_count() >= 2);
    assert!(swapchain.width() > 0 && swapchain.height() > 0);
    let image = swapchain.image(0);
    assert_eq!(image.info().format, swapchain.format());

    let acquired = device.create_semaphore().unwrap();
    let rendered = device.create_semaphore().unwrap();
    let fence = device.create_fence(false).unwrap();

    let index = match swapchain.acquire_next_image(acquired.as_ref()) {
        Ok(index) => index,
        // Hidden windows may report an out of date surface on some platforms
        Err(Error::SurfaceOutOfDate) => return,
        Err(e) => panic!("acquire failed: {}", e),
    };
    let target = swapchain.image(index.get());

    let mut pool = device.create_command_pool().unwrap();
    let cmdbufs = pool.allocate(1).unwrap();
    {
        let mut cmd = cmdbufs[0].lock().unwrap();
        cmd.begin().unwrap();
        cmd.pipeline_barrier(&[ImageBarrier::whole(target, ImageState::UNDEFINED, ImageState::PRESENT)])
            .unwrap();
        cmd.end().unwrap();
    }

    device
        .submit(&Submission {
            command_buffers: &cmdbufs,
            wait: Some((acquired.as_ref(), PipelineStages::COLOR_ATTACHMENT_OUTPUT)),
            signal: Some(rendered.as_ref()),
            fence: Some(fence.as_ref()),
        })
        .unwrap();

    match swapchain.present(index, rendered.as_ref()) {
        Ok(()) | Err(Error::SurfaceOutOfDate) => {}
        Err(e) => panic!("present failed: {}", e),
    }
    fence.wait().unwrap();
    device.wait_idle().unwrap();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_swapchain_recreate() {
    let (window, _event_loop) = create_test_window();
    let device = VulkanDevice::new(&window, &test_config()).unwrap();
    let mut swapchain = device.create_swapchain(&window, 800, 600).unwrap();

    let before = swapchain.image(0);
    swapchain.recreate(640, 480).unwrap();
    assert!(swapchain.image_count() >= 2);
    // Old images stay valid objects until their last user drops them
    assert!(before.info().width > 0);
    drop(before);
    device.wait_idle().unwrap();
}
