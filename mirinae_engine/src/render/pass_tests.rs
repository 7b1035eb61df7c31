use std::sync::Arc;
use crate::device::mock_device::{MockCommandList, MockDevice, MockShaderProvider};
use crate::device::{
    ColorBlendState, Extent2D, Framebuffer, FramebufferDesc, GraphicsDevice, ImageDesc,
    ImageFormat, ImageLayout, ImageState, ImageUsage, LoadOp, Pipeline, RenderPass, ShaderStage,
};
use crate::error::Error;
use crate::frame::{CmdBufList, FrameIndex, RpCommandPool};
use crate::render::{ImageStateTracker, RpContext};
use super::*;

fn target(device: &MockDevice, name: &str, extent: Extent2D) -> Arc<dyn crate::device::Image> {
    device
        .create_image(&ImageDesc {
            name: name.to_string(),
            width: extent.width,
            height: extent.height,
            format: ImageFormat::R16G16B16A16_SFLOAT,
            usage: ImageUsage::COLOR_ATTACHMENT,
            array_layers: 1,
        })
        .unwrap()
}

fn color_pass(device: &MockDevice) -> RenderPassLifecycle<Arc<dyn Framebuffer>> {
    PassBuilder::new("test_pass")
        .color(ImageFormat::R16G16B16A16_SFLOAT, LoadOp::Clear, ImageLayout::ColorAttachment, ColorBlendState::default())
        .shaders("fill_screen.vert", Some("test.frag"))
        .push_constant(&[ShaderStage::Fragment], 16)
        .build(device, &MockShaderProvider)
        .unwrap()
}

fn rebuild(device: &MockDevice, pass: &mut RenderPassLifecycle<Arc<dyn Framebuffer>>, extent: Extent2D) -> crate::error::Result<()> {
    pass.rebuild(extent, |f, rp, _| {
        device.create_framebuffer(&FramebufferDesc {
            render_pass: rp.clone(),
            attachments: vec![target(device, &format!("t_{}", f), extent)],
            width: extent.width,
            height: extent.height,
        })
    })
}

// ============================================================================
// PassBuilder / RenderPassLifecycle
// ============================================================================

#[test]
fn test_builder_creates_pass_and_pipeline() {
    let device = MockDevice::new();
    let pass = color_pass(&device);
    assert_eq!(pass.name(), "test_pass");
    assert!(pass.frame(FrameIndex::new(0)).is_none());
    assert_eq!(pass.pipeline().binding_layout_count(), 0);
}

#[test]
fn test_rebuild_replaces_frames_without_leaks() {
    let device = MockDevice::new();
    let mut pass = color_pass(&device);

    rebuild(&device, &mut pass, Extent2D::new(100, 50)).unwrap();
    assert_eq!(device.live.framebuffers(), crate::frame::MAX_FRAMES_IN_FLIGHT);

    rebuild(&device, &mut pass, Extent2D::new(300, 200)).unwrap();
    assert_eq!(device.live.framebuffers(), crate::frame::MAX_FRAMES_IN_FLIGHT);
    assert_eq!(device.live.images(), crate::frame::MAX_FRAMES_IN_FLIGHT);
    for fbuf in pass.frames() {
        assert_eq!((fbuf.width(), fbuf.height()), (300, 200));
    }
    assert_eq!(pass.extent(), Extent2D::new(300, 200));
}

#[test]
fn test_failed_rebuild_keeps_old_frames() {
    let device = MockDevice::new();
    let mut pass = color_pass(&device);
    rebuild(&device, &mut pass, Extent2D::new(64, 64)).unwrap();

    let result = pass.rebuild(Extent2D::new(1, 1), |f, _, _| {
        if f.get() == 1 {
            Err(Error::OutOfMemory)
        } else {
            device.create_framebuffer(&FramebufferDesc {
                render_pass: pass_rp(&device),
                attachments: Vec::new(),
                width: 1,
                height: 1,
            })
        }
    });
    assert!(result.is_err());
    assert_eq!(pass.extent(), Extent2D::new(64, 64));
    assert_eq!(pass.frame(FrameIndex::new(0)).unwrap().width(), 64);
}

fn pass_rp(device: &MockDevice) -> Arc<dyn RenderPass> {
    color_pass(device).render_pass().clone()
}

// ============================================================================
// Recording helpers
// ============================================================================

#[test]
fn test_record_with_cmdbuf_orders_barriers_first() {
    let device = MockDevice::new();
    let pool = RpCommandPool::new(&device, 2).unwrap();
    let image = target(&device, "compo", Extent2D::new(8, 8));

    let mut states = ImageStateTracker::new();
    let mut barriers = PendingBarriers::default();
    barriers.overwrite(&mut states, &image, ImageState::COLOR_ATTACHMENT_WRITE);

    let ctxt = RpContext::default();
    let out = RecordedCmdBuf::default();
    record_with_cmdbuf("label", &ctxt, &pool, &barriers, &out, |cmd| cmd.draw(3, 0)).unwrap();

    let list = CmdBufList::new();
    out.collect(&list, ctxt.f_index);
    out.collect(&list, ctxt.f_index);
    assert_eq!(list.len(ctxt.f_index), 1);

    let cmdbuf = list.as_slice(ctxt.f_index)[0].clone();
    let guard = cmdbuf.lock().unwrap();
    let commands = &guard.as_any().downcast_ref::<MockCommandList>().unwrap().commands;
    assert_eq!(
        commands,
        &vec![
            "begin".to_string(),
            "label:label".to_string(),
            "barrier:compo:Undefined->ColorAttachment".to_string(),
            "draw:3".to_string(),
            "end".to_string(),
        ]
    );
}

#[test]
fn test_overwrite_always_starts_from_undefined() {
    let device = MockDevice::new();
    let image = target(&device, "albedo", Extent2D::new(8, 8));
    let mut states = ImageStateTracker::new();
    states.require(&image, ImageState::SHADER_READ_FRAGMENT);

    let mut barriers = PendingBarriers::default();
    barriers.overwrite(&mut states, &image, ImageState::COLOR_ATTACHMENT_WRITE);
    assert_eq!(barriers.as_slice()[0].old, ImageState::UNDEFINED);
}
