use crate::device::mock_device::MockDevice;
use crate::device::{GraphicsDevice, Image, ImageDesc, ImageFormat, ImageUsage};
use crate::error::Error;
use super::*;

fn fill(device: &MockDevice, image: &RenderImage) {
    image.set(
        device
            .create_image(&ImageDesc {
                name: image.id().to_string(),
                width: 8,
                height: 8,
                format: ImageFormat::R16G16B16A16_SFLOAT,
                usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED,
                array_layers: 1,
            })
            .unwrap(),
    );
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_new_img_prefixes_user_id() {
    let rtm = RenderTargetManager::new();
    let img = rtm.new_img("downsamples_f#0", "bloom_downsample").unwrap();
    assert_eq!(img.id(), "bloom_downsample:downsamples_f#0");
    assert!(rtm.contains("bloom_downsample:downsamples_f#0"));
}

#[test]
fn test_duplicate_new_img_fails() {
    let rtm = RenderTargetManager::new();
    rtm.new_img("a", "p").unwrap();
    assert!(matches!(rtm.new_img("a", "p"), Err(Error::InvalidResource(_))));
    assert_eq!(rtm.len(), 1);
}

#[test]
fn test_reader_of_missing_image_gets_none() {
    let rtm = RenderTargetManager::new();
    assert!(rtm.get_img_reader("nobody:a", "q").is_none());
}

#[test]
fn test_reader_sees_producer_image() {
    let device = MockDevice::new();
    let rtm = RenderTargetManager::new();
    let writer = rtm.new_img("a", "p").unwrap();
    let reader = rtm.get_img_reader("p:a", "q").unwrap();

    assert!(reader.get().is_none());
    fill(&device, &writer);
    assert_eq!(reader.get().unwrap().info().name, "p:a");
}

// ============================================================================
// Release accounting
// ============================================================================

#[test]
fn test_image_outlives_producer_while_read() {
    let device = MockDevice::new();
    let rtm = RenderTargetManager::new();
    let writer = rtm.new_img("A", "P").unwrap();
    fill(&device, &writer);
    let reader = rtm.get_img_reader("P:A", "Q").unwrap();
    drop(writer);
    assert_eq!(device.live.images(), 1);

    rtm.free_img("P:A", "P");
    assert!(rtm.contains("P:A"));
    assert!(reader.get().is_some());
    assert_eq!(device.live.images(), 1);

    rtm.free_img("P:A", "Q");
    assert!(!rtm.contains("P:A"));
    assert!(reader.get().is_none());
    assert_eq!(device.live.images(), 0);

    // Second release of the same id must not touch anything
    rtm.free_img("P:A", "Q");
    assert_eq!(device.live.images(), 0);
}

#[test]
fn test_free_by_unknown_user_is_noop() {
    let rtm = RenderTargetManager::new();
    rtm.new_img("A", "P").unwrap();
    rtm.free_img("P:A", "stranger");
    rtm.free_img("missing", "P");
    assert!(rtm.contains("P:A"));
}

#[test]
fn test_id_is_reusable_after_release() {
    let rtm = RenderTargetManager::new();
    rtm.new_img("A", "P").unwrap();
    rtm.free_img("P:A", "P");
    assert!(rtm.is_empty());
    assert!(rtm.new_img("A", "P").is_ok());
}
