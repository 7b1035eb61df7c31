//! Unit tests for error.rs
//!
//! Tests all Error variants and their implementations (Display, Debug, Clone, std::error::Error).

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkQueueSubmit failed".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("vkQueueSubmit failed"));
}

#[test]
fn test_out_of_memory_display() {
    assert_eq!(format!("{}", Error::OutOfMemory), "Out of GPU memory");
}

#[test]
fn test_invalid_resource_display() {
    let err = Error::InvalidResource("bloom:downsamples_f#0".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Invalid resource"));
    assert!(display.contains("bloom:downsamples_f#0"));
}

#[test]
fn test_surface_out_of_date_display() {
    assert_eq!(format!("{}", Error::SurfaceOutOfDate), "Surface out of date");
}

#[test]
fn test_graph_cycle_display() {
    let err = Error::GraphCycle("a -> b -> a".to_string());
    assert!(format!("{}", err).contains("a -> b -> a"));
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_debug() {
    let debug = format!("{:?}", Error::InitializationFailed("init".to_string()));
    assert!(debug.contains("InitializationFailed"));
    assert!(format!("{:?}", Error::SurfaceOutOfDate).contains("SurfaceOutOfDate"));
}

#[test]
fn test_error_clone_and_eq() {
    let err = Error::BackendError("test".to_string());
    assert_eq!(err.clone(), err);
    assert_ne!(err, Error::OutOfMemory);
}

// ============================================================================
// RESULT ALIAS
// ============================================================================

fn fails() -> Result<u32> {
    Err(Error::SurfaceOutOfDate)
}

fn propagates() -> Result<u32> {
    let value = fails()?;
    Ok(value + 1)
}

#[test]
fn test_result_propagation() {
    assert_eq!(propagates(), Err(Error::SurfaceOutOfDate));
}
