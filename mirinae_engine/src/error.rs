//! Error types for the Mirinae engine
//!
//! This module defines the error types used throughout the engine,
//! including device access, frame orchestration, and resource bookkeeping.

use std::fmt;

/// Result type for Mirinae engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Mirinae engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan, mock device, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (image, framebuffer, render target record, etc.)
    InvalidResource(String),

    /// Initialization failed (engine, renderer, passes)
    InitializationFailed(String),

    /// The presentation surface no longer matches the swapchain.
    ///
    /// Returned by acquire/present. The frame loop turns it into a deferred
    /// resize instead of propagating it.
    SurfaceOutOfDate,

    /// A task graph contains a dependency cycle
    GraphCycle(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::SurfaceOutOfDate => write!(f, "Surface out of date"),
            Error::GraphCycle(msg) => write!(f, "Task graph cycle: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
