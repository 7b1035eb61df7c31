/// GPU/CPU synchronization primitives

use std::any::Any;
use crate::error::Result;

/// GPU-GPU synchronization (queue submit and present ordering)
pub trait Semaphore: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// GPU-CPU synchronization
pub trait Fence: Send + Sync {
    /// Block until signaled
    fn wait(&self) -> Result<()>;

    /// Return to the unsignaled state
    fn reset(&self) -> Result<()>;

    fn is_signaled(&self) -> Result<bool>;

    fn as_any(&self) -> &dyn Any;
}
