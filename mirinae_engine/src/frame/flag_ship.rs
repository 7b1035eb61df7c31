/// Cross-task renderer flags

use std::sync::atomic::{AtomicBool, Ordering};

/// Framebuffers narrower or shorter than this are not rendered to
const MIN_FBUF_EXTENT: u32 = 5;

/// True when a surface is too small to be worth rendering (minimized window)
pub fn is_fbuf_too_small(width: u32, height: u32) -> bool {
    width < MIN_FBUF_EXTENT || height < MIN_FBUF_EXTENT
}

/// Flags shared by the frame tasks
///
/// `need_resize` is raised by any task that observes a stale surface and
/// consumed at the top of `render_passes`. `dont_render` is decided by
/// `update_ren_ctxt` and makes the rest of the frame a no-op.
#[derive(Debug, Default)]
pub struct FlagShip {
    need_resize: AtomicBool,
    dont_render: AtomicBool,
}

impl FlagShip {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn need_resize(&self) -> bool {
        self.need_resize.load(Ordering::Acquire)
    }

    pub fn set_need_resize(&self, value: bool) {
        self.need_resize.store(value, Ordering::Release);
    }

    pub fn dont_render(&self) -> bool {
        self.dont_render.load(Ordering::Acquire)
    }

    pub fn set_dont_render(&self, value: bool) {
        self.dont_render.store(value, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "flag_ship_tests.rs"]
mod tests;
