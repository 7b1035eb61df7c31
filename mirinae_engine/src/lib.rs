/*!
# Mirinae Engine

Core of the Mirinae deferred renderer.

The crate is backend-agnostic: every GPU object is reached through the traits
in [`device`], and a backend crate (Vulkan) provides the implementations.
Scene data lives in an ECS world, and each frame runs as a task graph on a
worker pool.

## Architecture

- **Engine**: owns the scheduler, the cosmos and the renderer
- **Cosmos**: ECS world with cameras, lights and model actors
- **TaskGraph / TaskScheduler**: dependency-ordered frame tasks
- **Renderer**: frame synchronization, swapchain, render passes
- **Render passes**: gbuf, shadow, compo (dlight / slight), bloom, fillscreen, debug
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod device;
pub mod frame;
pub mod task;
pub mod cosmos;
pub mod model;
pub mod input;
pub mod render;
pub mod renderer;

// Main mirinae namespace module
pub mod mirinae {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine context
    pub use crate::engine::Engine;

    pub use crate::config::{EngineConfig, RendererConfig, ShadowConfig};

    pub use crate::renderer::{build_render_stage, RenderStage, Renderer};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Scene sub-module
    pub mod cosmos {
        pub use crate::cosmos::*;
    }

    // Task sub-module
    pub mod task {
        pub use crate::task::*;
    }
}

// Re-export math and ECS libraries at crate root
pub use glam;
pub use hecs;
