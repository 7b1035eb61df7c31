//! Engine and renderer configuration

/// Top-level engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker threads of the task scheduler (0 = one per core)
    pub worker_threads: usize,
    pub renderer: RendererConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            renderer: RendererConfig::default(),
        }
    }
}

/// Renderer configuration
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// G-buffer size relative to the swapchain extent
    pub gbuf_scale: f64,
    pub shadow: ShadowConfig,
    /// Model used in place of one that failed to load
    pub fallback_model_path: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            app_name: "Mirinae Application".to_string(),
            app_version: (1, 0, 0),
            enable_validation: cfg!(debug_assertions),
            gbuf_scale: 1.25,
            shadow: ShadowConfig::default(),
            fallback_model_path: "Sung/missing_static_mdl.dun/missing_static_mdl.dmd".to_string(),
        }
    }
}

/// Shadow map pool sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowConfig {
    /// Directional light shadow slots
    pub dlight_slots: usize,
    /// Edge length of a directional shadow map (4 cascades as quadrants)
    pub dlight_resolution: u32,
    /// Spot light shadow slots
    pub slight_slots: usize,
    pub slight_resolution: u32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            dlight_slots: 2,
            dlight_resolution: 4096,
            slight_slots: 3,
            slight_resolution: 512,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
