/// Mirinae Engine - owner of the scheduler, the scene and the renderer
///
/// The engine is an explicit context object: create one, hand it a renderer
/// built on a graphics device, then call `do_frame` once per redraw. The log
/// sink is the only process-wide state and is reached through the associated
/// functions `log`, `set_logger` and `reset_logger`.

use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Instant, SystemTime};
use crate::config::EngineConfig;
use crate::cosmos::Cosmos;
use crate::device::{GraphicsDevice, ShaderProvider, Swapchain};
use crate::error::{Error, Result};
use crate::input::{InputProcessor, KeyEvent, MouseEvent, TouchEvent};
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
use crate::model::ModelManager;
use crate::renderer::{build_render_stage, Renderer};
use crate::task::TaskScheduler;

// ===== INTERNAL STATE =====

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

fn logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

// ===== PUBLIC API =====

/// Engine context
///
/// # Example
///
/// ```no_run
/// use mirinae_engine::mirinae::{Engine, EngineConfig};
///
/// let mut engine = Engine::new(EngineConfig::default())?;
/// // engine.create_renderer(device, swapchain, shaders, models)?;
/// engine.do_frame()?;
/// # Ok::<(), mirinae_engine::mirinae::Error>(())
/// ```
pub struct Engine {
    renderer: Option<Renderer>,
    cosmos: Cosmos,
    scheduler: TaskScheduler,
    config: EngineConfig,
    last_frame: Option<Instant>,
}

impl Engine {
    /// Helper to log errors before returning them (internal use)
    fn log_and_return_error(error: Error) -> Error {
        match &error {
            Error::InitializationFailed(msg) => {
                crate::engine_error!("mirinae::Engine", "Initialization failed: {}", msg);
            }
            Error::BackendError(msg) => {
                crate::engine_error!("mirinae::Engine", "Backend error: {}", msg);
            }
            _ => {
                crate::engine_error!("mirinae::Engine", "Engine error: {}", error);
            }
        }
        error
    }

    /// Start the worker pool; the engine has no renderer yet
    pub fn new(config: EngineConfig) -> Result<Self> {
        let scheduler = TaskScheduler::new(config.worker_threads)?;
        crate::engine_info!(
            "mirinae::Engine",
            "Engine initialized with {} worker threads",
            scheduler.worker_count()
        );
        Ok(Self {
            renderer: None,
            cosmos: Cosmos::new(),
            scheduler,
            config,
            last_frame: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub fn cosmos(&self) -> &Cosmos {
        &self.cosmos
    }

    pub fn cosmos_mut(&mut self) -> &mut Cosmos {
        &mut self.cosmos
    }

    /// Create the renderer on `device`, sized to `swapchain`
    ///
    /// # Errors
    ///
    /// Returns an error if a renderer already exists or if any pass fails to
    /// build. Both are logged.
    pub fn create_renderer(
        &mut self,
        device: Arc<dyn GraphicsDevice>,
        swapchain: Box<dyn Swapchain>,
        shaders: Arc<dyn ShaderProvider>,
        models: Arc<dyn ModelManager>,
    ) -> Result<()> {
        if self.renderer.is_some() {
            return Err(Self::log_and_return_error(Error::InitializationFailed(
                "Renderer already exists. Call Engine::destroy_renderer() first.".to_string(),
            )));
        }
        // One command pool slot per worker plus one for this thread
        let thread_count = self.scheduler.worker_count() + 1;
        let renderer = Renderer::new(device, swapchain, shaders, models, &self.config.renderer, thread_count)
            .map_err(Self::log_and_return_error)?;
        self.renderer = Some(renderer);

        crate::engine_info!("mirinae::Engine", "Renderer created");
        Ok(())
    }

    pub fn renderer(&self) -> Option<&Renderer> {
        self.renderer.as_ref()
    }

    pub fn renderer_mut(&mut self) -> Option<&mut Renderer> {
        self.renderer.as_mut()
    }

    /// Drop the renderer after the device went idle
    pub fn destroy_renderer(&mut self) {
        if self.renderer.take().is_some() {
            crate::engine_info!("mirinae::Engine", "Renderer destroyed");
        }
    }

    pub fn notify_window_resize(&self, width: u32, height: u32) {
        if let Some(renderer) = &self.renderer {
            renderer.notify_window_resize(width, height);
        }
    }

    /// Run one frame: the render stage on the workers, then submit and present
    ///
    /// Without a renderer only the frame timer advances.
    pub fn do_frame(&mut self) -> Result<()> {
        let now = Instant::now();
        let dt = self.last_frame.map_or(0.0, |last| now.duration_since(last).as_secs_f64());
        self.last_frame = Some(now);
        self.cosmos.set_dt(dt);

        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };
        {
            let stage = build_render_stage(renderer, &self.cosmos)?;
            let fence = stage.fence;
            self.scheduler.run(stage.graph, |run| run.join(fence))??;
        }
        renderer.do_frame()
    }

    // ===== LOGGING API =====

    /// Set a custom logger
    ///
    /// Replace the default logger with a custom implementation (file logger, network logger, etc.)
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mirinae_engine::mirinae::{Engine, log::{Logger, LogEntry}};
    ///
    /// struct FileLogger;
    /// impl Logger for FileLogger {
    ///     fn log(&self, entry: &LogEntry) {
    ///         // Write to file...
    ///     }
    /// }
    ///
    /// Engine::set_logger(FileLogger);
    /// ```
    pub fn set_logger<L: Logger + 'static>(logger_impl: L) {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(logger_impl);
        }
    }

    /// Reset logger to default (DefaultLogger)
    pub fn reset_logger() {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(DefaultLogger);
        }
    }

    /// Internal logging method (for simple logs without file:line)
    ///
    /// Used by macros like engine_info!, engine_warn!, etc.
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        if let Ok(lock) = logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Internal logging method with file:line information (for ERROR logs)
    ///
    /// Used by engine_error! macro to include source location.
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if let Ok(lock) = logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

impl InputProcessor for Engine {
    fn on_key_event(&mut self, event: &KeyEvent) -> bool {
        self.renderer.as_mut().is_some_and(|r| r.on_key_event(event))
    }

    fn on_text_event(&mut self, c: char) -> bool {
        self.renderer.as_mut().is_some_and(|r| r.on_text_event(c))
    }

    fn on_mouse_event(&mut self, event: &MouseEvent) -> bool {
        self.renderer.as_mut().is_some_and(|r| r.on_mouse_event(event))
    }

    fn on_touch_event(&mut self, event: &TouchEvent) -> bool {
        self.renderer.as_mut().is_some_and(|r| r.on_touch_event(event))
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
