//! Unit tests for the Engine context and its logging API
//!
//! IMPORTANT: the logger is process-wide. Tests that install a logger are
//! marked #[serial], and the test logger only keeps entries from sources it
//! is told about since other tests keep logging in parallel.

use std::sync::{Arc, Mutex};
use serial_test::serial;
use crate::config::EngineConfig;
use crate::cosmos::{StandardCamera, Transform};
use crate::device::mock_device::{MockDevice, MockShaderProvider};
use crate::device::GraphicsDevice;
use crate::error::Error;
use crate::log::{LogEntry, LogSeverity, Logger};
use crate::model::ModelCache;
use super::Engine;

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Test logger that captures log entries from matching sources
struct TestLogger {
    sources: Vec<&'static str>,
    entries: Arc<Mutex<Vec<String>>>,
}

impl TestLogger {
    fn new(sources: &[&'static str]) -> Self {
        Self {
            sources: sources.to_vec(),
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        if self.sources.iter().any(|s| entry.source == *s) {
            let mut entries = self.entries.lock().unwrap();
            entries.push(format!("{:?}: {}", entry.severity, entry.message));
        }
    }
}

fn small_config() -> EngineConfig {
    EngineConfig { worker_threads: 2, ..EngineConfig::default() }
}

fn attach_mock_renderer(engine: &mut Engine) -> Arc<MockDevice> {
    let device = Arc::new(MockDevice::new());
    let dyn_device: Arc<dyn GraphicsDevice> = device.clone();
    let swapchain = Box::new(device.create_swapchain(64, 48));
    engine
        .create_renderer(dyn_device, swapchain, Arc::new(MockShaderProvider), Arc::new(ModelCache::new()))
        .unwrap();
    device
}

// ============================================================================
// ENGINE CONTEXT TESTS
// ============================================================================

#[test]
fn test_engine_new_starts_workers() {
    let engine = Engine::new(small_config()).unwrap();
    assert_eq!(engine.scheduler().worker_count(), 2);
    assert!(engine.renderer().is_none());
    assert!(engine.cosmos().main_camera().is_none());
}

#[test]
fn test_do_frame_without_renderer_is_ok() {
    let mut engine = Engine::new(small_config()).unwrap();
    engine.do_frame().unwrap();
    engine.do_frame().unwrap();
    assert!(engine.cosmos().dt() >= 0.0);
}

#[test]
fn test_do_frame_submits_and_presents() {
    let mut engine = Engine::new(small_config()).unwrap();
    let device = attach_mock_renderer(&mut engine);
    engine.cosmos_mut().spawn_camera(StandardCamera::default(), Transform::new());

    engine.do_frame().unwrap();
    engine.do_frame().unwrap();

    let events = device.events();
    assert_eq!(events.iter().filter(|e| e.starts_with("submit:")).count(), 2);
    assert!(events.contains(&"present:0".to_string()));
    assert!(events.contains(&"present:1".to_string()));
}

#[test]
fn test_notify_window_resize_reaches_renderer() {
    let mut engine = Engine::new(small_config()).unwrap();
    let device = attach_mock_renderer(&mut engine);
    engine.cosmos_mut().spawn_camera(StandardCamera::default(), Transform::new());

    engine.notify_window_resize(128, 96);
    engine.do_frame().unwrap();
    assert!(device.events().contains(&"swapchain_recreate:128x96".to_string()));
}

#[test]
fn test_destroy_renderer_allows_new_one() {
    let mut engine = Engine::new(small_config()).unwrap();
    let device = attach_mock_renderer(&mut engine);
    engine.destroy_renderer();
    assert!(engine.renderer().is_none());
    assert!(device.events().contains(&"wait_idle".to_string()));

    attach_mock_renderer(&mut engine);
    assert!(engine.renderer().is_some());
}

#[test]
#[serial]
fn test_duplicate_renderer_fails_and_is_logged() {
    let test_logger = TestLogger::new(&["mirinae::Engine"]);
    let entries_ref = test_logger.entries.clone();
    Engine::set_logger(test_logger);

    let mut engine = Engine::new(small_config()).unwrap();
    attach_mock_renderer(&mut engine);
    let device = MockDevice::new();
    let result = engine.create_renderer(
        Arc::new(MockDevice::new()),
        Box::new(device.create_swapchain(64, 48)),
        Arc::new(MockShaderProvider),
        Arc::new(ModelCache::new()),
    );
    Engine::reset_logger();

    assert!(matches!(result, Err(Error::InitializationFailed(_))));
    let entries = entries_ref.lock().unwrap();
    assert!(entries.iter().any(|e| e.starts_with("Error") && e.contains("already exists")));
}

// ============================================================================
// LOGGING API TESTS
// ============================================================================

#[test]
#[serial]
fn test_default_logger_logs_without_panic() {
    Engine::reset_logger();

    // Default logger should work without explicit setup
    Engine::log(LogSeverity::Info, "engine_test", "Test message".to_string());
    Engine::log(LogSeverity::Error, "engine_test", "Error message".to_string());
    Engine::log(LogSeverity::Warn, "engine_test", "Warning message".to_string());
}

#[test]
#[serial]
fn test_set_custom_logger() {
    let test_logger = TestLogger::new(&["engine_test"]);
    let entries_ref = test_logger.entries.clone();
    Engine::set_logger(test_logger);

    Engine::log(LogSeverity::Info, "engine_test", "Message 1".to_string());
    Engine::log(LogSeverity::Warn, "engine_test", "Message 2".to_string());
    Engine::reset_logger();

    let entries = entries_ref.lock().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].contains("Info"));
    assert!(entries[0].contains("Message 1"));
    assert!(entries[1].contains("Warn"));
    assert!(entries[1].contains("Message 2"));
}

#[test]
#[serial]
fn test_reset_logger_to_default() {
    let test_logger = TestLogger::new(&["engine_test"]);
    let entries_ref = test_logger.entries.clone();
    Engine::set_logger(test_logger);

    Engine::reset_logger();
    Engine::log(LogSeverity::Info, "engine_test", "After reset".to_string());

    // Custom logger should NOT receive this message (default logger is active)
    assert_eq!(entries_ref.lock().unwrap().len(), 0);
}

#[test]
#[serial]
fn test_log_detailed_with_file_line() {
    let entries = Arc::new(Mutex::new(Vec::new()));

    struct LocationLogger(Arc<Mutex<Vec<(Option<&'static str>, Option<u32>)>>>);
    impl Logger for LocationLogger {
        fn log(&self, entry: &LogEntry) {
            if entry.source == "engine_test" {
                self.0.lock().unwrap().push((entry.file, entry.line));
            }
        }
    }

    Engine::set_logger(LocationLogger(entries.clone()));
    Engine::log_detailed(LogSeverity::Error, "engine_test", "Detailed error".to_string(), "test.rs", 42);
    Engine::log(LogSeverity::Error, "engine_test", "Plain error".to_string());
    Engine::reset_logger();

    let entries = entries.lock().unwrap();
    assert_eq!(entries.as_slice(), &[(Some("test.rs"), Some(42)), (None, None)]);
}

#[test]
#[serial]
fn test_macros_route_through_engine_logger() {
    let test_logger = TestLogger::new(&["engine_test"]);
    let entries_ref = test_logger.entries.clone();
    Engine::set_logger(test_logger);

    crate::engine_trace!("engine_test", "Trace {}", 1);
    crate::engine_debug!("engine_test", "Debug {}", 2);
    crate::engine_info!("engine_test", "Info {}", 3);
    crate::engine_warn!("engine_test", "Warn {}", 4);
    crate::engine_error!("engine_test", "Error {}", 5);
    Engine::reset_logger();

    let entries = entries_ref.lock().unwrap();
    assert_eq!(
        *entries,
        vec!["Trace: Trace 1", "Debug: Debug 2", "Info: Info 3", "Warn: Warn 4", "Error: Error 5"]
    );
}
