use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use winit::keyboard::KeyCode;
use super::*;

struct Recorder {
    name: &'static str,
    consume: bool,
    seen: Arc<Mutex<Vec<&'static str>>>,
}

impl InputProcessor for Recorder {
    fn on_key_event(&mut self, _event: &KeyEvent) -> bool {
        self.seen.lock().unwrap().push(self.name);
        self.consume
    }

    fn on_text_event(&mut self, _c: char) -> bool {
        self.seen.lock().unwrap().push(self.name);
        self.consume
    }
}

fn toggle_counter() -> (Arc<AtomicUsize>, DominantCommandProc) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let proc = DominantCommandProc::new(Box::new(move || {
        c.fetch_add(1, Ordering::SeqCst);
    }));
    (count, proc)
}

// ============================================================================
// InputProcessorMgr
// ============================================================================

#[test]
fn test_chain_stops_at_first_consumer() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut mgr = InputProcessorMgr::new();
    mgr.add(Box::new(Recorder { name: "a", consume: false, seen: seen.clone() }));
    mgr.add(Box::new(Recorder { name: "b", consume: true, seen: seen.clone() }));
    mgr.add(Box::new(Recorder { name: "c", consume: true, seen: seen.clone() }));

    assert!(mgr.on_key_event(&KeyEvent::new(KeyAction::Down, KeyCode::KeyW)));
    assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
}

#[test]
fn test_chain_unconsumed_returns_false() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut mgr = InputProcessorMgr::new();
    mgr.add(Box::new(Recorder { name: "a", consume: false, seen: seen.clone() }));

    assert!(!mgr.on_text_event('x'));
    assert!(!mgr.on_mouse_event(&MouseEvent { action: MouseAction::Move, button: None, x: 1.0, y: 2.0 }));
    assert_eq!(mgr.len(), 1);
}

// ============================================================================
// KeyStateTracker
// ============================================================================

#[test]
fn test_key_tracker_follows_down_and_up() {
    let mut keys = KeyStateTracker::default();
    assert!(!keys.is_pressed(KeyCode::AltLeft));
    assert!(keys.timepoint(KeyCode::AltLeft).is_none());

    keys.notify(&KeyEvent::new(KeyAction::Down, KeyCode::AltLeft));
    assert!(keys.is_pressed(KeyCode::AltLeft));

    keys.notify(&KeyEvent::new(KeyAction::Up, KeyCode::AltLeft));
    assert!(!keys.is_pressed(KeyCode::AltLeft));
    assert!(keys.timepoint(KeyCode::AltLeft).is_some());
}

// ============================================================================
// DominantCommandProc
// ============================================================================

#[test]
fn test_alt_enter_toggles_on_release() {
    let (count, mut proc) = toggle_counter();

    assert!(!proc.on_key_event(&KeyEvent::new(KeyAction::Down, KeyCode::AltLeft)));
    assert!(proc.on_key_event(&KeyEvent::new(KeyAction::Down, KeyCode::Enter)));
    assert_eq!(count.load(Ordering::SeqCst), 0);

    assert!(proc.on_key_event(&KeyEvent::new(KeyAction::Up, KeyCode::Enter)));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_enter_without_alt_passes_through() {
    let (count, mut proc) = toggle_counter();
    assert!(!proc.on_key_event(&KeyEvent::new(KeyAction::Down, KeyCode::Enter)));
    assert!(!proc.on_key_event(&KeyEvent::new(KeyAction::Up, KeyCode::Enter)));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_mouse_button_from_winit() {
    assert_eq!(MouseButton::from(winit::event::MouseButton::Left), MouseButton::Left);
    assert_eq!(MouseButton::from(winit::event::MouseButton::Back), MouseButton::Other);
}
