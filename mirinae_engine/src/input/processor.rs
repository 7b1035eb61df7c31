/// Input processor chain

use std::time::Instant;
use rustc_hash::FxHashMap;
use winit::keyboard::KeyCode;
use crate::input::{KeyAction, KeyEvent, MouseEvent, TouchEvent};

/// Receives input events; returning true consumes the event
pub trait InputProcessor: Send {
    fn on_key_event(&mut self, _event: &KeyEvent) -> bool {
        false
    }

    fn on_text_event(&mut self, _c: char) -> bool {
        false
    }

    fn on_mouse_event(&mut self, _event: &MouseEvent) -> bool {
        false
    }

    fn on_touch_event(&mut self, _event: &TouchEvent) -> bool {
        false
    }
}

/// Ordered chain of processors; the first one returning true wins
#[derive(Default)]
pub struct InputProcessorMgr {
    items: Vec<Box<dyn InputProcessor>>,
}

impl InputProcessorMgr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, processor: Box<dyn InputProcessor>) {
        self.items.push(processor);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl InputProcessor for InputProcessorMgr {
    fn on_key_event(&mut self, event: &KeyEvent) -> bool {
        self.items.iter_mut().any(|p| p.on_key_event(event))
    }

    fn on_text_event(&mut self, c: char) -> bool {
        self.items.iter_mut().any(|p| p.on_text_event(c))
    }

    fn on_mouse_event(&mut self, event: &MouseEvent) -> bool {
        self.items.iter_mut().any(|p| p.on_mouse_event(event))
    }

    fn on_touch_event(&mut self, event: &TouchEvent) -> bool {
        self.items.iter_mut().any(|p| p.on_touch_event(event))
    }
}

#[derive(Debug, Clone, Copy)]
struct KeyState {
    timepoint: Instant,
    pressed: bool,
}

/// Pressed state of every key seen so far
#[derive(Debug, Default)]
pub struct KeyStateTracker {
    states: FxHashMap<KeyCode, KeyState>,
}

impl KeyStateTracker {
    pub fn notify(&mut self, event: &KeyEvent) {
        self.states.insert(
            event.key,
            KeyState {
                timepoint: event.timepoint,
                pressed: event.action == KeyAction::Down,
            },
        );
    }

    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.states.get(&key).is_some_and(|s| s.pressed)
    }

    /// When `key` last changed state
    pub fn timepoint(&self, key: KeyCode) -> Option<Instant> {
        self.states.get(&key).map(|s| s.timepoint)
    }
}

/// Engine-level shortcuts handled before anything else (Alt+Enter)
pub struct DominantCommandProc {
    keys: KeyStateTracker,
    toggle_fullscreen: Box<dyn Fn() + Send + Sync>,
}

impl DominantCommandProc {
    pub fn new(toggle_fullscreen: Box<dyn Fn() + Send + Sync>) -> Self {
        Self {
            keys: KeyStateTracker::default(),
            toggle_fullscreen,
        }
    }
}

impl InputProcessor for DominantCommandProc {
    fn on_key_event(&mut self, event: &KeyEvent) -> bool {
        self.keys.notify(event);

        if event.key == KeyCode::Enter && self.keys.is_pressed(KeyCode::AltLeft) {
            if event.action == KeyAction::Up {
                (self.toggle_fullscreen)();
            }
            return true;
        }
        false
    }
}
