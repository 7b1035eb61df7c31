/// Input events delivered to `InputProcessor`s
///
/// Keys are identified by physical winit key codes.

use std::time::Instant;
use winit::event::{ElementState, KeyEvent as WinitKeyEvent, MouseButton as WinitMouseButton};
use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub timepoint: Instant,
    pub action: KeyAction,
    pub key: KeyCode,
}

impl KeyEvent {
    pub fn new(action: KeyAction, key: KeyCode) -> Self {
        Self { timepoint: Instant::now(), action, key }
    }

    /// Convert a winit keyboard event; unidentified keys yield `None`
    pub fn from_winit(event: &WinitKeyEvent) -> Option<Self> {
        let PhysicalKey::Code(key) = event.physical_key else {
            return None;
        };
        let action = match event.state {
            ElementState::Pressed => KeyAction::Down,
            ElementState::Released => KeyAction::Up,
        };
        Some(Self::new(action, key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Move,
    Down,
    Up,
    WheelUp,
    WheelDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other,
}

impl From<WinitMouseButton> for MouseButton {
    fn from(button: WinitMouseButton) -> Self {
        match button {
            WinitMouseButton::Left => MouseButton::Left,
            WinitMouseButton::Right => MouseButton::Right,
            WinitMouseButton::Middle => MouseButton::Middle,
            _ => MouseButton::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseEvent {
    pub action: MouseAction,
    /// `None` for moves and wheel events
    pub button: Option<MouseButton>,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchAction {
    Move,
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub action: TouchAction,
    pub x: f64,
    pub y: f64,
    /// Finger id
    pub index: u64,
}
