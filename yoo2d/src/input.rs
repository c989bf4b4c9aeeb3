use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::entity::EntityId;
use crate::math::Vec2;

/// Keys that a non-hold [`KeyBind`] leaves pressed after firing.
pub const MODIFIER_KEYS: [&str; 4] = ["Control", "Shift", "Alt", "Tab"];

/// Resolved input for one frame: pointer position, button state and the
/// set of held logical key names (`"ArrowUp"`, `"w"`, `" "`...).
///
/// Raw event capture lives outside the crate; the host translates its
/// window events into calls on this struct.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub pointer: Vec2,
    pub pointer_down: bool,
    /// Where the current press started. Cleared on release.
    pub pointer_start: Option<Vec2>,
    /// Where the last press ended. Cleared on the next press.
    pub pointer_end: Option<Vec2>,
    keys: HashSet<String>,
}

impl InputSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press_key(&mut self, key: impl Into<String>) {
        self.keys.insert(key.into());
    }

    pub fn release_key(&mut self, key: &str) {
        self.keys.remove(key);
    }

    pub fn clear_keys(&mut self) {
        self.keys.clear();
    }

    /// Returns true if the key is currently held down.
    pub fn is_key_down(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn pointer_move(&mut self, at: Vec2) {
        self.pointer = at;
    }

    pub fn pointer_press(&mut self, at: Vec2) {
        self.pointer = at;
        self.pointer_down = true;
        self.pointer_start = Some(at);
        self.pointer_end = None;
    }

    pub fn pointer_release(&mut self, at: Vec2) {
        self.pointer = at;
        self.pointer_down = false;
        self.pointer_start = None;
        self.pointer_end = Some(at);
    }
}

/// Cursor the host should display.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cursor {
    #[default]
    Default,
    Grab,
    Named(String),
}

/// Pointer arbitration shared by every entity during a frame.
///
/// `owner` is the single entity allowed to become active while the pointer
/// is held; the engine clears it whenever the pointer is up. `hover` is the
/// first entity (topmost, since layers update back to front) that reported
/// the pointer inside it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointerState {
    pub owner: Option<EntityId>,
    pub hover: Option<EntityId>,
    pub cursor: Cursor,
}

/// Logical key names used by the directional movement modes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Controls {
    pub up: String,
    pub down: String,
    pub left: String,
    pub right: String,
    pub jump: String,
}

impl Controls {
    pub fn arrows() -> Self {
        Self::from_keys("ArrowUp", "ArrowDown", "ArrowLeft", "ArrowRight")
    }

    pub fn wasd() -> Self {
        Self::from_keys("w", "s", "a", "d")
    }

    pub fn wazs() -> Self {
        Self::from_keys("w", "z", "a", "d")
    }

    fn from_keys(up: &str, down: &str, left: &str, right: &str) -> Self {
        Self {
            up: up.into(),
            down: down.into(),
            left: left.into(),
            right: right.into(),
            jump: " ".into(),
        }
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::arrows()
    }
}

/// A key combination that runs an action against the engine while every key
/// in it is held.
///
/// Non-hold binds release their non-modifier keys after firing, so the
/// action runs once per physical press instead of once per frame.
#[derive(Clone)]
pub struct KeyBind {
    pub keys: Vec<String>,
    pub hold_down: bool,
    pub enabled: bool,
    action: Rc<dyn Fn(&mut Engine)>,
}

impl KeyBind {
    pub fn new<I, S, F>(keys: I, action: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&mut Engine) + 'static,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            hold_down: false,
            enabled: true,
            action: Rc::new(action),
        }
    }

    /// Keep firing every frame for as long as the keys stay held.
    #[must_use]
    pub fn with_hold_down(mut self, hold_down: bool) -> Self {
        self.hold_down = hold_down;
        self
    }

    /// Returns true if the bind should fire this frame, consuming its keys
    /// from `input` when it is not a hold bind.
    pub fn poll(&self, input: &mut InputSnapshot) -> bool {
        if !self.enabled || self.keys.is_empty() {
            return false;
        }
        if !self.keys.iter().all(|k| input.is_key_down(k)) {
            return false;
        }
        if !self.hold_down {
            for key in &self.keys {
                if !MODIFIER_KEYS.contains(&key.as_str()) {
                    input.release_key(key);
                }
            }
        }
        true
    }

    pub(crate) fn action(&self) -> Rc<dyn Fn(&mut Engine)> {
        Rc::clone(&self.action)
    }
}

impl fmt::Debug for KeyBind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBind")
            .field("keys", &self.keys)
            .field("hold_down", &self.hold_down)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_press_and_release_track_endpoints() {
        let mut input = InputSnapshot::new();
        input.pointer_press(Vec2::new(3.0, 4.0));
        assert!(input.pointer_down);
        assert_eq!(input.pointer_start, Some(Vec2::new(3.0, 4.0)));
        assert_eq!(input.pointer_end, None);

        input.pointer_move(Vec2::new(10.0, 4.0));
        input.pointer_release(Vec2::new(12.0, 4.0));
        assert!(!input.pointer_down);
        assert_eq!(input.pointer_start, None);
        assert_eq!(input.pointer_end, Some(Vec2::new(12.0, 4.0)));
        assert_eq!(input.pointer, Vec2::new(12.0, 4.0));
    }

    #[test]
    fn control_presets() {
        assert_eq!(Controls::default(), Controls::arrows());
        assert_eq!(Controls::wasd().down, "s");
        assert_eq!(Controls::wazs().down, "z");
        assert_eq!(Controls::arrows().jump, " ");
    }

    #[test]
    fn controls_deserialize_with_missing_fields() {
        let controls: Controls = serde_json::from_str(r#"{ "left": "q" }"#).unwrap();
        assert_eq!(controls.left, "q");
        assert_eq!(controls.right, "ArrowRight");
    }

    #[test]
    fn key_bind_requires_every_key() {
        let bind = KeyBind::new(["Control", "s"], |_| {});
        let mut input = InputSnapshot::new();
        input.press_key("s");
        assert!(!bind.poll(&mut input));
        input.press_key("Control");
        assert!(bind.poll(&mut input));
    }

    #[test]
    fn key_bind_consumes_non_modifier_keys() {
        let bind = KeyBind::new(["Control", "s"], |_| {});
        let mut input = InputSnapshot::new();
        input.press_key("Control");
        input.press_key("s");
        assert!(bind.poll(&mut input));
        assert!(input.is_key_down("Control"));
        assert!(!input.is_key_down("s"));
        assert!(!bind.poll(&mut input));
    }

    #[test]
    fn hold_down_bind_keeps_firing() {
        let bind = KeyBind::new(["x"], |_| {}).with_hold_down(true);
        let mut input = InputSnapshot::new();
        input.press_key("x");
        assert!(bind.poll(&mut input));
        assert!(bind.poll(&mut input));
    }

    #[test]
    fn disabled_or_empty_bind_never_fires() {
        let mut input = InputSnapshot::new();
        input.press_key("x");
        let mut bind = KeyBind::new(["x"], |_| {});
        bind.enabled = false;
        assert!(!bind.poll(&mut input));
        let empty = KeyBind::new(Vec::<String>::new(), |_| {});
        assert!(!empty.poll(&mut input));
    }
}
