use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use winit::event::{DeviceEvent, ElementState, MouseScrollDelta, WindowEvent};
use winit::keyboard::{Key, NamedKey};

pub const DEFAULT_INPUT_CONFIG_PATH: &str = "config/input.json";

/// Camera and application actions that keys can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveForward,
    MoveBackward,
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    Quit,
}

impl InputAction {
    fn from_str(value: &str) -> Option<Self> {
        match value {
            "move_forward" => Some(Self::MoveForward),
            "move_backward" => Some(Self::MoveBackward),
            "move_left" => Some(Self::MoveLeft),
            "move_right" => Some(Self::MoveRight),
            "move_up" => Some(Self::MoveUp),
            "move_down" => Some(Self::MoveDown),
            "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

pub struct Input {
    bindings: InputBindings,
    held: HashSet<InputAction>,
    quit_requested: bool,
    mouse_delta: (f32, f32),
    wheel: f32,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(path: impl AsRef<Path>) -> Self {
        Self::with_bindings(InputBindings::load_or_default(path))
    }

    fn with_bindings(bindings: InputBindings) -> Self {
        Self { bindings, held: HashSet::new(), quit_requested: false, mouse_delta: (0.0, 0.0), wheel: 0.0 }
    }

    pub fn push(&mut self, ev: InputEvent) {
        match ev {
            InputEvent::Key { key, pressed } => self.apply_key_binding(&key, pressed),
            InputEvent::MouseMove { dx, dy } => {
                self.mouse_delta.0 += dx;
                self.mouse_delta.1 += dy;
            }
            InputEvent::Wheel { delta } => self.wheel += delta,
            InputEvent::Other => {}
        }
    }

    pub fn is_action_down(&self, action: InputAction) -> bool {
        self.held.contains(&action)
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Mouse motion accumulated since the last call, in device units (y grows downwards).
    pub fn take_mouse_delta(&mut self) -> (f32, f32) {
        std::mem::take(&mut self.mouse_delta)
    }

    pub fn take_wheel_delta(&mut self) -> Option<f32> {
        if self.wheel.abs() > 0.0 {
            Some(std::mem::take(&mut self.wheel))
        } else {
            None
        }
    }

    fn apply_key_binding(&mut self, key: &Key, pressed: bool) {
        let Some(binding_key) = InputKeyBinding::from_event_key(key) else {
            return;
        };
        let actions: Vec<_> = self.bindings.actions_for_key(&binding_key).collect();
        for action in actions {
            if action == InputAction::Quit && pressed {
                self.quit_requested = true;
            }
            if pressed {
                self.held.insert(action);
            } else {
                self.held.remove(&action);
            }
        }
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::with_bindings(InputBindings::default())
    }
}

#[derive(Debug, Clone)]
struct InputBindings {
    key_to_actions: HashMap<InputKeyBinding, Vec<InputAction>>,
}

impl InputBindings {
    fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<InputConfigFile>(&contents) {
                Ok(config) => Self::with_overrides(config.into_overrides(&path.display().to_string())),
                Err(err) => {
                    log::warn!(
                        target: "input",
                        "Failed to parse {}: {err}. Falling back to default bindings.",
                        path.display()
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::info!(
                    target: "input",
                    "No key bindings at {} ({err}); using defaults.",
                    path.display()
                );
                Self::default()
            }
        }
    }

    fn with_overrides(overrides: HashMap<InputAction, Vec<InputKeyBinding>>) -> Self {
        let mut action_map = Self::default_action_map();
        for (action, keys) in overrides {
            if !keys.is_empty() {
                action_map.insert(action, keys);
            }
        }
        Self::from_action_map(action_map)
    }

    fn default_action_map() -> HashMap<InputAction, Vec<InputKeyBinding>> {
        use InputAction::*;
        let mut map = HashMap::new();
        map.insert(MoveForward, vec![InputKeyBinding::character("w")]);
        map.insert(MoveBackward, vec![InputKeyBinding::character("s")]);
        map.insert(MoveLeft, vec![InputKeyBinding::character("a")]);
        map.insert(MoveRight, vec![InputKeyBinding::character("d")]);
        map.insert(MoveUp, vec![InputKeyBinding::Named(NamedKeyCode::Space)]);
        map.insert(MoveDown, vec![InputKeyBinding::Named(NamedKeyCode::Control)]);
        map.insert(Quit, vec![InputKeyBinding::Named(NamedKeyCode::Escape)]);
        map
    }

    fn from_action_map(action_map: HashMap<InputAction, Vec<InputKeyBinding>>) -> Self {
        let mut key_to_actions: HashMap<InputKeyBinding, Vec<InputAction>> = HashMap::new();
        for (action, keys) in action_map {
            for key in keys {
                key_to_actions.entry(key).or_default().push(action);
            }
        }
        Self { key_to_actions }
    }

    fn actions_for_key(&self, key: &InputKeyBinding) -> impl Iterator<Item = InputAction> + '_ {
        self.key_to_actions.get(key).into_iter().flatten().copied()
    }
}

impl Default for InputBindings {
    fn default() -> Self {
        Self::from_action_map(Self::default_action_map())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum InputKeyBinding {
    Character(String),
    Named(NamedKeyCode),
}

impl InputKeyBinding {
    fn character(ch: &str) -> Self {
        Self::Character(ch.to_lowercase())
    }

    fn from_event_key(key: &Key) -> Option<Self> {
        match key {
            Key::Character(ch) if !ch.is_empty() => Some(Self::Character(ch.to_lowercase())),
            Key::Named(named) => NamedKeyCode::from_named_key(named).map(Self::Named),
            _ => None,
        }
    }

    fn from_config_value(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if let Some(named) = NamedKeyCode::from_str(&normalized) {
            return Some(Self::Named(named));
        }
        (normalized.chars().count() == 1).then_some(Self::Character(normalized))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NamedKeyCode {
    Space,
    Shift,
    Control,
    Escape,
}

impl NamedKeyCode {
    fn from_named_key(key: &NamedKey) -> Option<Self> {
        match key {
            NamedKey::Space => Some(Self::Space),
            NamedKey::Shift => Some(Self::Shift),
            NamedKey::Control => Some(Self::Control),
            NamedKey::Escape => Some(Self::Escape),
            _ => None,
        }
    }

    fn from_str(value: &str) -> Option<Self> {
        match value {
            "space" => Some(Self::Space),
            "shift" | "left_shift" | "right_shift" => Some(Self::Shift),
            "ctrl" | "control" | "left_ctrl" | "right_ctrl" => Some(Self::Control),
            "esc" | "escape" => Some(Self::Escape),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InputConfigFile {
    #[serde(default)]
    bindings: HashMap<String, Vec<String>>,
}

impl InputConfigFile {
    fn into_overrides(self, origin: &str) -> HashMap<InputAction, Vec<InputKeyBinding>> {
        let mut overrides = HashMap::new();
        for (action_name, keys) in self.bindings {
            let Some(action) = InputAction::from_str(&action_name.trim().to_lowercase()) else {
                log::warn!(target: "input", "{origin}: unknown action '{action_name}', ignoring.");
                continue;
            };
            let mut parsed = Vec::new();
            for key in keys {
                match InputKeyBinding::from_config_value(&key) {
                    Some(binding) => parsed.push(binding),
                    None => log::warn!(
                        target: "input",
                        "{origin}: unknown key '{key}' for action '{action_name}', ignoring."
                    ),
                }
            }
            if parsed.is_empty() {
                log::warn!(target: "input", "{origin}: action '{action_name}' has no valid keys, keeping defaults.");
                continue;
            }
            overrides.insert(action, parsed);
        }
        overrides
    }
}

pub enum InputEvent {
    Key { key: Key, pressed: bool },
    MouseMove { dx: f32, dy: f32 },
    Wheel { delta: f32 },
    Other,
}

impl InputEvent {
    pub fn from_window_event(ev: &WindowEvent) -> Self {
        match ev {
            WindowEvent::MouseWheel { delta, .. } => {
                let d = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32,
                };
                InputEvent::Wheel { delta: d }
            }
            WindowEvent::KeyboardInput { event, .. } => InputEvent::Key {
                key: event.logical_key.clone(),
                pressed: event.state == ElementState::Pressed,
            },
            _ => InputEvent::Other,
        }
    }

    pub fn from_device_event(ev: &DeviceEvent) -> Self {
        match ev {
            DeviceEvent::MouseMotion { delta: (dx, dy) } => {
                InputEvent::MouseMove { dx: *dx as f32, dy: *dy as f32 }
            }
            _ => InputEvent::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bindings_cover_fly_controls() {
        let mut input = Input::new();
        input.push(InputEvent::Key { key: Key::Character("W".into()), pressed: true });
        input.push(InputEvent::Key { key: Key::Named(NamedKey::Control), pressed: true });
        assert!(input.is_action_down(InputAction::MoveForward));
        assert!(input.is_action_down(InputAction::MoveDown));
        input.push(InputEvent::Key { key: Key::Character("w".into()), pressed: false });
        assert!(!input.is_action_down(InputAction::MoveForward));
    }

    #[test]
    fn escape_latches_quit() {
        let mut input = Input::new();
        assert!(!input.quit_requested());
        input.push(InputEvent::Key { key: Key::Named(NamedKey::Escape), pressed: true });
        input.push(InputEvent::Key { key: Key::Named(NamedKey::Escape), pressed: false });
        assert!(input.quit_requested());
    }

    #[test]
    fn mouse_and_wheel_accumulate_until_taken() {
        let mut input = Input::new();
        input.push(InputEvent::MouseMove { dx: 2.0, dy: -1.0 });
        input.push(InputEvent::MouseMove { dx: 0.5, dy: 3.0 });
        input.push(InputEvent::Wheel { delta: 1.0 });
        assert_eq!(input.take_mouse_delta(), (2.5, 2.0));
        assert_eq!(input.take_mouse_delta(), (0.0, 0.0));
        assert_eq!(input.take_wheel_delta(), Some(1.0));
        assert_eq!(input.take_wheel_delta(), None);
    }

    #[test]
    fn config_value_parsing_accepts_named_and_single_characters() {
        assert_eq!(InputKeyBinding::from_config_value("Left_Ctrl"), Some(InputKeyBinding::Named(NamedKeyCode::Control)));
        assert_eq!(InputKeyBinding::from_config_value("K"), Some(InputKeyBinding::Character("k".into())));
        assert_eq!(InputKeyBinding::from_config_value("page_up"), None);
    }
}
