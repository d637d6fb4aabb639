//! Keyboard edge handling and mapping to outbound commands

use crate::bindings::{Action, BindingTable};
use log::debug;
use macroquad::prelude::KeyCode;
use shared::OutboundEvent;
use std::collections::HashSet;

/// Anything that can carry a command to the server
pub trait CommandSink {
    /// Returns false when the command was dropped
    fn send(&mut self, event: OutboundEvent) -> bool;
}

/// A key edge as reported by the platform. `key` is the produced value
/// (`"a"`, `" "`, `"ArrowUp"`), `code` the physical key (`"KeyA"`, `"Space"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Option<String>,
    pub code: Option<String>,
    pub repeat: bool,
}

impl KeyEvent {
    pub fn new(key: &str, code: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            code: Some(code.to_string()),
            repeat: false,
        }
    }

    pub fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }
}

/// What a key press amounted to
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    /// Repeat, no bindings, still loading, or unbound key
    Ignored,
    /// Key already held; default handling should be suppressed
    Suppressed,
    /// A command was handed to the sink
    Sent(OutboundEvent),
    /// A bound action that stays on this client
    Local(Action),
}

/// Tracks held keys and turns fresh presses into at most one command each
pub struct InputMapper {
    bindings: Option<BindingTable>,
    accepting: bool,
    pressed: HashSet<String>,
}

impl InputMapper {
    pub fn new() -> Self {
        Self {
            bindings: None,
            accepting: false,
            pressed: HashSet::new(),
        }
    }

    pub fn set_bindings(&mut self, bindings: BindingTable) {
        self.bindings = Some(bindings);
    }

    pub fn bindings(&self) -> Option<&BindingTable> {
        self.bindings.as_ref()
    }

    pub fn bindings_mut(&mut self) -> Option<&mut BindingTable> {
        self.bindings.as_mut()
    }

    /// Closes the input gate until `finish_loading`
    pub fn begin_loading(&mut self) {
        self.accepting = false;
    }

    pub fn finish_loading(&mut self) {
        self.accepting = true;
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    pub fn is_pressed(&self, identifier: &str) -> bool {
        self.pressed.contains(identifier)
    }

    pub fn pressed_count(&self) -> usize {
        self.pressed.len()
    }

    pub fn key_down(&mut self, event: &KeyEvent, sink: &mut impl CommandSink) -> KeyOutcome {
        if event.repeat || !self.accepting {
            return KeyOutcome::Ignored;
        }
        let Some(bindings) = self.bindings.as_ref() else {
            return KeyOutcome::Ignored;
        };

        let key = event.key.as_deref();
        let code = event.code.as_deref();
        if [key, code]
            .into_iter()
            .flatten()
            .any(|id| self.pressed.contains(id))
        {
            return KeyOutcome::Suppressed;
        }

        let Some(action) = bindings.action_for(key, code) else {
            return KeyOutcome::Ignored;
        };

        for id in [key, code].into_iter().flatten() {
            self.pressed.insert(id.to_string());
        }

        let command = match action.direction() {
            Some(dir) => OutboundEvent::MovePlayer { dir },
            None if action == Action::Shoot => OutboundEvent::CreateBullet {},
            None => {
                debug!("Local action {:?}", action);
                return KeyOutcome::Local(action);
            }
        };

        sink.send(command.clone());
        KeyOutcome::Sent(command)
    }

    /// Releases are never gated, so no key stays stuck across loading
    pub fn key_up(&mut self, event: &KeyEvent) {
        for id in [event.key.as_deref(), event.code.as_deref()]
            .into_iter()
            .flatten()
        {
            self.pressed.remove(id);
        }
    }

    /// Forgets every held key
    pub fn release_all(&mut self) {
        self.pressed.clear();
    }
}

impl Default for InputMapper {
    fn default() -> Self {
        Self::new()
    }
}

/// Translates a macroquad key into the identifier pair used by bindings
pub fn key_event(code: KeyCode) -> KeyEvent {
    let (key, physical) = match code {
        KeyCode::Up => ("ArrowUp".to_string(), "ArrowUp".to_string()),
        KeyCode::Down => ("ArrowDown".to_string(), "ArrowDown".to_string()),
        KeyCode::Left => ("ArrowLeft".to_string(), "ArrowLeft".to_string()),
        KeyCode::Right => ("ArrowRight".to_string(), "ArrowRight".to_string()),
        KeyCode::Space => (" ".to_string(), "Space".to_string()),
        KeyCode::Escape => ("Escape".to_string(), "Escape".to_string()),
        KeyCode::Enter => ("Enter".to_string(), "Enter".to_string()),
        KeyCode::Tab => ("Tab".to_string(), "Tab".to_string()),
        other => {
            let name = format!("{:?}", other);
            if name.len() == 1 {
                (name.to_lowercase(), format!("Key{}", name))
            } else if let Some(digit) = name.strip_prefix("Key") {
                (digit.to_string(), format!("Digit{}", digit))
            } else {
                (name.clone(), name)
            }
        }
    };

    KeyEvent {
        key: Some(key),
        code: Some(physical),
        repeat: false,
    }
}
