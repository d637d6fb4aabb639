//! Persisted mapping from logical actions to physical keys

use crate::error::BindingError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use shared::Direction;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Shoot,
    Exit,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::MoveUp,
        Action::MoveDown,
        Action::MoveLeft,
        Action::MoveRight,
        Action::Shoot,
        Action::Exit,
    ];

    pub fn direction(self) -> Option<Direction> {
        match self {
            Action::MoveUp => Some(Direction::Up),
            Action::MoveDown => Some(Direction::Down),
            Action::MoveLeft => Some(Direction::Left),
            Action::MoveRight => Some(Direction::Right),
            Action::Shoot | Action::Exit => None,
        }
    }

    /// Name used in the controls file
    pub fn name(self) -> &'static str {
        match self {
            Action::MoveUp => "moveUp",
            Action::MoveDown => "moveDown",
            Action::MoveLeft => "moveLeft",
            Action::MoveRight => "moveRight",
            Action::Shoot => "shoot",
            Action::Exit => "exit",
        }
    }

    fn default_key(self) -> &'static str {
        match self {
            Action::MoveUp => "ArrowUp",
            Action::MoveDown => "ArrowDown",
            Action::MoveLeft => "ArrowLeft",
            Action::MoveRight => "ArrowRight",
            Action::Shoot => "Space",
            Action::Exit => "Escape",
        }
    }
}

/// One key per action, no key shared between two actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingTable {
    keys: BTreeMap<Action, String>,
}

impl Default for BindingTable {
    fn default() -> Self {
        Self {
            keys: Action::ALL
                .iter()
                .map(|action| (*action, action.default_key().to_string()))
                .collect(),
        }
    }
}

impl BindingTable {
    pub fn key_for(&self, action: Action) -> &str {
        self.keys.get(&action).map(String::as_str).unwrap_or("")
    }

    /// Finds the action bound to either identifier of a key event
    pub fn action_for(&self, key: Option<&str>, code: Option<&str>) -> Option<Action> {
        self.keys
            .iter()
            .find(|(_, bound)| Some(bound.as_str()) == key || Some(bound.as_str()) == code)
            .map(|(action, _)| *action)
    }

    /// Binds `action` to `key`, refusing keys held by another action
    pub fn rebind(&mut self, action: Action, key: &str) -> Result<(), BindingError> {
        if let Some((other, _)) = self
            .keys
            .iter()
            .find(|(other, bound)| **other != action && bound.as_str() == key)
        {
            return Err(BindingError::Conflict {
                key: key.to_string(),
                bound_to: other.name().to_string(),
            });
        }

        self.keys.insert(action, key.to_string());
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Action, &str)> {
        self.keys.iter().map(|(action, key)| (*action, key.as_str()))
    }

    fn is_complete(&self) -> bool {
        let distinct: HashSet<&String> = self.keys.values().collect();
        Action::ALL.iter().all(|action| self.keys.contains_key(action))
            && distinct.len() == self.keys.len()
            && self.keys.values().all(|key| !key.is_empty())
    }
}

/// JSON file holding the binding table between runs
#[derive(Debug, Clone)]
pub struct ControlsFile {
    path: PathBuf,
}

impl ControlsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored table, falling back to defaults when the file is
    /// missing, unreadable, malformed or incomplete
    pub fn load(&self) -> BindingTable {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No saved controls at {}, using defaults", self.path.display());
                return BindingTable::default();
            }
            Err(e) => {
                warn!("Could not read controls {}: {}", self.path.display(), e);
                return BindingTable::default();
            }
        };

        match serde_json::from_str::<BindingTable>(&text) {
            Ok(table) if table.is_complete() => table,
            Ok(_) => {
                warn!("Saved controls are incomplete, using defaults");
                BindingTable::default()
            }
            Err(e) => {
                warn!("Saved controls are corrupt ({}), using defaults", e);
                BindingTable::default()
            }
        }
    }

    pub fn save(&self, table: &BindingTable) -> Result<(), BindingError> {
        let text = serde_json::to_string_pretty(table)?;
        fs::write(&self.path, text)?;
        Ok(())
    }

    /// Rebinds and persists; the table is untouched when the key is taken
    pub fn rebind(
        &self,
        table: &mut BindingTable,
        action: Action,
        key: &str,
    ) -> Result<(), BindingError> {
        table.rebind(action, key)?;
        self.save(table)
    }

    pub fn reset(&self, table: &mut BindingTable) -> Result<(), BindingError> {
        table.reset();
        self.save(table)
    }
}
