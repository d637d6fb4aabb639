//! Views, the accidental-exit guard, and the persisted room code

use log::{info, warn};
use shared::Player;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Login,
    Home,
    Lobby,
    Match,
    /// Final leaderboard, sorted by score
    Results { players: Vec<Player> },
}

impl View {
    /// Results need the roster captured at match end. Without it the entry
    /// is treated as invalid and lands on the home view.
    pub fn results(roster: Option<Vec<Player>>) -> View {
        match roster {
            Some(mut players) => {
                players.sort_by(|a, b| b.score.cmp(&a.score));
                View::Results { players }
            }
            None => {
                warn!("Results view entered without a roster, redirecting home");
                View::Home
            }
        }
    }
}

/// What raised the leave prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveIntent {
    /// The window is being closed
    Close,
    /// The session is being restarted in place
    Reload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveDecision {
    /// Nothing at stake, close right away
    Allow,
    /// A confirmation prompt is now showing
    Confirm,
}

/// Warns before an active session is closed by accident
#[derive(Debug, Default)]
pub struct LeaveGuard {
    leaving: bool,
    pending: Option<LeaveIntent>,
}

impl LeaveGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_close_requested(&mut self, connected: bool) -> LeaveDecision {
        self.request(LeaveIntent::Close, connected)
    }

    pub fn on_reload_requested(&mut self, connected: bool) -> LeaveDecision {
        self.request(LeaveIntent::Reload, connected)
    }

    fn request(&mut self, intent: LeaveIntent, connected: bool) -> LeaveDecision {
        if connected && !self.leaving {
            self.pending = Some(intent);
            LeaveDecision::Confirm
        } else {
            LeaveDecision::Allow
        }
    }

    /// The user chose to leave; later requests pass without a prompt.
    /// Returns the request the prompt was raised for.
    pub fn confirm(&mut self) -> Option<LeaveIntent> {
        let intent = self.pending.take();
        if intent.is_some() {
            info!("Leaving the session on purpose");
            self.leaving = true;
        }
        intent
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn pending(&self) -> Option<LeaveIntent> {
        self.pending
    }

    pub fn prompt_visible(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_leaving(&self) -> bool {
        self.leaving
    }
}

/// Where the code of the room being joined is kept between views
pub trait RoomStore {
    fn room_code(&self) -> Option<String>;
    fn set_room_code(&mut self, code: &str);
    fn clear(&mut self);
}

#[derive(Debug, Default)]
pub struct MemoryRoomStore {
    code: Option<String>,
}

impl MemoryRoomStore {
    pub fn new(code: Option<&str>) -> Self {
        Self {
            code: code.map(str::to_string),
        }
    }
}

impl RoomStore for MemoryRoomStore {
    fn room_code(&self) -> Option<String> {
        self.code.clone()
    }

    fn set_room_code(&mut self, code: &str) {
        self.code = Some(code.to_string());
    }

    fn clear(&mut self) {
        self.code = None;
    }
}

#[derive(Debug)]
pub struct FileRoomStore {
    path: PathBuf,
}

impl FileRoomStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RoomStore for FileRoomStore {
    fn room_code(&self) -> Option<String> {
        let code = fs::read_to_string(&self.path).ok()?;
        let code = code.trim();
        (!code.is_empty()).then(|| code.to_string())
    }

    fn set_room_code(&mut self, code: &str) {
        if let Err(e) = fs::write(&self.path, code) {
            warn!("Could not store room code: {}", e);
        }
    }

    fn clear(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Could not clear room code: {}", e),
        }
    }
}
