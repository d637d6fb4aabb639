//! Runtime configuration shared by the binary and the session

use std::path::PathBuf;
use std::time::Duration;

/// Delay after entering a match before keyboard input is accepted
pub const MATCH_LOADING_GRACE: Duration = Duration::from_millis(1200);

/// Delay before reopening a transport that dropped
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the arena server
    pub server_url: String,
    /// File holding the credential token written by the login flow
    pub token_file: PathBuf,
    /// Persisted binding table
    pub controls_file: PathBuf,
    /// Persisted room code of the room being joined
    pub room_file: PathBuf,
    pub user_name: Option<String>,
    pub loading_grace: Duration,
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:3000".to_string(),
            token_file: PathBuf::from("token"),
            controls_file: PathBuf::from("controls.json"),
            room_file: PathBuf::from("room_code"),
            user_name: None,
            loading_grace: MATCH_LOADING_GRACE,
            reconnect_delay: RECONNECT_DELAY,
        }
    }
}
