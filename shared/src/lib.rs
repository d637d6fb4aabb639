use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Pixel edge length of one map cell
pub const CELL_SIZE: f32 = 32.0;

/// Identity colors handed out to players in sorted-id order
pub const PALETTE: [&str; 12] = [
    "#FF2E63", "#08D9D6", "#FCE38A", "#EAFF00", "#FF9A76", "#A3DE83", "#FF6B9C", "#00F5FF",
    "#FFD93D", "#6BCF7F", "#FF8E6E", "#9D65C9",
];

pub type PlayerId = String;

/// Row-major grid, `map[y][x]`
pub type Grid = Vec<Vec<Cell>>;

/// Frames pushed by the arena server, `{"event": .., "data": ..}` on the wire
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum InboundEvent {
    /// Handshake frame carrying the server-assigned session id
    Connect { id: String },
    StateUpdate(Snapshot),
    MatchDeleted {
        #[serde(default)]
        message: String,
    },
    RoomResponse {
        #[serde(rename = "type")]
        kind: ResponseKind,
        #[serde(default)]
        message: String,
    },
    StateUpdateInfo {
        #[serde(default)]
        message: String,
    },
}

/// Commands sent from the client to the arena server
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum OutboundEvent {
    MovePlayer {
        dir: Direction,
    },
    CreateBullet {},
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        user_name: String,
        room_id: String,
    },
    #[serde(rename_all = "camelCase")]
    RemovePlayer {
        room_id: String,
    },
    #[serde(rename_all = "camelCase")]
    StartMatch {
        room_id: String,
    },
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::MovePlayer { .. } => "movePlayer",
            OutboundEvent::CreateBullet {} => "createBullet",
            OutboundEvent::JoinRoom { .. } => "joinRoom",
            OutboundEvent::RemovePlayer { .. } => "removePlayer",
            OutboundEvent::StartMatch { .. } => "startMatch",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Success,
    Error,
}

/// One authoritative match update. Every field is optional on the wire; how a
/// missing field is treated is decided by the receiver, not here.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub players: Option<HashMap<PlayerId, Player>>,
    #[serde(
        rename = "status",
        alias = "roomStatus",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<RoomStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spawn_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<Grid>,
    #[serde(
        default,
        deserialize_with = "bullets_from_list_or_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub bullets: Option<Vec<Bullet>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Status not reported yet, an empty string on the wire
    #[default]
    #[serde(rename = "")]
    Unknown,
    Waiting,
    Active,
    Ended,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub position: Position,
    #[serde(default)]
    pub health: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub direction: Direction,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub kills: u32,
    #[serde(default)]
    pub score: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: PlayerStatus,
}

impl Player {
    pub fn new(user_name: &str, x: i32, y: i32) -> Self {
        Self {
            position: Position { x, y },
            health: 100,
            direction: Direction::None,
            user_name: user_name.to_string(),
            kills: 0,
            score: 0,
            status: PlayerStatus::Alive,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    #[default]
    None,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Alive,
    Dead,
    Disconnected,
    #[default]
    Waiting,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Bullet {
    #[serde(alias = "bulletId", deserialize_with = "string_or_number")]
    pub id: String,
    pub position: Position,
}

/// Map cell, `1` is a wall on the wire and anything else is open floor
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "u8", into = "u8")]
pub enum Cell {
    Open,
    Wall,
}

impl From<u8> for Cell {
    fn from(value: u8) -> Self {
        match value {
            1 => Cell::Wall,
            _ => Cell::Open,
        }
    }
}

impl From<Cell> for u8 {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Open => 0,
            Cell::Wall => 1,
        }
    }
}

/// Returns `(columns, rows)`, or None for an empty grid
pub fn grid_dimensions(grid: &Grid) -> Option<(usize, usize)> {
    let columns = grid.first()?.len();
    if columns == 0 {
        return None;
    }
    Some((columns, grid.len()))
}

pub fn encode(event: &OutboundEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

pub fn decode(text: &str) -> Result<InboundEvent, serde_json::Error> {
    serde_json::from_str(text)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

// The server sends bullets either as a list or keyed by bullet id.
fn bullets_from_list_or_map<'de, D>(deserializer: D) -> Result<Option<Vec<Bullet>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Bullets {
        List(Vec<Bullet>),
        Keyed(BTreeMap<String, Bullet>),
    }

    Ok(
        Option::<Bullets>::deserialize(deserializer)?.map(|bullets| match bullets {
            Bullets::List(list) => list,
            Bullets::Keyed(keyed) => keyed.into_values().collect(),
        }),
    )
}
