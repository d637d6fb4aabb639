//! Local view of the match, kept in step with the server's snapshots

use log::{debug, warn};
use shared::{grid_dimensions, Bullet, Grid, Player, PlayerId, RoomStatus, Snapshot};
use std::collections::HashMap;

/// Which parts of the match state an applied snapshot touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateChanges {
    pub players: bool,
    pub status: bool,
    pub time_left: bool,
    pub spawn_count: bool,
    pub created_by: bool,
    pub map: bool,
    pub bullets: bool,
}

impl StateChanges {
    pub fn any(&self) -> bool {
        self.players
            || self.status
            || self.time_left
            || self.spawn_count
            || self.created_by
            || self.map
            || self.bullets
    }
}

/// Receives change notifications after each applied snapshot
pub trait StateObserver {
    fn state_changed(&mut self, state: &MatchState, changes: &StateChanges);
}

#[derive(Debug, Clone, Default)]
pub struct MatchState {
    pub players: HashMap<PlayerId, Player>,
    pub status: RoomStatus,
    pub time_left: u64,
    pub spawn_count: u32,
    pub created_by: Option<PlayerId>,
    pub map: Option<Grid>,
    pub bullets: Option<Vec<Bullet>>,
    last_seq: Option<u64>,
}

impl MatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one snapshot into the local state.
    ///
    /// `players`, `status` and `time_left` are resent every tick and always
    /// replaced, falling back to empty defaults when absent. The remaining
    /// fields are only replaced when the snapshot carries a meaningful value;
    /// otherwise the previous value is kept. A player list is the complete
    /// roster, never a delta.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> StateChanges {
        let mut changes = StateChanges::default();

        if let Some(seq) = snapshot.seq {
            if let Some(last) = self.last_seq {
                if seq <= last {
                    debug!("Ignoring stale snapshot {} (last applied {})", seq, last);
                    return changes;
                }
            }
            self.last_seq = Some(seq);
        }

        let players = snapshot.players.unwrap_or_default();
        changes.players = players != self.players;
        self.players = players;

        let was_active = self.status == RoomStatus::Active;
        let status = snapshot.status.unwrap_or_default();
        changes.status = status != self.status;
        self.status = status;

        let time_left = snapshot.time_left.unwrap_or(0);
        changes.time_left = time_left != self.time_left;
        self.time_left = time_left;

        if let Some(created_by) = snapshot.created_by.filter(|id| !id.is_empty()) {
            changes.created_by = self.created_by.as_ref() != Some(&created_by);
            self.created_by = Some(created_by);
        }

        if let Some(spawn_count) = snapshot.spawn_count.filter(|count| *count > 0) {
            changes.spawn_count = spawn_count != self.spawn_count;
            self.spawn_count = spawn_count;
        }

        if let Some(map) = snapshot.map {
            let mid_match = was_active && self.status == RoomStatus::Active;
            if !mid_match || self.same_dimensions(&map) {
                changes.map = self.map.as_ref() != Some(&map);
                self.map = Some(map);
            }
        }

        // An empty list is still a value: every bullet is gone.
        if let Some(bullets) = snapshot.bullets {
            changes.bullets = self.bullets.as_ref() != Some(&bullets);
            self.bullets = Some(bullets);
        }

        debug!(
            "Applied snapshot: {} players, status {:?}, {}ms left",
            self.players.len(),
            self.status,
            self.time_left
        );

        changes
    }

    // Map dimensions are fixed while a match is running.
    fn same_dimensions(&self, map: &Grid) -> bool {
        match (self.map_dimensions(), grid_dimensions(map)) {
            (Some(current), Some(incoming)) if current != incoming => {
                warn!(
                    "Rejecting map resize mid-match: {:?} -> {:?}",
                    current, incoming
                );
                false
            }
            _ => true,
        }
    }

    /// Forgets the sequence watermark so a fresh connection starts over
    pub fn reset_sequence(&mut self) {
        self.last_seq = None;
    }

    /// `(columns, rows)` of the current map
    pub fn map_dimensions(&self) -> Option<(usize, usize)> {
        self.map.as_ref().and_then(grid_dimensions)
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn is_created_by(&self, id: Option<&str>) -> bool {
        matches!((self.created_by.as_deref(), id), (Some(creator), Some(id)) if creator == id)
    }

    /// Final roster for the results view, ordered by player id
    pub fn roster(&self) -> Vec<Player> {
        let mut ids: Vec<&PlayerId> = self.players.keys().collect();
        ids.sort();
        ids.into_iter()
            .filter_map(|id| self.players.get(id).cloned())
            .collect()
    }
}
