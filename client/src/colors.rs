//! Stable per-player identity colors

use crate::game::{MatchState, StateChanges, StateObserver};
use log::debug;
use shared::{Player, PlayerId, PALETTE};
use std::collections::HashMap;

/// Assigns `PALETTE[i % 12]` to the i-th id in sorted order
pub fn assign_colors<'a, I>(ids: I) -> HashMap<PlayerId, &'static str>
where
    I: IntoIterator<Item = &'a PlayerId>,
{
    sorted_ids(ids)
        .into_iter()
        .enumerate()
        .map(|(index, id)| (id, PALETTE[index % PALETTE.len()]))
        .collect()
}

/// Sorted, comma-joined id set
pub fn membership_fingerprint<'a, I>(ids: I) -> String
where
    I: IntoIterator<Item = &'a PlayerId>,
{
    sorted_ids(ids).join(",")
}

fn sorted_ids<'a, I>(ids: I) -> Vec<PlayerId>
where
    I: IntoIterator<Item = &'a PlayerId>,
{
    let mut sorted: Vec<PlayerId> = ids.into_iter().cloned().collect();
    sorted.sort();
    sorted
}

/// Keeps the color map for the current roster, recomputing it only when the
/// membership changes. Health, position and other attribute updates leave the
/// assignment untouched.
#[derive(Debug, Default)]
pub struct ColorAssigner {
    membership: Vec<PlayerId>,
    colors: HashMap<PlayerId, &'static str>,
}

impl ColorAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the assignment was recomputed
    pub fn update(&mut self, players: &HashMap<PlayerId, Player>) -> bool {
        let membership = sorted_ids(players.keys());
        if membership == self.membership {
            return false;
        }

        self.colors = assign_colors(membership.iter());
        debug!("Recomputed colors for [{}]", membership.join(","));
        self.membership = membership;
        true
    }

    pub fn color_of(&self, id: &str) -> Option<&'static str> {
        self.colors.get(id).copied()
    }

    pub fn colors(&self) -> &HashMap<PlayerId, &'static str> {
        &self.colors
    }
}

impl StateObserver for ColorAssigner {
    fn state_changed(&mut self, state: &MatchState, changes: &StateChanges) {
        if changes.players {
            self.update(&state.players);
        }
    }
}
