//! Camera that keeps the local player centered without showing past the map

use crate::game::{MatchState, StateChanges, StateObserver};
use shared::{Position, CELL_SIZE};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraOffset {
    pub x: f32,
    pub y: f32,
}

/// Observed pixel size of the area the map is drawn into
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Everything the offset depends on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraInputs {
    pub player: Position,
    pub cell_size: f32,
    /// `(columns, rows)`
    pub map: (usize, usize),
    pub viewport: Viewport,
}

/// Offset along one axis. A map larger than the viewport scrolls but never
/// past either edge; a smaller map is centered.
pub fn axis_offset(viewport_extent: f32, map_extent: f32, player_center: f32) -> f32 {
    if map_extent > viewport_extent {
        let desired = viewport_extent / 2.0 - player_center;
        desired.clamp(viewport_extent - map_extent, 0.0)
    } else {
        (viewport_extent - map_extent) / 2.0
    }
}

pub fn compute_offset(inputs: &CameraInputs) -> CameraOffset {
    let cell = inputs.cell_size;
    let (columns, rows) = inputs.map;
    let center_x = inputs.player.x as f32 * cell + cell / 2.0;
    let center_y = inputs.player.y as f32 * cell + cell / 2.0;

    CameraOffset {
        x: axis_offset(inputs.viewport.width, columns as f32 * cell, center_x),
        y: axis_offset(inputs.viewport.height, rows as f32 * cell, center_y),
    }
}

/// Holds the last emitted offset and the inputs it was computed from.
///
/// The offset is a pure function of the inputs; the memory only serves to skip
/// recomputation and redundant redraws.
#[derive(Debug, Default)]
pub struct CameraController {
    local_player: Option<String>,
    viewport: Option<Viewport>,
    last_inputs: Option<CameraInputs>,
    offset: CameraOffset,
}

impl CameraController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> CameraOffset {
        self.offset
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn set_local_player(&mut self, id: Option<String>) {
        self.local_player = id;
    }

    pub fn set_viewport(&mut self, viewport: Viewport, state: &MatchState) -> Option<CameraOffset> {
        self.viewport = Some(viewport);
        self.refresh(state)
    }

    /// Collects the current inputs, or None while the local player, the map
    /// or a usable viewport is missing
    pub fn inputs(&self, state: &MatchState) -> Option<CameraInputs> {
        let viewport = self.viewport.filter(|v| v.width > 0.0 && v.height > 0.0)?;
        let player = state.player(self.local_player.as_deref()?)?;
        let map = state.map_dimensions()?;

        Some(CameraInputs {
            player: player.position,
            cell_size: CELL_SIZE,
            map,
            viewport,
        })
    }

    /// Recomputes when the inputs differ from the previous call. Returns the
    /// new offset only when it differs from the one already emitted.
    pub fn refresh(&mut self, state: &MatchState) -> Option<CameraOffset> {
        let inputs = self.inputs(state)?;
        if self.last_inputs == Some(inputs) {
            return None;
        }
        self.last_inputs = Some(inputs);

        let offset = compute_offset(&inputs);
        if offset == self.offset {
            return None;
        }
        self.offset = offset;
        Some(offset)
    }
}

impl StateObserver for CameraController {
    fn state_changed(&mut self, state: &MatchState, changes: &StateChanges) {
        if changes.players || changes.map {
            self.refresh(state);
        }
    }
}
