//! Per-contact identity, motion history, and gesture state.

use crate::cluster::ClusterId;
use crate::config::Thresholds;
use crate::geometry::{self, Pos};
use crate::target::TargetId;

/// Contact identifier assigned by the input source (evdev tracking id,
/// or whatever the trace supplies). Unique among active contacts.
pub type ContactId = i32;

/// Position histories are capped at this many samples; velocity and
/// rotation estimates need a full window.
pub const HISTORY_CAP: usize = 5;

/// One historical position of a contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub pos: Pos,
    pub at_ms: u64,
}

/// Gesture interpretation currently claimed by a contact. The enum makes
/// the drag/zoom/rotate states structurally mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointState {
    #[default]
    Idle,
    Dragging,
    Zooming,
    Rotating,
}

/// Flick vector handed to a target when a dragged contact lifts at
/// speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrowVector {
    pub distance: f64,
    pub duration_ms: u64,
    pub start: Pos,
    pub end: Pos,
}

/// One active contact on the surface.
#[derive(Debug, Clone)]
pub struct TouchPoint {
    pub id: ContactId,
    pub pos: Pos,
    /// Past positions, most recent first, capped at [`HISTORY_CAP`].
    pub history: Vec<Sample>,
    pub created_at_ms: u64,
    pub state: PointState,
    /// Ids of every cluster this contact currently belongs to.
    pub membership: Vec<ClusterId>,
    /// Weak handle into the target registry; set iff `state` is not
    /// `Idle`.
    pub target: Option<TargetId>,
    at_ms: u64,
}

impl TouchPoint {
    pub fn new(id: ContactId, pos: Pos, at_ms: u64) -> Self {
        Self {
            id,
            pos,
            history: Vec::new(),
            created_at_ms: at_ms,
            state: PointState::Idle,
            membership: Vec::new(),
            target: None,
            at_ms,
        }
    }

    /// Moves the contact, logging the prior position into history.
    pub fn move_to(&mut self, pos: Pos, at_ms: u64) {
        self.history.insert(
            0,
            Sample {
                pos: self.pos,
                at_ms: self.at_ms,
            },
        );
        self.history.truncate(HISTORY_CAP);
        self.pos = pos;
        self.at_ms = at_ms;
    }

    /// Positions only, most recent first, for rotation sums.
    pub fn history_positions(&self) -> Vec<Pos> {
        self.history.iter().map(|s| s.pos).collect()
    }

    /// Axis displacement from the oldest history sample to the current
    /// position. `None` until a full history window exists.
    fn window_displacement(&self) -> Option<(f64, f64)> {
        if self.history.len() < HISTORY_CAP {
            return None;
        }
        let oldest = self.history[self.history.len() - 1];
        Some((self.pos.x - oldest.pos.x, self.pos.y - oldest.pos.y))
    }

    /// Whether the contact has travelled far enough over its history
    /// window to be a drag candidate.
    pub fn was_moved(&self, th: &Thresholds) -> bool {
        match self.window_displacement() {
            Some((dx, dy)) => dx.abs() > th.move_threshold || dy.abs() > th.move_threshold,
            None => false,
        }
    }

    /// Whether the contact is exiting fast enough to count as a throw,
    /// and with what vector. The throw threshold strictly dominates the
    /// move threshold, so every throw also satisfies [`Self::was_moved`].
    pub fn was_thrown(&self, th: &Thresholds) -> Option<ThrowVector> {
        let (dx, dy) = self.window_displacement()?;
        if dx.abs() <= th.throw_threshold && dy.abs() <= th.throw_threshold {
            return None;
        }
        let oldest = self.history[self.history.len() - 1];
        Some(ThrowVector {
            distance: geometry::hypotenuse(dx.abs(), dy.abs()),
            duration_ms: self.at_ms.saturating_sub(oldest.at_ms),
            start: oldest.pos,
            end: self.pos,
        })
    }

    pub fn start_dragging(&mut self, target: TargetId) {
        self.state = PointState::Dragging;
        self.target = Some(target);
    }

    pub fn start_zooming(&mut self, target: TargetId) {
        self.state = PointState::Zooming;
        self.target = Some(target);
    }

    pub fn start_rotating(&mut self, target: TargetId) {
        self.state = PointState::Rotating;
        self.target = Some(target);
    }

    /// A contact is unoccupied while no gesture has claimed it.
    pub fn is_unoccupied(&self) -> bool {
        self.state == PointState::Idle
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at_ms)
    }
}
