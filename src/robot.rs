use std::collections::HashSet;

use crate::vector::Vector2;

/// Half-width of the square target area; cells with both coordinates in
/// `[-TARGET_RADIUS, TARGET_RADIUS]` may hold the message.
pub(crate) const TARGET_RADIUS: i32 = 2;

/// Server-side model of a remote robot, inferred from its position reports.
#[derive(Debug, Default)]
pub(crate) struct Robot {
    position: Option<Vector2>,
    heading: Option<Vector2>,
    charging: bool,
    searched: HashSet<Vector2>,
}

impl Robot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn position(&self) -> Option<Vector2> {
        self.position
    }

    pub(crate) fn heading(&self) -> Option<Vector2> {
        self.heading
    }

    pub(crate) fn is_charging(&self) -> bool {
        self.charging
    }

    pub(crate) fn start_charging(&mut self) {
        self.charging = true;
    }

    pub(crate) fn stop_charging(&mut self) {
        self.charging = false;
    }

    /// Applies a reported position, inferring the heading from the delta.
    ///
    /// A report equal to the current position is a turn acknowledgement and
    /// leaves the heading untouched. A unit delta defines the heading; any
    /// other delta is inconsistent with a single-cell move and invalidates it.
    pub(crate) fn move_to(&mut self, to: Vector2) {
        let Some(from) = self.position else {
            self.position = Some(to);
            return;
        };

        if from == to {
            return;
        }

        let delta = to - from;
        if delta.is_unit() {
            self.heading = Some(delta);
        } else {
            tracing::debug!("position jumped by {delta:?}, heading unknown again");
            self.heading = None;
        }
        self.position = Some(to);
    }

    pub(crate) fn turn_left(&mut self) {
        self.heading = self.heading.map(Vector2::rotated_left);
    }

    pub(crate) fn turn_right(&mut self) {
        self.heading = self.heading.map(Vector2::rotated_right);
    }

    /// Records that the current cell has been probed for the message.
    pub(crate) fn mark_searched(&mut self) {
        if let Some(pos) = self.position {
            if Self::inside_target(pos) {
                self.searched.insert(pos);
            }
        }
    }

    pub(crate) fn is_searched(&self, cell: Vector2) -> bool {
        self.searched.contains(&cell)
    }

    pub(crate) fn inside_target(cell: Vector2) -> bool {
        cell.x.abs() <= TARGET_RADIUS && cell.y.abs() <= TARGET_RADIUS
    }
}
