use crate::robot::{Robot, TARGET_RADIUS};
use crate::vector::Vector2;

/// Next instruction for a robot, decided from its inferred state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Move,
    TurnLeft,
    TurnRight,
    GetMessage,
    /// Every target cell has been probed; there is nothing left to find.
    Finished,
}

/// Decides the next command.
///
/// Until both position and heading are known the robot is told to move, so
/// that a second distinct position report reveals the heading. On an
/// unsearched target cell the message is probed. Otherwise the robot takes a
/// greedy step toward the nearest unsearched cell; candidate ties are broken
/// forward, right, left. The grid has no obstacles, so the greedy walk
/// reaches every cell.
pub(crate) fn next_command(robot: &Robot) -> Command {
    let (Some(pos), Some(heading)) = (robot.position(), robot.heading()) else {
        return Command::Move;
    };

    if Robot::inside_target(pos) && !robot.is_searched(pos) {
        return Command::GetMessage;
    }

    let Some(target) = nearest_unsearched(robot, pos) else {
        return Command::Finished;
    };

    let forward = (pos + heading).taxicab(target);
    let right = (pos + heading.rotated_right()).taxicab(target);
    let left = (pos + heading.rotated_left()).taxicab(target);

    if forward <= right && forward <= left {
        Command::Move
    } else if right <= left {
        Command::TurnRight
    } else {
        Command::TurnLeft
    }
}

/// Nearest unsearched target cell by taxicab distance. Ties keep the first
/// cell in x-major iteration order over the area.
fn nearest_unsearched(robot: &Robot, from: Vector2) -> Option<Vector2> {
    let mut nearest: Option<(Vector2, i32)> = None;

    for x in -TARGET_RADIUS..=TARGET_RADIUS {
        for y in -TARGET_RADIUS..=TARGET_RADIUS {
            let cell = Vector2::new(x, y);
            if robot.is_searched(cell) {
                continue;
            }
            let dist = from.taxicab(cell);
            if nearest.is_none_or(|(_, best)| dist < best) {
                nearest = Some((cell, dist));
            }
        }
    }

    nearest.map(|(cell, _)| cell)
}
