//! Cycling through an ordered list relative to a current value
//!
//! Cameras, modes, flash modes and frame rates all cycle the same way, so
//! there is exactly one implementation of the stepping rule.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Step from `current` in `list`.
///
/// Stepping past either end wraps around. A `current` that is not in the
/// list resolves to the first element (`Next`) or the last (`Previous`).
/// Returns `None` only for an empty list.
pub fn cyclic_step<T: PartialEq + Clone>(list: &[T], current: &T, direction: Direction) -> Option<T> {
    let position = list.iter().position(|item| item == current);
    let index = match (direction, position) {
        (Direction::Next, Some(i)) if i + 1 < list.len() => i + 1,
        (Direction::Next, _) => 0,
        (Direction::Previous, Some(i)) if i > 0 => i - 1,
        (Direction::Previous, _) => list.len().checked_sub(1)?,
    };
    list.get(index).cloned()
}
