//! Priority scale bridging.
//!
//! The left store uses `0` (none), `1` (high), `5` (medium) and `9` (low).
//! The canonical scale is the remote one, where larger means more urgent.

/// Converts a left-side priority to the canonical scale.
pub fn priority_from_left(left: i32) -> i32 {
    match left {
        1 => 3,
        5 => 2,
        9 => 1,
        _ => 0,
    }
}

/// Converts a canonical priority to the left-side scale.
pub fn priority_to_left(canonical: i32) -> i32 {
    match canonical {
        1 => 9,
        2 => 5,
        p if p >= 3 => 1,
        _ => 0,
    }
}
