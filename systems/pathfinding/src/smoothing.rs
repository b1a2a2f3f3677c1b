//! Corner extraction for raw cell-centre paths.

use terminal_crowd_core::Position;

/// Keeps only the corner points of `points`.
///
/// An interior point `B` between the last kept point `A` and the following
/// raw point `C` is dropped when `|AB| + |BC| - |AC| <= epsilon`, i.e. when it
/// lies on the segment `AC`. Both endpoints are always kept. Applying the
/// function to its own output returns the same sequence.
#[must_use]
pub fn smooth_corners(points: &[Position], epsilon: f64) -> Vec<Position> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut kept = Vec::with_capacity(points.len());
    kept.push(points[0]);

    for window in points.windows(2).skip(1) {
        let (candidate, next) = (window[0], window[1]);
        let anchor = kept[kept.len() - 1];
        let detour = anchor.distance(candidate) + candidate.distance(next) - anchor.distance(next);
        if detour > epsilon {
            kept.push(candidate);
        }
    }

    kept.push(points[points.len() - 1]);
    kept
}
