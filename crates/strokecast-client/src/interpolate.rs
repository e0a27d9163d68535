//! Gap filling between sparse points
//!
//! When two consecutive points lie further apart than `max_gap`, points are
//! synthesized along a quadratic Bézier between them so the rendered line
//! stays smooth. The control point sits at the segment midpoint, nudged by
//! the direction of travel and scaled by `damping` to keep curvature low.

use strokecast_core::Point;

/// Upper bound on points synthesized for a single segment
///
/// Keeps a corrupt or wildly distant point from producing an unbounded
/// number of samples.
pub const MAX_POINTS_PER_SEGMENT: usize = 4096;

/// Fill gaps wider than `max_gap` with points on a damped quadratic curve
///
/// Original points are kept exactly and in order. A segment of length `d`
/// receives `ceil(d / max_gap)` intermediate points, evenly spaced in the
/// curve parameter. Inputs with fewer than two points, or a non-positive
/// `max_gap`, are returned unchanged.
pub fn interpolate(points: &[Point], max_gap: f64, damping: f64) -> Vec<Point> {
    if points.len() < 2 || !(max_gap.is_finite() && max_gap > 0.0) {
        return points.to_vec();
    }

    let mut out = Vec::with_capacity(points.len());
    out.push(points[0]);

    for i in 1..points.len() {
        let prev = points[i - 1];
        let current = points[i];
        let distance = prev.distance_to(&current);

        if distance > max_gap {
            let control = control_point(points, i, damping);
            let steps = ((distance / max_gap).ceil() as usize).min(MAX_POINTS_PER_SEGMENT);

            for j in 1..=steps {
                let t = j as f64 / (steps + 1) as f64;
                out.push(quadratic(&prev, &control, &current, t));
            }
        }

        out.push(current);
    }

    out
}

/// Control point for the segment ending at `points[i]`
///
/// Uses the direction of the segment before `prev` when there is one,
/// otherwise mirrors the direction towards the next point.
fn control_point(points: &[Point], i: usize, damping: f64) -> (f64, f64) {
    let prev = points[i - 1];
    let current = points[i];
    let mid_x = (prev.x + current.x) / 2.0;
    let mid_y = (prev.y + current.y) / 2.0;

    let (dx, dy) = if i >= 2 {
        let before = points[i - 2];
        ((prev.x - before.x) * damping, (prev.y - before.y) * damping)
    } else if let Some(next) = points.get(i + 1) {
        (-(next.x - current.x) * damping, -(next.y - current.y) * damping)
    } else {
        (0.0, 0.0)
    };

    (mid_x + dx, mid_y + dy)
}

fn quadratic(start: &Point, control: &(f64, f64), end: &Point, t: f64) -> Point {
    let u = 1.0 - t;
    let x = u * u * start.x + 2.0 * u * t * control.0 + t * t * end.x;
    let y = u * u * start.y + 2.0 * u * t * control.1 + t * t * end.y;
    Point::new(x, y, lerp_timestamp(start.timestamp, end.timestamp, t))
}

/// Timestamps come from remote clients, so any pair of `i64` values must work
fn lerp_timestamp(start: i64, end: i64, t: f64) -> i64 {
    let span = i128::from(end) - i128::from(start);
    let offset = (span as f64 * t).round() as i128;
    (i128::from(start) + offset).clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}
