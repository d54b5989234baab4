//! Polyline arc-length geometry for splitting flown trajectories.
//!
//! Everything here is pure and deterministic; the engine calls into
//! this module when an operator cuts a mission mid-flight and the
//! already-flown prefix of each trajectory must be frozen.

use crate::error::EngineError;
use crate::models::Point;

/// Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    (dx * dx + dy * dy).sqrt()
}

/// Total arc length of a polyline.
pub fn arc_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| distance(w[0], w[1])).sum()
}

/// Cumulative arc length at each vertex. `out[0] == 0.0` and
/// `out.last()` is the total length.
pub fn cumulative_lengths(points: &[Point]) -> Vec<f64> {
    let mut out = Vec::with_capacity(points.len());
    let mut total = 0.0;
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            total += distance(points[i - 1], *p);
        }
        out.push(total);
    }
    out
}

/// Result of splitting a polyline at a traveled distance.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitResult {
    /// Flown portion, ending at the split point.
    pub prefix: Vec<Point>,
    /// Remaining portion, starting at the split point. Empty when the
    /// split distance reaches or exceeds the total length.
    pub suffix: Vec<Point>,
    pub split_point: Point,
}

fn ensure_finite(points: &[Point]) -> Result<(), EngineError> {
    for p in points {
        if !p[0].is_finite() || !p[1].is_finite() {
            return Err(EngineError::NonFiniteCoordinate);
        }
    }
    Ok(())
}

/// Split a polyline at an arc-length distance from its start.
///
/// Returns `Ok(None)` for an empty polyline (nothing to split). A
/// distance at or beyond the total length yields the full polyline as
/// prefix, an empty suffix, and the last point as the split point.
/// Zero-length edges and single-point polylines are treated as
/// "already at start/end" and never divide by zero.
pub fn split_at_distance(
    points: &[Point],
    distance_along: f64,
) -> Result<Option<SplitResult>, EngineError> {
    ensure_finite(points)?;
    if !distance_along.is_finite() {
        return Err(EngineError::NonFiniteCoordinate);
    }

    let Some(&last) = points.last() else {
        return Ok(None);
    };

    let target = distance_along.max(0.0);
    let cumulative = cumulative_lengths(points);
    let total = *cumulative.last().unwrap_or(&0.0);

    if target >= total {
        return Ok(Some(SplitResult {
            prefix: points.to_vec(),
            suffix: Vec::new(),
            split_point: last,
        }));
    }

    // First vertex whose cumulative length reaches the target. The
    // early return above guarantees one exists past index 0.
    let mut idx = 1;
    while idx < cumulative.len() && cumulative[idx] < target {
        idx += 1;
    }

    let edge_len = cumulative[idx] - cumulative[idx - 1];
    let fraction = if edge_len > f64::EPSILON {
        (target - cumulative[idx - 1]) / edge_len
    } else {
        0.0
    };

    let a = points[idx - 1];
    let b = points[idx];
    let split_point = [
        a[0] + (b[0] - a[0]) * fraction,
        a[1] + (b[1] - a[1]) * fraction,
    ];

    let mut prefix = points[..idx].to_vec();
    prefix.push(split_point);

    let mut suffix = Vec::with_capacity(points.len() - idx + 1);
    suffix.push(split_point);
    suffix.extend_from_slice(&points[idx..]);

    Ok(Some(SplitResult {
        prefix,
        suffix,
        split_point,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_in_the_middle_of_an_edge() {
        let line = vec![[0.0, 0.0], [100.0, 0.0]];
        let result = split_at_distance(&line, 40.0).unwrap().unwrap();
        assert_eq!(result.prefix, vec![[0.0, 0.0], [40.0, 0.0]]);
        assert_eq!(result.suffix, vec![[40.0, 0.0], [100.0, 0.0]]);
        assert_eq!(result.split_point, [40.0, 0.0]);
    }

    #[test]
    fn split_beyond_total_length_returns_full_prefix() {
        let line = vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]];
        let result = split_at_distance(&line, 50.0).unwrap().unwrap();
        assert_eq!(result.prefix, line);
        assert!(result.suffix.is_empty());
        assert_eq!(result.split_point, [10.0, 10.0]);
    }

    #[test]
    fn prefix_plus_suffix_reconstructs_polyline() {
        let line = vec![[0.0, 0.0], [30.0, 40.0], [30.0, 100.0], [90.0, 100.0]];
        let total = arc_length(&line);
        for step in 0..=10 {
            let d = total * step as f64 / 10.0;
            let result = split_at_distance(&line, d).unwrap().unwrap();
            assert!((arc_length(&result.prefix) - d).abs() < 1e-9);

            let mut rebuilt = result.prefix.clone();
            rebuilt.extend(result.suffix.iter().skip(1));
            let rebuilt_len = arc_length(&rebuilt);
            assert!((rebuilt_len - total).abs() < 1e-9);
        }
    }

    #[test]
    fn single_point_polyline_is_already_at_end() {
        let line = vec![[5.0, 7.0]];
        let result = split_at_distance(&line, 3.0).unwrap().unwrap();
        assert_eq!(result.prefix, vec![[5.0, 7.0]]);
        assert!(result.suffix.is_empty());
        assert_eq!(result.split_point, [5.0, 7.0]);
    }

    #[test]
    fn empty_polyline_has_nothing_to_split() {
        assert!(split_at_distance(&[], 3.0).unwrap().is_none());
    }

    #[test]
    fn zero_length_edges_do_not_divide_by_zero() {
        let line = vec![[0.0, 0.0], [0.0, 0.0], [10.0, 0.0]];
        let result = split_at_distance(&line, 5.0).unwrap().unwrap();
        assert_eq!(result.split_point, [5.0, 0.0]);
    }

    #[test]
    fn negative_distance_clamps_to_start() {
        let line = vec![[0.0, 0.0], [10.0, 0.0]];
        let result = split_at_distance(&line, -4.0).unwrap().unwrap();
        assert_eq!(result.split_point, [0.0, 0.0]);
        assert_eq!(result.prefix, vec![[0.0, 0.0], [0.0, 0.0]]);
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let line = vec![[0.0, 0.0], [f64::NAN, 0.0]];
        assert_eq!(
            split_at_distance(&line, 1.0).unwrap_err(),
            EngineError::NonFiniteCoordinate
        );
    }
}
