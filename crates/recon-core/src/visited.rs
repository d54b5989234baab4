//! Visited-target detection.
//!
//! Two deliberately separate algorithms: a post-hoc check run when the
//! operator cuts a segment (which targets did the drone physically pass
//! before the cut) and a cheap instantaneous-proximity check used only
//! for live display during animation.
//!
//! The post-hoc check depends on trajectory sampling density: a very
//! sparse polyline can miss a true visit, and a path that merely skims
//! a target can be credited with one. That approximation is accepted;
//! see DESIGN.md.

use crate::models::{DroneRoute, Point, Target};
use crate::trajectory::{cumulative_lengths, distance};
use std::collections::BTreeSet;

/// Proximity threshold for crediting a visit at cut time.
pub const VISIT_THRESHOLD: f64 = 20.0;

/// Tighter threshold for the live display check.
pub const LIVE_VISIT_THRESHOLD: f64 = 10.0;

/// Targets a drone has physically passed by the time it traveled
/// `traveled` along its trajectory.
///
/// For each target-denoting waypoint in the route, the nearest
/// trajectory vertex (Euclidean) is located together with its
/// cumulative arc length. The target counts as visited iff that
/// nearest distance is below `threshold` AND the drone's traveled
/// distance has reached the vertex's arc length — approaching a target
/// later in the route does not credit it early.
pub fn visited_targets(
    route: &DroneRoute,
    targets: &[Target],
    traveled: f64,
    threshold: f64,
) -> Vec<String> {
    if route.trajectory.is_empty() {
        return Vec::new();
    }

    let cumulative = cumulative_lengths(&route.trajectory);
    let mut visited = Vec::new();
    let mut seen = BTreeSet::new();

    for waypoint_id in &route.route {
        let Some(target) = targets.iter().find(|t| &t.id == waypoint_id) else {
            continue; // airports and synthetic starts are not targets
        };
        if seen.contains(&target.id) {
            continue;
        }

        let mut best_idx = 0;
        let mut best_dist = f64::INFINITY;
        for (i, p) in route.trajectory.iter().enumerate() {
            let d = distance(*p, target.position);
            if d < best_dist {
                best_dist = d;
                best_idx = i;
            }
        }

        if best_dist < threshold && traveled >= cumulative[best_idx] {
            seen.insert(target.id.clone());
            visited.push(target.id.clone());
        }
    }

    visited
}

/// Instantaneous proximity check for the live display: a target lights
/// up as visited while any rendered drone position is within
/// `threshold` of it. Not persisted and independent of the post-hoc
/// algorithm.
pub fn live_visited_targets(
    drone_positions: &[Point],
    targets: &[Target],
    threshold: f64,
) -> BTreeSet<String> {
    targets
        .iter()
        .filter(|t| {
            drone_positions
                .iter()
                .any(|p| distance(*p, t.position) < threshold)
        })
        .map(|t| t.id.clone())
        .collect()
}
