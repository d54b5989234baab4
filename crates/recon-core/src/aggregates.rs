//! Derived mission aggregates behind a dirty flag.
//!
//! Combined trajectories, cut markers and total distance are derived
//! from the segment sequence, cached on first access, invalidated by
//! every store mutation and never persisted — after an import they are
//! always recomputed from scratch.

use crate::models::{Mission, Point};
use crate::trajectory::{arc_length, distance, split_at_distance};
use std::collections::BTreeMap;

/// Tolerance for collapsing a duplicated point at a segment junction.
const JUNCTION_TOLERANCE: f64 = 0.001;

/// Marker rendered where an operator cut occurred.
#[derive(Debug, Clone, PartialEq)]
pub struct CutMarker {
    /// Sequential label: C1, C2, ...
    pub label: String,
    /// Representative position (first drone with a recorded cut).
    pub position: Point,
    /// Distance traveled along the originating segment at cut time.
    pub distance: f64,
    pub lost_drones: Vec<String>,
    pub segment_index: usize,
}

#[derive(Debug, Default)]
struct Aggregates {
    combined: BTreeMap<String, Vec<Point>>,
    markers: Vec<CutMarker>,
    total_distance: f64,
}

/// Lazily recomputed aggregates over a mission's segment sequence.
#[derive(Debug)]
pub struct AggregateCache {
    dirty: bool,
    data: Aggregates,
}

impl Default for AggregateCache {
    fn default() -> Self {
        Self {
            dirty: true,
            data: Aggregates::default(),
        }
    }
}

impl AggregateCache {
    /// Mark the cache stale. Called by every store mutation.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Per-drone concatenation of flown trajectories across segments,
    /// in index order, with exact-duplicate junction points collapsed.
    pub fn combined_trajectories(&mut self, mission: &Mission) -> &BTreeMap<String, Vec<Point>> {
        self.refresh(mission);
        &self.data.combined
    }

    /// One marker per segment that carries a cut, labeled C1, C2, ...
    pub fn cut_markers(&mut self, mission: &Mission) -> &[CutMarker] {
        self.refresh(mission);
        &self.data.markers
    }

    /// Mission duration is bounded by the longest-traveling drone, so
    /// this is the maximum combined arc length, not the sum.
    pub fn total_distance(&mut self, mission: &Mission) -> f64 {
        self.refresh(mission);
        self.data.total_distance
    }

    fn refresh(&mut self, mission: &Mission) {
        if !self.dirty {
            return;
        }
        self.data = compute(mission);
        self.dirty = false;
    }
}

fn compute(mission: &Mission) -> Aggregates {
    let mut combined: BTreeMap<String, Vec<Point>> = BTreeMap::new();

    for segment in &mission.segments {
        for (drone_id, route) in &segment.solution.routes {
            let flown = flown_portion(&route.trajectory, segment.cut.as_ref().map(|c| c.distance));
            if flown.is_empty() {
                continue;
            }
            let path = combined.entry(drone_id.clone()).or_default();
            for point in flown {
                let duplicate_junction = path
                    .last()
                    .is_some_and(|last| distance(*last, point) < JUNCTION_TOLERANCE);
                if !duplicate_junction {
                    path.push(point);
                }
            }
        }
    }

    let mut markers = Vec::new();
    for segment in &mission.segments {
        let Some(cut) = &segment.cut else { continue };
        let Some(position) = cut.positions.values().next().copied() else {
            continue;
        };
        markers.push(CutMarker {
            label: format!("C{}", markers.len() + 1),
            position,
            distance: cut.distance,
            lost_drones: segment.lost_drones.clone(),
            segment_index: segment.index,
        });
    }

    let total_distance = combined
        .values()
        .map(|path| arc_length(path))
        .fold(0.0, f64::max);

    Aggregates {
        combined,
        markers,
        total_distance,
    }
}

/// The flown part of a segment trajectory: everything up to the cut
/// distance, or the whole trajectory when the segment was never cut.
fn flown_portion(trajectory: &[Point], cut_distance: Option<f64>) -> Vec<Point> {
    match cut_distance {
        // Coordinates were validated when the segment was cut.
        Some(d) => match split_at_distance(trajectory, d) {
            Ok(Some(split)) => split.prefix,
            _ => Vec::new(),
        },
        None => trajectory.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BaseEnvironment, CutRecord, DroneRoute, Segment, SegmentEnvironment, SolverSolution,
    };
    use chrono::Utc;

    fn segment(index: usize, drone: &str, trajectory: Vec<Point>, cut: Option<CutRecord>) -> Segment {
        let mut routes = BTreeMap::new();
        routes.insert(
            drone.to_string(),
            DroneRoute {
                route: Vec::new(),
                trajectory,
            },
        );
        Segment {
            index,
            solution: SolverSolution {
                routes,
                sequences: serde_json::Value::Null,
            },
            environment: SegmentEnvironment::default(),
            drone_configs: BTreeMap::new(),
            cut,
            lost_drones: Vec::new(),
            added_drones: Vec::new(),
            visited_targets: Vec::new(),
            active_targets: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn mission(segments: Vec<Segment>) -> Mission {
        Mission {
            base: BaseEnvironment::default(),
            current_index: segments.len().saturating_sub(1),
            segments,
            active: true,
        }
    }

    #[test]
    fn junction_duplicates_are_collapsed() {
        let cut = CutRecord {
            positions: BTreeMap::from([("1".to_string(), [40.0, 0.0])]),
            distance: 40.0,
        };
        let m = mission(vec![
            segment(0, "1", vec![[0.0, 0.0], [100.0, 0.0]], Some(cut)),
            segment(1, "1", vec![[40.0, 0.0], [40.0, 60.0]], None),
        ]);
        let mut cache = AggregateCache::default();
        let combined = cache.combined_trajectories(&m);
        assert_eq!(
            combined.get("1").unwrap(),
            &vec![[0.0, 0.0], [40.0, 0.0], [40.0, 60.0]]
        );
    }

    #[test]
    fn cut_segments_contribute_only_the_flown_prefix() {
        let cut = CutRecord {
            positions: BTreeMap::from([("1".to_string(), [40.0, 0.0])]),
            distance: 40.0,
        };
        let m = mission(vec![segment(
            0,
            "1",
            vec![[0.0, 0.0], [100.0, 0.0]],
            Some(cut),
        )]);
        let mut cache = AggregateCache::default();
        assert!((cache.total_distance(&m) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn markers_are_labeled_sequentially() {
        let cut_a = CutRecord {
            positions: BTreeMap::from([("1".to_string(), [10.0, 0.0])]),
            distance: 10.0,
        };
        let cut_b = CutRecord {
            positions: BTreeMap::from([("1".to_string(), [10.0, 20.0])]),
            distance: 20.0,
        };
        let m = mission(vec![
            segment(0, "1", vec![[0.0, 0.0], [10.0, 0.0]], Some(cut_a)),
            segment(1, "1", vec![[10.0, 0.0], [10.0, 40.0]], Some(cut_b)),
        ]);
        let mut cache = AggregateCache::default();
        let markers = cache.cut_markers(&m).to_vec();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].label, "C1");
        assert_eq!(markers[1].label, "C2");
        assert_eq!(markers[0].segment_index, 0);
        assert_eq!(markers[1].distance, 20.0);
    }

    #[test]
    fn total_distance_is_max_across_drones_not_sum() {
        let mut seg = segment(0, "1", vec![[0.0, 0.0], [100.0, 0.0]], None);
        seg.solution.routes.insert(
            "2".to_string(),
            DroneRoute {
                route: Vec::new(),
                trajectory: vec![[0.0, 0.0], [0.0, 30.0]],
            },
        );
        let m = mission(vec![seg]);
        let mut cache = AggregateCache::default();
        assert!((cache.total_distance(&m) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn total_distance_grows_as_segments_are_appended() {
        let cut = CutRecord {
            positions: BTreeMap::from([("1".to_string(), [50.0, 0.0])]),
            distance: 50.0,
        };
        let first = segment(0, "1", vec![[0.0, 0.0], [100.0, 0.0]], Some(cut));
        let mut cache = AggregateCache::default();

        let m1 = mission(vec![first.clone()]);
        let before = cache.total_distance(&m1);

        cache.invalidate();
        let m2 = mission(vec![
            first,
            segment(1, "1", vec![[50.0, 0.0], [50.0, 80.0]], None),
        ]);
        let after = cache.total_distance(&m2);
        assert!(after >= before);
    }
}
