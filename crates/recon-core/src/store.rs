//! Segment store: the ordered, immutable segment sequence and the cut
//! workflow.
//!
//! One caller-owned store per mission; every operation completes
//! synchronously within the call and there is exactly one writer. A
//! hosting layer that serves multiple sessions must confine each store
//! to one session (or add its own per-mission lock).

use crate::aggregates::{AggregateCache, CutMarker};
use crate::error::EngineError;
use crate::models::{
    BaseEnvironment, CutRecord, DroneConfig, Mission, Point, Segment, SegmentEnvironment,
    SolverSolution,
};
use crate::trajectory::split_at_distance;
use crate::visited::{visited_targets, VISIT_THRESHOLD};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// A drone's playback progress at cut time, as reported by the
/// animation layer.
#[derive(Debug, Clone, Copy)]
pub struct DroneProgress {
    pub distance_traveled: f64,
    pub total_distance: f64,
}

/// Everything the UI needs after a cut.
#[derive(Debug, Clone)]
pub struct CutOutcome {
    /// Cut position per drone still in flight.
    pub positions: BTreeMap<String, Point>,
    /// Distance traveled along the segment at cut time.
    pub distance: f64,
    /// Targets credited as visited before the cut, across all drones.
    pub visited_targets: Vec<String>,
    /// Flown trajectory prefix per drone, for immediate redraw.
    pub truncated_trajectories: BTreeMap<String, Vec<Point>>,
}

/// A drone within this distance of its route end at cut time counts as
/// finished and contributes no cut position.
const FINISH_EPSILON: f64 = 1e-6;

/// Owns the mission and its derived aggregates.
#[derive(Debug, Default)]
pub struct SegmentStore {
    mission: Mission,
    aggregates: AggregateCache,
}

impl SegmentStore {
    /// A new, inactive store with no mission loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate a fresh mission over `base` at index 0 with no
    /// segments. Any previous mission is discarded.
    pub fn init_fresh(&mut self, base: BaseEnvironment) {
        info!(
            targets = base.targets.len(),
            airports = base.airports.len(),
            "starting fresh segmented mission"
        );
        self.mission = Mission {
            base,
            segments: Vec::new(),
            current_index: 0,
            active: true,
        };
        self.aggregates.invalidate();
    }

    /// Discard the mission entirely.
    pub fn reset(&mut self) {
        self.mission = Mission::default();
        self.aggregates.invalidate();
    }

    /// Replace the whole mission, e.g. after a document import.
    pub fn restore(&mut self, mission: Mission) {
        self.mission = mission;
        self.aggregates.invalidate();
    }

    pub fn mission(&self) -> &Mission {
        &self.mission
    }

    pub fn is_active(&self) -> bool {
        self.mission.active
    }

    pub fn segment_count(&self) -> usize {
        self.mission.segments.len()
    }

    pub fn current_index(&self) -> usize {
        self.mission.current_index
    }

    /// The segment the replay pointer rests on, if it exists yet.
    pub fn current_segment(&self) -> Option<&Segment> {
        self.mission.segments.get(self.mission.current_index)
    }

    /// Target ids frozen before segment `index`: the union of visited
    /// sets over segments [0, index). Monotonically non-decreasing.
    pub fn frozen_targets_before(&self, index: usize) -> BTreeSet<String> {
        self.mission
            .segments
            .iter()
            .take_while(|s| s.index < index)
            .flat_map(|s| s.visited_targets.iter().cloned())
            .collect()
    }

    /// Target ids still eligible for the next solve: the base catalog
    /// minus everything frozen so far.
    pub fn remaining_target_ids(&self) -> Vec<String> {
        let frozen = self.frozen_targets_before(self.mission.segments.len());
        self.mission
            .base
            .target_ids()
            .into_iter()
            .filter(|id| !frozen.contains(id))
            .collect()
    }

    /// Cumulative cut distance over segments [0, current_index): the
    /// starting offset used to resume replay at the current segment.
    pub fn replay_offset(&self) -> f64 {
        self.mission
            .segments
            .iter()
            .take(self.mission.current_index)
            .filter_map(|s| s.cut.as_ref())
            .map(|c| c.distance)
            .sum()
    }

    /// Wrap solver output into a new immutable segment, append it and
    /// move the pointer onto it.
    pub fn add_segment(
        &mut self,
        solution: SolverSolution,
        environment: SegmentEnvironment,
        drone_configs: BTreeMap<String, DroneConfig>,
        added_drones: Vec<String>,
    ) -> &Segment {
        let index = self.mission.segments.len();
        let active_targets: Vec<String> =
            environment.targets.iter().map(|t| t.id.clone()).collect();
        info!(
            index,
            drones = solution.routes.len(),
            active_targets = active_targets.len(),
            "appending segment"
        );
        let segment = Segment {
            index,
            solution,
            environment,
            drone_configs,
            cut: None,
            lost_drones: Vec::new(),
            added_drones,
            visited_targets: Vec::new(),
            active_targets,
            created_at: Utc::now(),
        };
        self.mission.segments.push(segment);
        self.mission.current_index = index;
        self.aggregates.invalidate();
        &self.mission.segments[index]
    }

    /// Freeze flown progress at the operator's cut.
    ///
    /// Each drone with an active route is split at its traveled
    /// distance; a drone within [`FINISH_EPSILON`] of its route end is
    /// finished and contributes no cut position. Visited targets are
    /// detected per drone and unioned. The current segment is replaced
    /// in place with the cut attached.
    pub fn perform_cut(
        &mut self,
        progress: &BTreeMap<String, DroneProgress>,
    ) -> Result<CutOutcome, EngineError> {
        let Some(segment) = self.current_segment().cloned() else {
            return Err(EngineError::CutWithoutSegment);
        };

        let mut positions = BTreeMap::new();
        let mut truncated = BTreeMap::new();
        let mut visited: Vec<String> = Vec::new();
        let mut fallback_distance: f64 = 0.0;

        for (drone_id, route) in &segment.solution.routes {
            // A drone absent from animation state flies no further
            // this segment and contributes nothing.
            let Some(p) = progress.get(drone_id) else {
                debug!(%drone_id, "no animation progress for drone, skipping");
                continue;
            };
            fallback_distance = fallback_distance.max(p.distance_traveled);

            for id in visited_targets(
                route,
                &segment.environment.targets,
                p.distance_traveled,
                VISIT_THRESHOLD,
            ) {
                if !visited.contains(&id) {
                    visited.push(id);
                }
            }

            if p.distance_traveled >= p.total_distance - FINISH_EPSILON {
                // Finished drones keep their whole trajectory.
                truncated.insert(drone_id.clone(), route.trajectory.clone());
                continue;
            }

            if let Some(split) = split_at_distance(&route.trajectory, p.distance_traveled)? {
                positions.insert(drone_id.clone(), split.split_point);
                truncated.insert(drone_id.clone(), split.prefix);
            }
        }

        // All drones share a uniform playback speed, so the first
        // drone with a recorded position speaks for the segment.
        let distance = positions
            .keys()
            .next()
            .and_then(|id| progress.get(id))
            .map(|p| p.distance_traveled)
            .unwrap_or(fallback_distance);

        let cut = CutRecord {
            positions: positions.clone(),
            distance,
        };
        info!(
            segment = segment.index,
            distance,
            visited = visited.len(),
            "cut recorded"
        );
        self.record_cut(cut, Vec::new(), visited.clone())?;

        Ok(CutOutcome {
            positions,
            distance,
            visited_targets: visited,
            truncated_trajectories: truncated,
        })
    }

    /// Replace the current segment with cut and lost-drone data
    /// attached, preserving every other field.
    pub fn record_cut(
        &mut self,
        cut: CutRecord,
        lost_drones: Vec<String>,
        visited: Vec<String>,
    ) -> Result<(), EngineError> {
        let index = self.mission.current_index;
        let Some(segment) = self.mission.segments.get(index) else {
            return Err(EngineError::CutWithoutSegment);
        };
        let replaced = segment.with_cut(cut, lost_drones, visited);
        self.mission.segments[index] = replaced;
        self.aggregates.invalidate();
        Ok(())
    }

    /// Move the pointer past the last segment, preparing for the next
    /// (not-yet-created) one.
    pub fn advance_segment(&mut self) {
        self.mission.current_index = self.mission.segments.len();
        self.aggregates.invalidate();
    }

    // ===== Renderer accessors =====

    /// Per-drone concatenation of flown trajectories across all
    /// segments, junction duplicates collapsed.
    pub fn combined_trajectories(&mut self) -> &BTreeMap<String, Vec<Point>> {
        self.aggregates.combined_trajectories(&self.mission)
    }

    /// Cut markers in order: C1, C2, ...
    pub fn cut_markers(&mut self) -> &[CutMarker] {
        self.aggregates.cut_markers(&self.mission)
    }

    /// Maximum combined arc length across drones.
    pub fn total_distance(&mut self) -> f64 {
        self.aggregates.total_distance(&self.mission)
    }

    /// Flown polylines per drone for segments [0, up_to): each cut
    /// segment contributes its prefix up to the cut distance, an uncut
    /// segment its whole trajectory.
    pub fn frozen_trajectories(&self, up_to: usize) -> BTreeMap<String, Vec<Vec<Point>>> {
        let mut out: BTreeMap<String, Vec<Vec<Point>>> = BTreeMap::new();
        for segment in self.mission.segments.iter().filter(|s| s.index < up_to) {
            for (drone_id, route) in &segment.solution.routes {
                let flown = match segment.cut.as_ref() {
                    Some(cut) => match split_at_distance(&route.trajectory, cut.distance) {
                        Ok(Some(split)) => split.prefix,
                        _ => Vec::new(),
                    },
                    None => route.trajectory.clone(),
                };
                if !flown.is_empty() {
                    out.entry(drone_id.clone()).or_default().push(flown);
                }
            }
        }
        out
    }

    /// Union of visited-target ids over segments [0, up_to].
    pub fn visited_targets_up_to(&self, up_to: usize) -> BTreeSet<String> {
        self.mission
            .segments
            .iter()
            .filter(|s| s.index <= up_to)
            .flat_map(|s| s.visited_targets.iter().cloned())
            .collect()
    }
}
