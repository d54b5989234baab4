//! Environments derived from the segment sequence: what the renderer
//! shows, and what the route solver is handed for a checkpoint replan.

use crate::models::{
    Airport, DroneConfig, NoFlyZone, Point, SegmentEnvironment, Target,
};
use crate::store::SegmentStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// What the canvas renders: the fixed base geography plus the current
/// segment's full visible target set (frozen and active alike, so
/// nothing disappears mid-mission).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayEnvironment {
    pub airports: Vec<Airport>,
    #[serde(rename = "sams")]
    pub no_fly_zones: Vec<NoFlyZone>,
    pub targets: Vec<Target>,
    pub drone_configs: BTreeMap<String, DroneConfig>,
}

/// A pseudo-waypoint standing in for a drone's mid-flight position,
/// used as the solver's origin when replanning after a cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticStart {
    pub id: String,
    pub drone_id: String,
    pub position: Point,
}

/// Deterministic node id for a drone's synthetic start.
pub fn synthetic_start_id(drone_id: &str) -> String {
    format!("checkpoint-{drone_id}")
}

/// The constrained problem handed to the route solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverEnvironment {
    /// Targets still to be routed (base catalog minus visited ids).
    pub targets: Vec<Target>,
    pub airports: Vec<Airport>,
    #[serde(rename = "sams")]
    pub no_fly_zones: Vec<NoFlyZone>,
    /// Deep copy of the UI's live configuration; last-second edits are
    /// authoritative over any stored snapshot.
    pub drone_configs: BTreeMap<String, DroneConfig>,
    pub synthetic_starts: Vec<SyntheticStart>,
}

impl SolverEnvironment {
    /// The slice of this environment that gets stored with the solved
    /// segment (synthetic starts are not targets and are not kept).
    pub fn to_segment_environment(&self) -> SegmentEnvironment {
        SegmentEnvironment {
            targets: self.targets.clone(),
            airports: self.airports.clone(),
            no_fly_zones: self.no_fly_zones.clone(),
            drone_configs: self.drone_configs.clone(),
        }
    }
}

/// Environment for the renderer, resolved against the base catalog in
/// catalog order: every target frozen before the current segment plus
/// the segment's active set.
pub fn display_environment(store: &SegmentStore) -> DisplayEnvironment {
    let mission = store.mission();
    // When the pointer has advanced past the end (next segment not yet
    // solved), the last solved segment is still what is on screen.
    let segment = store
        .current_segment()
        .or_else(|| mission.segments.last());

    let targets = match segment {
        Some(seg) => {
            let frozen = store.frozen_targets_before(seg.index);
            let active: BTreeSet<&String> = seg.active_targets.iter().collect();
            mission
                .base
                .targets
                .iter()
                .filter(|t| frozen.contains(&t.id) || active.contains(&t.id))
                .cloned()
                .collect()
        }
        None => mission.base.targets.clone(),
    };

    DisplayEnvironment {
        airports: mission.base.airports.clone(),
        no_fly_zones: mission.base.no_fly_zones.clone(),
        targets,
        drone_configs: segment
            .map(|s| s.drone_configs.clone())
            .unwrap_or_default(),
    }
}

/// Build the solver input for the next segment.
///
/// Targets are the base catalog minus `visited`. Drone configs are a
/// deep copy of the live UI configuration. Past the first segment, one
/// synthetic start is injected per enabled drone at that drone's
/// previous-segment cut position and the drone's start airport is
/// rewritten to the synthetic node; a drone with no recorded cut
/// position (e.g. newly enabled) keeps its configured start airport.
pub fn solver_environment(
    store: &SegmentStore,
    ui_configs: &BTreeMap<String, DroneConfig>,
    visited: &BTreeSet<String>,
) -> SolverEnvironment {
    let mission = store.mission();
    let targets: Vec<Target> = mission
        .base
        .targets
        .iter()
        .filter(|t| !visited.contains(&t.id))
        .cloned()
        .collect();

    let mut drone_configs = ui_configs.clone();
    let mut synthetic_starts = Vec::new();

    let previous_cut = mission
        .segments
        .last()
        .and_then(|seg| seg.cut.as_ref());

    if let Some(cut) = previous_cut {
        for (drone_id, config) in drone_configs.iter_mut() {
            if !config.enabled {
                continue;
            }
            let Some(position) = cut.positions.get(drone_id) else {
                debug!(%drone_id, "no cut position, keeping configured start airport");
                continue;
            };
            let node_id = synthetic_start_id(drone_id);
            config.start_airport = node_id.clone();
            synthetic_starts.push(SyntheticStart {
                id: node_id,
                drone_id: drone_id.clone(),
                position: *position,
            });
        }
    }

    SolverEnvironment {
        targets,
        airports: mission.base.airports.clone(),
        no_fly_zones: mission.base.no_fly_zones.clone(),
        drone_configs,
        synthetic_starts,
    }
}
