//! Core data models for the segmented mission engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A 2D position as `[x, y]`, matching the wire format used by the
/// solver and the persisted mission document.
pub type Point = [f64; 2];

/// Category of a reconnaissance target. Drones are granted access to a
/// subset of these types via their configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    A,
    B,
    C,
    D,
    E,
}

impl TargetType {
    /// Every target type, in order. Used when granting full access.
    pub fn all() -> BTreeSet<TargetType> {
        [
            TargetType::A,
            TargetType::B,
            TargetType::C,
            TargetType::D,
            TargetType::E,
        ]
        .into_iter()
        .collect()
    }
}

/// A reconnaissance target. Immutable once created by the environment
/// editor; the engine only references targets by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub position: Point,
    #[serde(rename = "type")]
    pub target_type: TargetType,
    pub priority: u32,
}

/// A launch/recovery site for drones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Airport {
    pub id: String,
    pub position: Point,
}

/// A circular no-fly zone. Persisted under the legacy wire name "sams".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoFlyZone {
    pub position: Point,
    pub radius: f64,
}

/// The fixed environment for an active mission: airports, no-fly zones
/// and the full target catalog. Never mutated by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaseEnvironment {
    pub airports: Vec<Airport>,
    #[serde(rename = "sams")]
    pub no_fly_zones: Vec<NoFlyZone>,
    pub targets: Vec<Target>,
}

impl BaseEnvironment {
    /// Look up a target by id in the catalog.
    pub fn target(&self, id: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.id == id)
    }

    /// Look up an airport by id.
    pub fn airport(&self, id: &str) -> Option<&Airport> {
        self.airports.iter().find(|a| a.id == id)
    }

    /// All target ids in catalog order.
    pub fn target_ids(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.id.clone()).collect()
    }
}

/// Per-drone configuration supplied by the UI. The engine reads and
/// snapshots this, never edits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroneConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_fuel_budget", alias = "fuelBudget")]
    pub fuel_budget: f64,
    #[serde(default, alias = "startAirport")]
    pub start_airport: String,
    /// `None` means a flexible endpoint: the solver may finish the
    /// route wherever it likes.
    #[serde(default, alias = "endAirport")]
    pub end_airport: Option<String>,
    #[serde(default = "TargetType::all", alias = "allowedTargetTypes")]
    pub allowed_types: BTreeSet<TargetType>,
}

pub const DEFAULT_FUEL_BUDGET: f64 = 1000.0;

fn default_fuel_budget() -> f64 {
    DEFAULT_FUEL_BUDGET
}

impl DroneConfig {
    /// Safe placeholder used when a document omits a drone slot:
    /// disabled, default fuel budget, a home airport named after the
    /// drone itself, and full target-type access.
    pub fn placeholder(drone_id: &str) -> Self {
        Self {
            enabled: false,
            fuel_budget: DEFAULT_FUEL_BUDGET,
            start_airport: drone_id.to_string(),
            end_airport: None,
            allowed_types: TargetType::all(),
        }
    }
}

// ========== SOLVER OUTPUT ==========

/// One drone's solved route: ordered waypoint ids plus the flyable
/// trajectory polyline. The engine never interprets routing logic,
/// it only slices and concatenates the trajectory it is given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DroneRoute {
    #[serde(default)]
    pub route: Vec<String>,
    #[serde(default)]
    pub trajectory: Vec<Point>,
}

/// Complete solver output for one planning interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverSolution {
    #[serde(default)]
    pub routes: BTreeMap<String, DroneRoute>,
    /// Opaque solver-side sequencing data, preserved verbatim across
    /// export/import but never interpreted.
    #[serde(default)]
    pub sequences: serde_json::Value,
}

/// The environment actually handed to the solver for one segment.
/// Stored with the segment so replays see exactly what was solved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentEnvironment {
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub airports: Vec<Airport>,
    #[serde(default, rename = "sams")]
    pub no_fly_zones: Vec<NoFlyZone>,
    #[serde(default)]
    pub drone_configs: BTreeMap<String, DroneConfig>,
}

// ========== SEGMENTS ==========

/// Record of an operator cut: where each still-flying drone was frozen
/// and the uniform distance traveled at that moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutRecord {
    /// Cut position per drone. Drones that had already finished their
    /// route contribute no position.
    pub positions: BTreeMap<String, Point>,
    /// Distance traveled along this segment at cut time. All drones
    /// share a uniform playback speed, so one value suffices.
    pub distance: f64,
}

/// An immutable record of one independently solved planning interval.
///
/// Segments are only appended to the mission or replaced wholesale at
/// the same index; any "update" goes through a `with_*` constructor
/// that rebuilds the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the mission sequence (0-based, dense).
    pub index: usize,
    pub solution: SolverSolution,
    /// Environment actually used for this segment's solve.
    pub environment: SegmentEnvironment,
    /// Drone configuration snapshot frozen at solve time, independent
    /// of later UI edits.
    pub drone_configs: BTreeMap<String, DroneConfig>,
    /// Set once the operator cuts this segment mid-flight.
    pub cut: Option<CutRecord>,
    /// Drones disabled at this segment's cut.
    pub lost_drones: Vec<String>,
    /// Drones newly enabled at this segment's start.
    pub added_drones: Vec<String>,
    /// Target ids credited as visited during this segment.
    pub visited_targets: Vec<String>,
    /// Target ids still eligible for routing in this segment.
    pub active_targets: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Segment {
    /// Rebuild this segment with cut data attached. All other fields
    /// are preserved; the caller replaces the stored segment at the
    /// same index.
    pub fn with_cut(
        &self,
        cut: CutRecord,
        lost_drones: Vec<String>,
        visited_targets: Vec<String>,
    ) -> Self {
        Self {
            cut: Some(cut),
            lost_drones,
            visited_targets,
            ..self.clone()
        }
    }

    /// Drone ids enabled in this segment's config snapshot.
    pub fn enabled_drones(&self) -> BTreeSet<String> {
        self.drone_configs
            .iter()
            .filter(|(_, cfg)| cfg.enabled)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// A full mission: the fixed base environment plus the ordered segment
/// sequence and the replay pointer.
#[derive(Debug, Clone, Default)]
pub struct Mission {
    pub base: BaseEnvironment,
    pub segments: Vec<Segment>,
    /// Navigation/replay pointer. Equal to `segments.len()` while the
    /// next segment is being prepared but not yet solved.
    pub current_index: usize,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_config_is_disabled_with_full_access() {
        let cfg = DroneConfig::placeholder("3");
        assert!(!cfg.enabled);
        assert_eq!(cfg.fuel_budget, DEFAULT_FUEL_BUDGET);
        assert_eq!(cfg.start_airport, "3");
        assert!(cfg.end_airport.is_none());
        assert_eq!(cfg.allowed_types, TargetType::all());
    }

    #[test]
    fn drone_config_accepts_legacy_camel_case_keys() {
        let cfg: DroneConfig = serde_json::from_str(
            r#"{"enabled":true,"fuelBudget":250.0,"startAirport":"ap1","endAirport":"ap2"}"#,
        )
        .unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.fuel_budget, 250.0);
        assert_eq!(cfg.start_airport, "ap1");
        assert_eq!(cfg.end_airport.as_deref(), Some("ap2"));
    }

    #[test]
    fn with_cut_preserves_solution_and_index() {
        let seg = Segment {
            index: 2,
            solution: SolverSolution::default(),
            environment: SegmentEnvironment::default(),
            drone_configs: BTreeMap::new(),
            cut: None,
            lost_drones: Vec::new(),
            added_drones: vec!["4".to_string()],
            visited_targets: Vec::new(),
            active_targets: vec!["t1".to_string()],
            created_at: Utc::now(),
        };
        let cut = CutRecord {
            positions: BTreeMap::from([("1".to_string(), [5.0, 5.0])]),
            distance: 42.0,
        };
        let replaced = seg.with_cut(cut.clone(), vec!["2".to_string()], vec!["t1".to_string()]);
        assert_eq!(replaced.index, 2);
        assert_eq!(replaced.added_drones, vec!["4".to_string()]);
        assert_eq!(replaced.cut, Some(cut));
        assert_eq!(replaced.lost_drones, vec!["2".to_string()]);
    }
}
