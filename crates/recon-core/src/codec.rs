//! Versioned mission document codec.
//!
//! Export emits the current schema; import accepts the current schema
//! plus the legacy one. Every legacy key spelling is resolved through
//! a named normalization function with documented precedence rather
//! than ad hoc fallback chains — a populated legacy field is never
//! dropped in favor of an absent modern key.

use crate::error::CodecError;
use crate::models::{
    Airport, BaseEnvironment, CutRecord, DroneConfig, Mission, NoFlyZone, Point, Segment,
    SegmentEnvironment, SolverSolution, Target,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Schema tag written by every export.
pub const SCHEMA_CURRENT: &str = "segmented-v2";
/// Older schema still accepted on import.
pub const SCHEMA_LEGACY: &str = "segmented-v1";

// ========== EXPORT ==========

/// Top-level persisted mission document.
#[derive(Debug, Clone, Serialize)]
pub struct MissionDocument {
    pub schema: String,
    pub is_segmented: bool,
    pub segment_count: usize,
    pub airports: Vec<Airport>,
    pub sams: Vec<NoFlyZone>,
    /// Segment-0 drone configuration, kept at top level for quick
    /// inspection without walking the segment list.
    pub drone_configs: BTreeMap<String, DroneConfig>,
    pub segments: Vec<SegmentDocument>,
}

/// One persisted segment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDocument {
    pub index: usize,
    pub solution: SolverSolution,
    pub environment: SegmentEnvironment,
    pub drone_configs: BTreeMap<String, DroneConfig>,
    /// Cumulative: every target frozen before this segment, recomputed
    /// by replaying segments [0, index).
    pub frozen_targets: Vec<String>,
    pub active_targets: Vec<String>,
    pub cut_positions: Option<BTreeMap<String, Point>>,
    pub cut_distance: Option<f64>,
    pub lost_drones: Vec<String>,
    pub added_drones: Vec<String>,
    /// Targets visited during this segment only.
    pub visited_targets: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Serialize a mission to the current document schema.
pub fn export_document(mission: &Mission) -> MissionDocument {
    let mut frozen_so_far: BTreeSet<String> = BTreeSet::new();
    let mut segments = Vec::with_capacity(mission.segments.len());

    for segment in &mission.segments {
        segments.push(SegmentDocument {
            index: segment.index,
            solution: segment.solution.clone(),
            environment: segment.environment.clone(),
            drone_configs: segment.drone_configs.clone(),
            frozen_targets: frozen_so_far.iter().cloned().collect(),
            active_targets: segment.active_targets.clone(),
            cut_positions: segment.cut.as_ref().map(|c| c.positions.clone()),
            cut_distance: segment.cut.as_ref().map(|c| c.distance),
            lost_drones: segment.lost_drones.clone(),
            added_drones: segment.added_drones.clone(),
            visited_targets: segment.visited_targets.clone(),
            timestamp: segment.created_at,
        });
        frozen_so_far.extend(segment.visited_targets.iter().cloned());
    }

    MissionDocument {
        schema: SCHEMA_CURRENT.to_string(),
        is_segmented: true,
        segment_count: mission.segments.len(),
        airports: mission.base.airports.clone(),
        sams: mission.base.no_fly_zones.clone(),
        drone_configs: mission
            .segments
            .first()
            .map(|s| s.drone_configs.clone())
            .unwrap_or_default(),
        segments,
    }
}

/// Serialize a mission to a JSON value.
pub fn export_to_json(mission: &Mission) -> serde_json::Value {
    // MissionDocument serializes infallibly (no maps with non-string
    // keys, no non-finite struct invariants enforced here).
    serde_json::to_value(export_document(mission)).unwrap_or(serde_json::Value::Null)
}

// ========== IMPORT ==========

/// Raw top-level shape: permissive, both schema generations.
#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    is_segmented: Option<bool>,
    #[serde(default, alias = "droneConfigs")]
    drone_configs: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    airports: Vec<Airport>,
    #[serde(default)]
    sams: Vec<NoFlyZone>,
    #[serde(default)]
    segments: Vec<RawSegment>,
}

/// Raw per-segment shape carrying every key spelling either schema
/// generation may use. Resolution happens in the `resolve_*` functions
/// below, never implicitly.
#[derive(Debug, Deserialize)]
struct RawSegment {
    #[serde(default)]
    solution: SolverSolution,
    #[serde(default)]
    environment: SegmentEnvironment,
    /// Current spelling.
    #[serde(default, rename = "droneConfigs")]
    drone_configs_current: Option<BTreeMap<String, serde_json::Value>>,
    /// Legacy spelling.
    #[serde(default, rename = "drone_configs")]
    drone_configs_legacy: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, rename = "visitedTargets")]
    visited_targets: Option<Vec<String>>,
    /// In the current schema this is the cumulative frozen set; legacy
    /// documents used it for the per-segment visited set.
    #[serde(default, rename = "frozenTargets")]
    frozen_targets: Option<Vec<String>>,
    #[serde(default, rename = "activeTargets")]
    active_targets: Option<Vec<String>>,
    #[serde(default, rename = "cutPositions")]
    cut_positions: Option<BTreeMap<String, Point>>,
    #[serde(default, rename = "cutDistance")]
    cut_distance: Option<f64>,
    /// Legacy nested cut object.
    #[serde(default)]
    cut: Option<CutRecord>,
    #[serde(default, rename = "lostDrones")]
    lost_drones: Option<Vec<String>>,
    #[serde(default, rename = "addedDrones")]
    added_drones: Option<Vec<String>>,
    #[serde(default)]
    timestamp: Option<serde_json::Value>,
}

/// Parse and restore a mission from a JSON document.
///
/// Fails without side effects: the caller's existing mission is only
/// replaced once a complete `Mission` has been produced.
pub fn import_from_json(value: &serde_json::Value) -> Result<Mission, CodecError> {
    let raw: RawDocument = serde_json::from_value(value.clone())?;

    if let Some(schema) = raw.schema.as_deref() {
        if schema != SCHEMA_CURRENT && schema != SCHEMA_LEGACY {
            return Err(CodecError::UnsupportedSchema(schema.to_string()));
        }
    } else {
        debug!("document carries no schema tag, treating as legacy");
    }

    if raw.segments.is_empty() {
        return Err(CodecError::EmptySegments);
    }

    // Union target catalog across segments, first occurrence wins.
    let targets = collect_target_catalog(&raw.segments);

    // The fixed drone slot set every segment is normalized against.
    let slots = collect_drone_slots(&raw);

    let mut frozen_so_far: BTreeSet<String> = BTreeSet::new();
    let mut segments: Vec<Segment> = Vec::with_capacity(raw.segments.len());

    for (index, raw_segment) in raw.segments.iter().enumerate() {
        let mut drone_configs = resolve_segment_configs(raw_segment);
        normalize_config_slots(&mut drone_configs, &slots);

        let visited = resolve_visited_targets(raw_segment, &frozen_so_far);
        let active = resolve_active_targets(raw_segment, &targets, &frozen_so_far);
        let cut = resolve_cut(raw_segment);
        let created_at = resolve_timestamp(raw_segment);

        segments.push(Segment {
            index,
            solution: raw_segment.solution.clone(),
            environment: raw_segment.environment.clone(),
            drone_configs,
            cut,
            lost_drones: raw_segment.lost_drones.clone().unwrap_or_default(),
            added_drones: raw_segment.added_drones.clone().unwrap_or_default(),
            visited_targets: visited.clone(),
            active_targets: active,
            created_at,
        });
        frozen_so_far.extend(visited);
    }

    derive_drone_deltas(&mut segments, &raw.segments);

    let current_index = segments.len() - 1;
    info!(
        segments = segments.len(),
        targets = targets.len(),
        "mission document imported"
    );

    Ok(Mission {
        base: BaseEnvironment {
            airports: raw.airports,
            no_fly_zones: raw.sams,
            targets,
        },
        segments,
        current_index,
        active: raw.is_segmented.unwrap_or(true),
    })
}

/// Parse and restore a mission from document text.
pub fn import_from_str(text: &str) -> Result<Mission, CodecError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    import_from_json(&value)
}

// ========== NORMALIZATION ==========

fn collect_target_catalog(segments: &[RawSegment]) -> Vec<Target> {
    let mut seen = BTreeSet::new();
    let mut catalog = Vec::new();
    for segment in segments {
        for target in &segment.environment.targets {
            if seen.insert(target.id.clone()) {
                catalog.push(target.clone());
            }
        }
    }
    catalog
}

fn collect_drone_slots(raw: &RawDocument) -> BTreeSet<String> {
    let mut slots: BTreeSet<String> = raw.drone_configs.keys().cloned().collect();
    for segment in &raw.segments {
        if let Some(configs) = &segment.drone_configs_current {
            slots.extend(configs.keys().cloned());
        }
        if let Some(configs) = &segment.drone_configs_legacy {
            slots.extend(configs.keys().cloned());
        }
        slots.extend(segment.environment.drone_configs.keys().cloned());
        slots.extend(segment.solution.routes.keys().cloned());
    }
    slots
}

/// Segment config precedence: current `droneConfigs` key, then legacy
/// `drone_configs`, then the configs embedded in the environment. A
/// populated legacy map is used whenever the current key is absent.
fn resolve_segment_configs(raw: &RawSegment) -> BTreeMap<String, DroneConfig> {
    let raw_map = raw
        .drone_configs_current
        .as_ref()
        .or(raw.drone_configs_legacy.as_ref());
    match raw_map {
        Some(map) => decode_config_map(map),
        None => raw.environment.drone_configs.clone(),
    }
}

fn decode_config_map(map: &BTreeMap<String, serde_json::Value>) -> BTreeMap<String, DroneConfig> {
    map.iter()
        .map(|(id, value)| {
            let config = serde_json::from_value::<DroneConfig>(value.clone()).unwrap_or_else(|e| {
                warn!(drone_id = id.as_str(), error = %e, "unreadable drone config, using placeholder");
                DroneConfig::placeholder(id)
            });
            (id.clone(), config)
        })
        .collect()
}

/// Fill missing drone slots with safe placeholders and repair configs
/// that arrived without a start airport.
fn normalize_config_slots(configs: &mut BTreeMap<String, DroneConfig>, slots: &BTreeSet<String>) {
    for slot in slots {
        let config = configs
            .entry(slot.clone())
            .or_insert_with(|| DroneConfig::placeholder(slot));
        if config.start_airport.is_empty() {
            config.start_airport = slot.clone();
        }
    }
}

/// Visited-set precedence: the current `visitedTargets` key, then the
/// legacy `frozenTargets` alias. Legacy documents stored the
/// per-segment visited set under `frozenTargets`; because visited sets
/// are disjoint across segments, subtracting everything already frozen
/// is a no-op for true legacy documents and corrects documents that
/// stored the cumulative set instead.
fn resolve_visited_targets(raw: &RawSegment, frozen_before: &BTreeSet<String>) -> Vec<String> {
    if let Some(visited) = &raw.visited_targets {
        return visited.clone();
    }
    match &raw.frozen_targets {
        Some(frozen) => frozen
            .iter()
            .filter(|id| !frozen_before.contains(*id))
            .cloned()
            .collect(),
        None => Vec::new(),
    }
}

/// Active-set precedence: explicit `activeTargets`, then the ids of
/// the targets in the segment's stored environment, then the catalog
/// minus everything frozen so far.
fn resolve_active_targets(
    raw: &RawSegment,
    catalog: &[Target],
    frozen_before: &BTreeSet<String>,
) -> Vec<String> {
    if let Some(active) = &raw.active_targets {
        return active.clone();
    }
    if !raw.environment.targets.is_empty() {
        return raw.environment.targets.iter().map(|t| t.id.clone()).collect();
    }
    catalog
        .iter()
        .filter(|t| !frozen_before.contains(&t.id))
        .map(|t| t.id.clone())
        .collect()
}

/// Cut precedence: the flat `cutPositions`/`cutDistance` pair, then
/// the legacy nested `cut` object.
fn resolve_cut(raw: &RawSegment) -> Option<CutRecord> {
    if raw.cut_positions.is_some() || raw.cut_distance.is_some() {
        return Some(CutRecord {
            positions: raw.cut_positions.clone().unwrap_or_default(),
            distance: raw.cut_distance.unwrap_or(0.0),
        });
    }
    raw.cut.clone()
}

/// Timestamps appear as RFC 3339 strings in the current schema and as
/// epoch milliseconds in legacy documents.
fn resolve_timestamp(raw: &RawSegment) -> DateTime<Utc> {
    match &raw.timestamp {
        Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now),
        _ => Utc::now(),
    }
}

/// Derive missing lost/added drone lists by diffing consecutive
/// segments' enabled sets. Explicit lists from the document are kept.
fn derive_drone_deltas(segments: &mut [Segment], raw: &[RawSegment]) {
    let enabled: Vec<BTreeSet<String>> = segments.iter().map(|s| s.enabled_drones()).collect();

    for i in 0..segments.len() {
        if raw[i].lost_drones.is_none() {
            if let Some(next) = enabled.get(i + 1) {
                segments[i].lost_drones = enabled[i].difference(next).cloned().collect();
            }
        }
        if i > 0 && raw[i].added_drones.is_none() {
            segments[i].added_drones = enabled[i].difference(&enabled[i - 1]).cloned().collect();
        }
    }
}
