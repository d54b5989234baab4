//! End-to-end segmentation and codec round-trip tests.
//!
//! Drives the full workflow: solve, cut, replan with synthetic starts,
//! repeat, then export the mission and import it back, checking that
//! solutions, config snapshots and cut data survive unchanged.

use recon_core::{
    display_environment, export_to_json, import_from_json, solver_environment, Airport,
    BaseEnvironment, DroneConfig, DroneProgress, DroneRoute, NoFlyZone, Point, SegmentStore,
    SolverSolution, Target, TargetType,
};
use std::collections::{BTreeMap, BTreeSet};

fn target(id: &str, x: f64, y: f64, target_type: TargetType) -> Target {
    Target {
        id: id.to_string(),
        position: [x, y],
        target_type,
        priority: 1,
    }
}

fn base_environment() -> BaseEnvironment {
    BaseEnvironment {
        airports: vec![
            Airport {
                id: "ap0".to_string(),
                position: [0.0, 0.0],
            },
            Airport {
                id: "ap1".to_string(),
                position: [300.0, 300.0],
            },
        ],
        no_fly_zones: vec![NoFlyZone {
            position: [150.0, 150.0],
            radius: 30.0,
        }],
        targets: vec![
            target("t1", 40.0, 0.0, TargetType::A),
            target("t2", 120.0, 0.0, TargetType::B),
            target("t3", 120.0, 90.0, TargetType::C),
        ],
    }
}

fn ui_configs() -> BTreeMap<String, DroneConfig> {
    let mut configs = BTreeMap::new();
    for id in ["1", "2"] {
        configs.insert(
            id.to_string(),
            DroneConfig {
                enabled: true,
                fuel_budget: 600.0,
                start_airport: "ap0".to_string(),
                end_airport: Some("ap1".to_string()),
                allowed_types: TargetType::all(),
            },
        );
    }
    configs
}

/// Stand-in for the external route solver: a straight path through the
/// requested waypoints. The engine treats solver output as opaque.
fn fake_solution(routes: &[(&str, Vec<&str>, Vec<Point>)]) -> SolverSolution {
    let mut map = BTreeMap::new();
    for (drone, route, trajectory) in routes {
        map.insert(
            drone.to_string(),
            DroneRoute {
                route: route.iter().map(|s| s.to_string()).collect(),
                trajectory: trajectory.clone(),
            },
        );
    }
    SolverSolution {
        routes: map,
        sequences: serde_json::json!({"order": ["t1", "t2", "t3"]}),
    }
}

fn run_two_cut_mission() -> SegmentStore {
    let mut store = SegmentStore::new();
    store.init_fresh(base_environment());

    // Segment 0: both drones fly; drone 1 heads down the target line.
    let env0 = solver_environment(&store, &ui_configs(), &BTreeSet::new());
    store.add_segment(
        fake_solution(&[
            (
                "1",
                vec!["ap0", "t1", "t2", "ap1"],
                vec![[0.0, 0.0], [40.0, 0.0], [120.0, 0.0], [200.0, 0.0]],
            ),
            ("2", vec!["ap0", "t3", "ap1"], vec![[0.0, 0.0], [0.0, 200.0]]),
        ]),
        env0.to_segment_environment(),
        ui_configs(),
        vec!["1".to_string(), "2".to_string()],
    );

    // Cut after 60 units: drone 1 has passed t1 (x=40) but not t2.
    let progress = BTreeMap::from([
        (
            "1".to_string(),
            DroneProgress {
                distance_traveled: 60.0,
                total_distance: 200.0,
            },
        ),
        (
            "2".to_string(),
            DroneProgress {
                distance_traveled: 60.0,
                total_distance: 200.0,
            },
        ),
    ]);
    let outcome = store.perform_cut(&progress).unwrap();
    assert_eq!(outcome.visited_targets, vec!["t1".to_string()]);
    store.advance_segment();

    // Segment 1: replan over remaining targets from synthetic starts.
    let visited = store.frozen_targets_before(1);
    let env1 = solver_environment(&store, &ui_configs(), &visited);
    assert_eq!(env1.synthetic_starts.len(), 2);
    store.add_segment(
        fake_solution(&[
            (
                "1",
                vec!["checkpoint-1", "t2", "ap1"],
                vec![[60.0, 0.0], [120.0, 0.0], [120.0, 40.0]],
            ),
            (
                "2",
                vec!["checkpoint-2", "t3", "ap1"],
                vec![[0.0, 60.0], [120.0, 90.0]],
            ),
        ]),
        env1.to_segment_environment(),
        ui_configs(),
        Vec::new(),
    );

    // Cut again, then one final segment to finish the mission.
    let progress = BTreeMap::from([
        (
            "1".to_string(),
            DroneProgress {
                distance_traveled: 70.0,
                total_distance: 100.0,
            },
        ),
        (
            "2".to_string(),
            DroneProgress {
                distance_traveled: 70.0,
                total_distance: 123.7,
            },
        ),
    ]);
    store.perform_cut(&progress).unwrap();
    store.advance_segment();

    let visited = store.frozen_targets_before(2);
    let env2 = solver_environment(&store, &ui_configs(), &visited);
    store.add_segment(
        fake_solution(&[(
            "1",
            vec!["checkpoint-1", "t3", "ap1"],
            vec![[120.0, 10.0], [120.0, 90.0], [300.0, 300.0]],
        )]),
        env2.to_segment_environment(),
        ui_configs(),
        Vec::new(),
    );

    store
}

#[test]
fn export_then_import_reproduces_the_mission() {
    let mut store = run_two_cut_mission();
    let exported = export_to_json(store.mission());

    assert_eq!(exported["schema"], "segmented-v2");
    assert_eq!(exported["segment_count"], 3);

    let restored = import_from_json(&exported).unwrap();
    assert_eq!(restored.segments.len(), 3);

    for (original, imported) in store.mission().segments.iter().zip(&restored.segments) {
        assert_eq!(original.index, imported.index);
        assert_eq!(original.solution, imported.solution);
        assert_eq!(original.visited_targets, imported.visited_targets);
        assert_eq!(original.active_targets, imported.active_targets);
        assert_eq!(original.cut, imported.cut);
        for (drone_id, config) in &original.drone_configs {
            let restored_config = imported.drone_configs.get(drone_id).unwrap();
            assert_eq!(config.enabled, restored_config.enabled);
            assert_eq!(config.fuel_budget, restored_config.fuel_budget);
            assert_eq!(config.start_airport, restored_config.start_airport);
            assert_eq!(config.end_airport, restored_config.end_airport);
            assert_eq!(config.allowed_types, restored_config.allowed_types);
        }
    }

    // Aggregates are recomputed, not persisted: the restored mission
    // must serve the same derived totals.
    let mut restored_store = SegmentStore::new();
    restored_store.restore(restored);
    assert_eq!(store.total_distance(), restored_store.total_distance());
    assert_eq!(
        store.cut_markers().to_vec(),
        restored_store.cut_markers().to_vec()
    );
}

#[test]
fn frozen_sets_grow_monotonically_across_segments() {
    let store = run_two_cut_mission();
    let mut previous: BTreeSet<String> = BTreeSet::new();
    for segment in &store.mission().segments {
        let frozen = store.frozen_targets_before(segment.index);
        assert!(frozen.is_superset(&previous));
        // No id is simultaneously active and frozen.
        for id in &segment.active_targets {
            assert!(!frozen.contains(id), "{id} both active and frozen");
        }
        let mut grown = frozen.clone();
        grown.extend(segment.visited_targets.iter().cloned());
        previous = grown;
    }
}

#[test]
fn display_environment_never_loses_targets() {
    let store = run_two_cut_mission();
    let display = display_environment(&store);
    // All three targets stay visible even though t1 and more were
    // frozen along the way.
    assert_eq!(display.targets.len(), 3);
    assert_eq!(display.airports.len(), 2);
    assert_eq!(display.no_fly_zones.len(), 1);
}

#[test]
fn combined_trajectories_chain_across_cuts() {
    let mut store = run_two_cut_mission();
    let combined = store.combined_trajectories().clone();
    let drone1 = combined.get("1").unwrap();

    // Segment 0 contributes [0,0]..[60,0]; segment 1 starts at the cut
    // point [60,0], which must not be duplicated at the junction.
    assert_eq!(drone1[0], [0.0, 0.0]);
    assert_eq!(drone1[1], [40.0, 0.0]);
    assert_eq!(drone1[2], [60.0, 0.0]);
    assert_eq!(drone1[3], [120.0, 0.0]);
    let duplicates = drone1
        .windows(2)
        .filter(|w| (w[0][0] - w[1][0]).abs() < 1e-9 && (w[0][1] - w[1][1]).abs() < 1e-9)
        .count();
    assert_eq!(duplicates, 0);

    // Replay offset equals the cumulative cut distance.
    assert_eq!(store.replay_offset(), 60.0 + 70.0);
}

#[test]
fn import_failure_leaves_store_untouched() {
    let mut store = run_two_cut_mission();
    let empty = serde_json::json!({"schema": "segmented-v2", "segments": []});
    assert!(import_from_json(&empty).is_err());
    // The failed import produced nothing to restore; the existing
    // mission is intact.
    assert_eq!(store.segment_count(), 3);
    assert!(store.total_distance() > 0.0);
}
