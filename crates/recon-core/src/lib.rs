pub mod aggregates;
pub mod checkpoint;
pub mod codec;
pub mod error;
pub mod models;
pub mod store;
pub mod trajectory;
pub mod visited;

pub use aggregates::{AggregateCache, CutMarker};
pub use checkpoint::{
    display_environment, solver_environment, synthetic_start_id, DisplayEnvironment,
    SolverEnvironment, SyntheticStart,
};
pub use codec::{
    export_document, export_to_json, import_from_json, import_from_str, MissionDocument,
    SegmentDocument, SCHEMA_CURRENT, SCHEMA_LEGACY,
};
pub use error::{CodecError, EngineError};
pub use models::{
    Airport, BaseEnvironment, CutRecord, DroneConfig, DroneRoute, Mission, NoFlyZone, Point,
    Segment, SegmentEnvironment, SolverSolution, Target, TargetType, DEFAULT_FUEL_BUDGET,
};
pub use store::{CutOutcome, DroneProgress, SegmentStore};
pub use trajectory::{arc_length, cumulative_lengths, split_at_distance, SplitResult};
pub use visited::{
    live_visited_targets, visited_targets, LIVE_VISIT_THRESHOLD, VISIT_THRESHOLD,
};
