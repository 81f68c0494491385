// Audio graph routing
pub mod cache;
pub mod classifier;
pub mod controller;
pub mod executor;
pub mod fake;
pub mod manager;
pub mod planner;
pub mod sink_selection;
pub mod snapshot;
pub mod types;
pub mod watcher;

pub use cache::{Clock, ManualClock, SnapshotCache, SystemClock};
pub use classifier::{Classifier, ClassifierRule, NodeSignals};
pub use controller::{
    default_selection, routed_sources, DetectedSource, RecordingTarget, RoutingController, RoutingOutcome,
    RoutingState,
};
pub use executor::{LinkExecutor, LinkOutcome, RemovalReport};
pub use manager::{with_watchdog, GraphManager, PwCliManager};
pub use planner::{compute_transition, Plan, PlanStep};
pub use sink_selection::{select_restore_sink, SinkChoice, SinkTier};
pub use snapshot::{Snapshot, SnapshotReader};
pub use types::*;
pub use watcher::{GameWatcher, WatchDelta};
