pub mod config;
pub mod graph;
pub mod log;

// Re-export the routing core for the binary and integration tests
pub use config::{AppSettings, ConfigManager, Profile, RouterConfig};
pub use graph::{
    default_selection, routed_sources, Classifier, DetectedSource, GameWatcher, GraphManager, PwCliManager,
    Role, Route, RoutingController, RoutingError, RoutingOutcome, RoutingState,
};
