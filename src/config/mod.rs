// Configuration and profiles
pub mod paths;
pub mod settings;
pub mod store;

pub use settings::{AppSettings, RouterConfig};
pub use store::{ConfigManager, Profile};
