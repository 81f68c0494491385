// Router and application settings

use std::time::Duration;

/// Timeouts and target for the routing core
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// `application.name` of the recording application
    pub target_application: String,
    pub snapshot_timeout_ms: u64,  // 3000
    pub link_timeout_ms: u64,      // 5000
    pub destroy_timeout_ms: u64,   // 3000
    pub cache_window_ms: u64,      // 2000
    /// Pause after removals so the graph settles before re-validation
    pub settle_delay_ms: u64,      // 1000
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            target_application: "Steam".to_string(),
            snapshot_timeout_ms: 3000,
            link_timeout_ms: 5000,
            destroy_timeout_ms: 3000,
            cache_window_ms: 2000,
            settle_delay_ms: 1000,
        }
    }
}

impl RouterConfig {
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }

    pub fn link_timeout(&self) -> Duration {
        Duration::from_millis(self.link_timeout_ms)
    }

    pub fn destroy_timeout(&self) -> Duration {
        Duration::from_millis(self.destroy_timeout_ms)
    }

    pub fn cache_window(&self) -> Duration {
        Duration::from_millis(self.cache_window_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Zero timeouts would fail every call, so they are rejected
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.target_application.trim().is_empty() {
            anyhow::bail!("target_application must not be empty");
        }
        for (name, value) in [
            ("snapshot_timeout_ms", self.snapshot_timeout_ms),
            ("link_timeout_ms", self.link_timeout_ms),
            ("destroy_timeout_ms", self.destroy_timeout_ms),
        ] {
            if value == 0 {
                anyhow::bail!("{} must be greater than zero", name);
            }
        }
        Ok(())
    }
}

/// User settings persisted in `settings.json`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub restore_default_on_close: bool,
    pub auto_detect_interval_secs: u64,
    /// Sink `node.name` to reconnect on restore
    pub preferred_sink: Option<String>,
    /// Source labels never auto-selected
    pub excluded_games: Vec<String>,
    pub auto_apply_games: bool,
    pub router: RouterConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            restore_default_on_close: true,
            auto_detect_interval_secs: 3,
            preferred_sink: None,
            excluded_games: Vec::new(),
            auto_apply_games: true,
            router: RouterConfig::default(),
        }
    }
}

impl AppSettings {
    pub fn auto_detect_interval(&self) -> Duration {
        Duration::from_secs(self.auto_detect_interval_secs.max(1))
    }

    pub fn is_excluded(&self, label: &str) -> bool {
        self.excluded_games.iter().any(|excluded| excluded == label)
    }
}
