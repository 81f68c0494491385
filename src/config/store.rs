// Settings and profile storage
//
// One JSON settings file plus one JSON document per profile under
// `profiles/<name>.pwp`.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::paths::{profiles_dir, user_config_dir, PROFILE_EXTENSION, SETTINGS_FILE};
use super::settings::AppSettings;

/// A saved source selection, stored by label since node ids do not survive restarts
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Profile {
    pub name: String,
    pub sources: Vec<String>,
    pub saved_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(name: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            name: name.into(),
            sources,
            saved_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Manager rooted at the user configuration directory
    pub fn open() -> Result<Self> {
        Self::with_dir(user_config_dir())
    }

    /// Manager rooted at an explicit directory; creates it if needed
    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Result<Self> {
        let config_dir = config_dir.into();
        fs::create_dir_all(profiles_dir(&config_dir))
            .with_context(|| format!("Failed to create config directory {}", config_dir.display()))?;
        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    /// Load settings; a missing, unreadable or invalid file yields the defaults
    pub fn load_settings(&self) -> AppSettings {
        let path = self.settings_path();
        if !path.exists() {
            return AppSettings::default();
        }
        let loaded = fs::read_to_string(&path)
            .context("Failed to read settings")
            .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).context("Failed to parse settings"))
            .and_then(|settings| {
                settings.router.validate().context("Invalid router settings")?;
                Ok(settings)
            });
        match loaded {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    "{} {} ({}), using defaults",
                    "SETTINGS_ERROR".bright_yellow(),
                    e,
                    path.display()
                );
                AppSettings::default()
            }
        }
    }

    pub fn save_settings(&self, settings: &AppSettings) -> Result<()> {
        settings.router.validate().context("Refusing to save invalid router settings")?;
        let raw = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
        fs::write(self.settings_path(), raw).context("Failed to write settings")?;
        Ok(())
    }

    /// Load, change and save the settings in one step
    pub fn update_settings(&self, change: impl FnOnce(&mut AppSettings)) -> Result<AppSettings> {
        let mut settings = self.load_settings();
        change(&mut settings);
        self.save_settings(&settings)?;
        Ok(settings)
    }

    fn profile_path(&self, name: &str) -> Result<PathBuf> {
        let stem = profile_stem(name);
        if stem.is_empty() || stem.contains(['/', '\\']) || stem.starts_with('.') {
            bail!("Invalid profile name: {:?}", name);
        }
        Ok(profiles_dir(&self.config_dir).join(format!("{}.{}", stem, PROFILE_EXTENSION)))
    }

    pub fn save_profile(&self, name: &str, sources: Vec<String>) -> Result<Profile> {
        let path = self.profile_path(name)?;
        let profile = Profile::new(profile_stem(name), sources);
        let raw = serde_json::to_string_pretty(&profile).context("Failed to serialize profile")?;
        fs::write(&path, raw).with_context(|| format!("Failed to write profile {}", path.display()))?;
        info!(
            "{} {} ({} source(s))",
            "PROFILE_SAVED".bright_green(),
            profile.name,
            profile.sources.len()
        );
        Ok(profile)
    }

    pub fn load_profile(&self, name: &str) -> Result<Profile> {
        let path = self.profile_path(name)?;
        let raw = fs::read_to_string(&path).with_context(|| format!("Profile '{}' not found", name))?;
        serde_json::from_str(&raw).with_context(|| format!("Profile '{}' is corrupt", name))
    }

    /// Profile names, sorted
    pub fn list_profiles(&self) -> Result<Vec<String>> {
        let dir = profiles_dir(&self.config_dir);
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("Failed to list {}", dir.display()))? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(PROFILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Returns false when the profile did not exist
    pub fn delete_profile(&self, name: &str) -> Result<bool> {
        let path = self.profile_path(name)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).with_context(|| format!("Failed to delete profile {}", path.display()))?;
        Ok(true)
    }

    pub fn excluded_games(&self) -> Vec<String> {
        self.load_settings().excluded_games
    }

    /// Returns true when the list changed
    pub fn add_excluded_game(&self, label: &str) -> Result<bool> {
        let mut added = false;
        self.update_settings(|settings| {
            if !settings.is_excluded(label) {
                settings.excluded_games.push(label.to_string());
                added = true;
            }
        })?;
        Ok(added)
    }

    /// Returns true when the list changed
    pub fn remove_excluded_game(&self, label: &str) -> Result<bool> {
        let mut removed = false;
        self.update_settings(|settings| {
            let before = settings.excluded_games.len();
            settings.excluded_games.retain(|excluded| excluded != label);
            removed = settings.excluded_games.len() != before;
        })?;
        Ok(removed)
    }
}

/// Profile name without surrounding whitespace or the file extension
fn profile_stem(name: &str) -> &str {
    let name = name.trim();
    name.strip_suffix(".pwp").unwrap_or(name)
}
