// Platform-specific configuration paths

use std::path::PathBuf;

const APP_NAME: &str = "audio-isolator";
const PROFILES_SUBDIR: &str = "profiles";
pub const SETTINGS_FILE: &str = "settings.json";
pub const PROFILE_EXTENSION: &str = "pwp";

/// `~/.config/audio-isolator/` on Linux; falls back to the working directory
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn profiles_dir(config_dir: &std::path::Path) -> PathBuf {
    config_dir.join(PROFILES_SUBDIR)
}
