// Game watcher
//
// Remembers which game sources were present on the previous poll so the
// auto-apply loop only reacts to games that just started.

use std::collections::BTreeSet;

use super::controller::DetectedSource;
use super::types::Role;

/// What changed between two polls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchDelta {
    /// Non-excluded game labels not seen on the previous poll
    pub new_games: Vec<String>,
    /// Any source appeared or disappeared
    pub changed: bool,
}

#[derive(Debug, Default)]
pub struct GameWatcher {
    known_games: BTreeSet<String>,
    known_sources: BTreeSet<String>,
}

impl GameWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, sources: &[DetectedSource]) -> WatchDelta {
        let sources_now: BTreeSet<String> = sources.iter().map(|s| s.label.clone()).collect();
        let games_now: BTreeSet<String> = sources
            .iter()
            .filter(|s| s.role == Role::Game)
            .map(|s| s.label.clone())
            .collect();

        let new_games = sources
            .iter()
            .filter(|s| s.role == Role::Game && !s.excluded)
            .filter(|s| !self.known_games.contains(&s.label))
            .map(|s| s.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let changed = sources_now != self.known_sources;
        self.known_games = games_now;
        self.known_sources = sources_now;

        WatchDelta { new_games, changed }
    }

    /// Forget everything; the next poll treats every game as new
    pub fn reset(&mut self) {
        self.known_games.clear();
        self.known_sources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(node_id: u32, label: &str, role: Role, excluded: bool) -> DetectedSource {
        DetectedSource {
            node_id,
            label: label.to_string(),
            role,
            application: String::new(),
            binary: String::new(),
            media_class: "Stream/Output/Audio".to_string(),
            media_name: String::new(),
            stream_purpose: String::new(),
            excluded,
        }
    }

    #[test]
    fn test_first_poll_reports_all_games() {
        let mut watcher = GameWatcher::new();
        let delta = watcher.observe(&[
            source(10, "Hades", Role::Game, false),
            source(40, "Firefox", Role::Browser, false),
        ]);
        assert_eq!(delta.new_games, vec!["Hades".to_string()]);
        assert!(delta.changed);
    }

    #[test]
    fn test_repeat_poll_is_quiet() {
        let mut watcher = GameWatcher::new();
        let sources = [source(10, "Hades", Role::Game, false)];
        watcher.observe(&sources);
        let delta = watcher.observe(&sources);
        assert!(delta.new_games.is_empty());
        assert!(!delta.changed);
    }

    #[test]
    fn test_excluded_games_are_not_reported() {
        let mut watcher = GameWatcher::new();
        let delta = watcher.observe(&[source(10, "Launcher", Role::Game, true)]);
        assert!(delta.new_games.is_empty());
        assert!(delta.changed);
    }

    #[test]
    fn test_restarted_game_is_new_again() {
        let mut watcher = GameWatcher::new();
        watcher.observe(&[source(10, "Hades", Role::Game, false)]);
        watcher.observe(&[]);
        let delta = watcher.observe(&[source(77, "Hades", Role::Game, false)]);
        assert_eq!(delta.new_games, vec!["Hades".to_string()]);
    }

    #[test]
    fn test_reset_reports_running_games_again() {
        let mut watcher = GameWatcher::new();
        let sources = [source(10, "Hades", Role::Game, false)];
        watcher.observe(&sources);
        watcher.reset();
        let delta = watcher.observe(&sources);
        assert_eq!(delta.new_games, vec!["Hades".to_string()]);
        assert!(delta.changed);
    }

    #[test]
    fn test_closed_source_counts_as_change() {
        let mut watcher = GameWatcher::new();
        watcher.observe(&[
            source(10, "Hades", Role::Game, false),
            source(40, "Firefox", Role::Browser, false),
        ]);
        let delta = watcher.observe(&[source(10, "Hades", Role::Game, false)]);
        assert!(delta.new_games.is_empty());
        assert!(delta.changed);
    }
}
