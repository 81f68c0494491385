// Node classification
//
// Maps a node's vendor properties to a semantic role using an ordered table
// of heuristic rules. The first matching rule wins, so a node carrying both
// a compatibility-layer binary and a browser name is a Game. Sink,
// recording-target and Bluetooth tags are separate predicates outside the
// ladder because they are orthogonal to the role.

use super::types::{keys, Properties, Role};

const INTERNAL_MARKERS: &[&str] = &["echo-cancel", "dummy", "freewheel"];
const RECORDER_HELPER_MARKERS: &[&str] = &["steamwebhelper", "gameoverlayui"];
const COMPAT_LAYER_MARKERS: &[&str] = &["wine", "proton", ".exe"];
const RUNTIME_MARKERS: &[&str] = &["pressure-vessel", "steam-runtime", "reaper", "fossilize"];
const GAME_NAME_HINTS: &[&str] = &["game", "proton", "wine"];
const NATIVE_SUFFIXES: &[&str] = &[".x86_64", ".x86", ".bin", ".sh"];
const NON_GAME_APPS: &[&str] = &[
    "firefox", "chrome", "code", "electron", "discord", "slack", "spotify", "vlc", "mpv",
];
const GAME_PATH_FRAGMENTS: &[&str] = &[
    "/steam/",
    "/steamapps/",
    "/games/",
    "/.steam/",
    "/compatdata/",
    "/shadercache/",
];
const GAME_MEDIA_ROLES: &[&str] = &["game", "production"];
const BROWSER_NAMES: &[&str] = &["firefox", "chromium", "chrome", "opera", "brave", "edge"];
const COMMUNICATION_NAMES: &[&str] = &[
    "discord", "slack", "zoom", "telegram", "teams", "skype", "mumble", "teamspeak",
];
const AUDIO_SUBSYSTEM_NAMES: &[&str] = &["alsa", "jack", "pulse"];

const BLUETOOTH_ID_MARKERS: &[&str] = &["bluez", "bluetooth", "bt_", "hci"];
const BLUETOOTH_DESCRIPTION_MARKERS: &[&str] = &["bluetooth", "headset", "earbuds", "airpods"];
const VIRTUAL_SINK_MARKERS: &[&str] = &["echo-cancel", "dummy", "freewheel", "loopback"];
const GPU_SINK_MARKERS: &[&str] = &["navi", "nvidia", "hdmi", "gpu", "displayport", "dp-"];

/// Lower-cased view of the properties the ladder looks at
#[derive(Debug, Clone, Default)]
pub struct NodeSignals {
    pub application: String,
    pub binary: String,
    pub node_name: String,
    pub media_role: String,
}

impl NodeSignals {
    pub fn from_properties(properties: &Properties) -> Self {
        let lower = |key: &str| {
            properties
                .get(key)
                .map(|value| value.to_lowercase())
                .unwrap_or_default()
        };
        Self {
            application: lower(keys::APPLICATION_NAME),
            binary: lower(keys::APPLICATION_BINARY),
            node_name: lower(keys::NODE_NAME),
            media_role: lower(keys::MEDIA_ROLE),
        }
    }
}

fn contains_any(haystack: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| haystack.contains(marker))
}

type Predicate = Box<dyn Fn(&NodeSignals) -> bool + Send + Sync>;

/// One entry of the classification ladder
pub struct ClassifierRule {
    pub name: &'static str,
    pub role: Role,
    predicate: Predicate,
}

impl ClassifierRule {
    pub fn new(
        name: &'static str,
        role: Role,
        predicate: impl Fn(&NodeSignals) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            role,
            predicate: Box::new(predicate),
        }
    }

    pub fn matches(&self, signals: &NodeSignals) -> bool {
        (self.predicate)(signals)
    }
}

impl std::fmt::Debug for ClassifierRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierRule")
            .field("name", &self.name)
            .field("role", &self.role)
            .finish()
    }
}

/// Ordered rule table; total over all inputs thanks to the default role
#[derive(Debug)]
pub struct Classifier {
    rules: Vec<ClassifierRule>,
    default_role: Role,
}

impl Classifier {
    pub fn from_rules(rules: Vec<ClassifierRule>, default_role: Role) -> Self {
        Self {
            rules,
            default_role,
        }
    }

    pub fn classify(&self, properties: &Properties) -> Role {
        self.classify_signals(&NodeSignals::from_properties(properties))
    }

    pub fn classify_signals(&self, signals: &NodeSignals) -> Role {
        self.matching_rule(signals)
            .map(|rule| rule.role)
            .unwrap_or(self.default_role)
    }

    /// First rule that fires, for diagnostics
    pub fn matching_rule(&self, signals: &NodeSignals) -> Option<&ClassifierRule> {
        self.rules.iter().find(|rule| rule.matches(signals))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        let rules = vec![
            ClassifierRule::new("internal-processing", Role::Internal, |s| {
                contains_any(&s.node_name, INTERNAL_MARKERS)
                    || contains_any(&s.binary, INTERNAL_MARKERS)
            }),
            ClassifierRule::new("recorder-helper", Role::Internal, |s| {
                contains_any(&s.binary, RECORDER_HELPER_MARKERS)
            }),
            ClassifierRule::new("compat-layer-binary", Role::Game, |s| {
                contains_any(&s.binary, COMPAT_LAYER_MARKERS)
            }),
            ClassifierRule::new("runtime-container", Role::Game, |s| {
                contains_any(&s.binary, RUNTIME_MARKERS)
            }),
            ClassifierRule::new("application-name-hint", Role::Game, |s| {
                contains_any(&s.application, GAME_NAME_HINTS)
            }),
            ClassifierRule::new("native-game-binary", Role::Game, |s| {
                NATIVE_SUFFIXES.iter().any(|suffix| s.binary.ends_with(suffix))
                    && !contains_any(&s.application, NON_GAME_APPS)
                    && contains_any(&s.binary, GAME_PATH_FRAGMENTS)
            }),
            ClassifierRule::new("media-role", Role::Game, |s| {
                GAME_MEDIA_ROLES.contains(&s.media_role.as_str())
            }),
            ClassifierRule::new("browser", Role::Browser, |s| {
                contains_any(&s.application, BROWSER_NAMES)
            }),
            ClassifierRule::new("communication", Role::Communication, |s| {
                contains_any(&s.application, COMMUNICATION_NAMES)
            }),
            ClassifierRule::new("audio-subsystem", Role::System, |s| {
                contains_any(&s.node_name, AUDIO_SUBSYSTEM_NAMES)
            }),
        ];
        Self::from_rules(rules, Role::Application)
    }
}

fn prop_lower(properties: &Properties, key: &str) -> String {
    properties
        .get(key)
        .map(|value| value.to_lowercase())
        .unwrap_or_default()
}

/// Nodes that produce audio and can be offered as sources
pub fn is_producer(properties: &Properties) -> bool {
    let media_class = properties
        .get(keys::MEDIA_CLASS)
        .map(String::as_str)
        .unwrap_or("");
    media_class.contains("Stream/Output/Audio") || media_class.contains("Audio/Source")
}

/// Playback devices; eligible for sink selection and never routed as a source
pub fn is_hardware_sink(properties: &Properties) -> bool {
    let media_class = properties
        .get(keys::MEDIA_CLASS)
        .map(String::as_str)
        .unwrap_or("");
    media_class.contains("Audio/Sink") || prop_lower(properties, keys::NODE_NAME).contains("alsa_output")
}

pub fn is_virtual_sink(properties: &Properties) -> bool {
    contains_any(&prop_lower(properties, keys::NODE_NAME), VIRTUAL_SINK_MARKERS)
}

pub fn is_gpu_sink(properties: &Properties) -> bool {
    contains_any(&prop_lower(properties, keys::NODE_NAME), GPU_SINK_MARKERS)
}

pub fn is_analog_sink(properties: &Properties) -> bool {
    let name = prop_lower(properties, keys::NODE_NAME);
    name.contains("analog") || name.contains("stereo")
}

/// Wireless headsets commonly fail direct linking or desync
pub fn is_bluetooth(properties: &Properties) -> bool {
    contains_any(&prop_lower(properties, keys::NODE_NAME), BLUETOOTH_ID_MARKERS)
        || contains_any(&prop_lower(properties, keys::DEVICE_NAME), BLUETOOTH_ID_MARKERS)
        || contains_any(
            &prop_lower(properties, keys::NODE_DESCRIPTION),
            BLUETOOTH_DESCRIPTION_MARKERS,
        )
}

/// Node belongs to the recording application
pub fn is_recording_target(properties: &Properties, application: &str) -> bool {
    properties
        .get(keys::APPLICATION_NAME)
        .is_some_and(|name| name.eq_ignore_ascii_case(application))
}

/// Best guess at what an individual stream of a multi-stream app carries
pub fn guess_stream_purpose(properties: &Properties) -> &'static str {
    let max_length: i64 = properties
        .get(keys::MAX_LENGTH)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0);

    let media_name = prop_lower(properties, keys::MEDIA_NAME);
    let stream_number: u32 = media_name
        .split_once("audio stream #")
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .and_then(|number| number.parse().ok())
        .unwrap_or(0);

    if max_length > 31_000 {
        "music/ambient"
    } else if max_length > 25_000 {
        "main audio/gameplay"
    } else if max_length < 12_000 {
        "UI/effects/voice/chat"
    } else if max_length > 20_000 {
        "speech/voice"
    } else {
        match stream_number {
            1 => "main audio",
            2 => "UI/menu",
            3 => "voice/dialogue/chat",
            n if n >= 4 => "music/ambient",
            _ => "audio stream",
        }
    }
}
