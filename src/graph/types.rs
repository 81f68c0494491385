// Core graph types and error definitions
//
// This module contains the typed model of one audio-graph snapshot (nodes,
// ports, links), the derived route view, and the error taxonomy shared by
// every routing component.

use std::collections::BTreeMap;
use std::time::Duration;

/// Numeric object id assigned by the graph manager. Not stable across daemon restarts.
pub type ObjectId = u32;

/// Vendor key/value metadata attached to a node
pub type Properties = BTreeMap<String, String>;

/// Well-known property keys read from the graph manager
pub mod keys {
    pub const MEDIA_CLASS: &str = "media.class";
    pub const MEDIA_NAME: &str = "media.name";
    pub const MEDIA_ROLE: &str = "media.role";
    pub const NODE_NAME: &str = "node.name";
    pub const NODE_DESCRIPTION: &str = "node.description";
    pub const APPLICATION_NAME: &str = "application.name";
    pub const APPLICATION_BINARY: &str = "application.process.binary";
    pub const DEVICE_NAME: &str = "device.name";
    pub const MAX_LENGTH: &str = "pulse.attr.maxlength";
}

/// Semantic role of a node, produced by the classifier ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Role {
    Game,
    Browser,
    Communication,
    System,
    Application,
    Internal,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Game => "Game",
            Role::Browser => "Browser",
            Role::Communication => "Communication",
            Role::System => "System",
            Role::Application => "Application",
            Role::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One endpoint in the audio graph
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Node {
    pub id: ObjectId,
    /// Raw media class, e.g. `Stream/Output/Audio` or `Audio/Sink`
    pub kind: String,
    pub properties: Properties,
    pub role: Role,
}

impl Node {
    /// Property lookup that treats a missing key as the empty string
    pub fn prop(&self, key: &str) -> &str {
        self.properties.get(key).map(String::as_str).unwrap_or("")
    }

    /// Best human-readable name: description, then application name, then node name
    pub fn display_name(&self) -> String {
        [keys::NODE_DESCRIPTION, keys::APPLICATION_NAME, keys::NODE_NAME]
            .iter()
            .map(|key| self.prop(key))
            .find(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Node {}", self.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    In,
    Out,
}

impl PortDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "in" | "input" => Some(PortDirection::In),
            "out" | "output" => Some(PortDirection::Out),
            _ => None,
        }
    }
}

/// A single-channel connection point on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Port {
    pub id: ObjectId,
    pub node_id: ObjectId,
    pub direction: PortDirection,
}

/// A live directed edge between an output port and an input port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Link {
    pub id: ObjectId,
    pub source_node_id: ObjectId,
    pub source_port_id: ObjectId,
    pub target_node_id: ObjectId,
    pub target_port_id: ObjectId,
}

/// Channel label guessed from port id parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    /// Even port ids are usually the left channel. Nothing in the graph manager guarantees it.
    pub fn from_port_id(port_id: ObjectId) -> Self {
        if port_id % 2 == 0 {
            Channel::Left
        } else {
            Channel::Right
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Left => f.write_str("Left"),
            Channel::Right => f.write_str("Right"),
        }
    }
}

/// A link into the recording target, annotated for display
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Route {
    pub link_id: ObjectId,
    pub source_node_id: ObjectId,
    pub source_port_id: ObjectId,
    pub source_label: String,
    pub target_node_id: ObjectId,
    pub target_port_id: ObjectId,
    pub channel: Channel,
}

/// Flags attached to a created link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkFlags {
    /// Keep the link alive after the creating process exits
    pub linger: bool,
    /// Do not make the link exclusive, so the source keeps playing elsewhere
    pub passive: bool,
    /// Keep the channel layout unchanged
    pub dont_remix: bool,
}

impl LinkFlags {
    /// Flags for source → recording target links
    pub fn isolated_route() -> Self {
        Self {
            linger: true,
            passive: true,
            dont_remix: true,
        }
    }

    /// Flags for the restored sink → recording target path
    pub fn restored_sink() -> Self {
        Self {
            linger: true,
            passive: false,
            dont_remix: false,
        }
    }

    /// Render as a pw-cli property block
    pub fn to_property_block(&self) -> String {
        let mut parts = Vec::new();
        if self.linger {
            parts.push("object.linger=true");
        }
        if self.passive {
            parts.push("link.passive=true");
        }
        if self.dont_remix {
            parts.push("link.dont-remix=true");
        }
        format!("{{ {} }}", parts.join(" "))
    }
}

/// Everything needed to create one channel link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRequest {
    pub source_node_id: ObjectId,
    pub source_port_id: ObjectId,
    pub target_node_id: ObjectId,
    pub target_port_id: ObjectId,
    pub flags: LinkFlags,
}

/// Errors that can occur while reading or mutating the audio graph
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("Graph manager unavailable: {0}")]
    Unavailable(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Malformed graph data: {0}")]
    MalformedData(String),

    #[error("Recording target not found - is {application} running?")]
    TargetNotFound { application: String },

    #[error("No valid audio sources to route ({requested} requested, all filtered out)")]
    NoValidSources { requested: usize },

    #[error("Routing partially failed: {summary}")]
    PartialFailure { summary: String },

    #[error("Object {id} not found")]
    NotFound { id: ObjectId },

    #[error("Graph manager rejected the request: {0}")]
    Rejected(String),

    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RoutingError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with(props: &[(&str, &str)]) -> Node {
        Node {
            id: 7,
            kind: String::new(),
            properties: props
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            role: Role::Application,
        }
    }

    #[test]
    fn test_display_name_fallback_order() {
        let node = node_with(&[
            (keys::NODE_NAME, "alsa_playback.game"),
            (keys::APPLICATION_NAME, "Game"),
        ]);
        assert_eq!(node.display_name(), "Game");

        let node = node_with(&[(keys::NODE_DESCRIPTION, ""), (keys::NODE_NAME, "raw")]);
        assert_eq!(node.display_name(), "raw");

        assert_eq!(node_with(&[]).display_name(), "Node 7");
    }

    #[test]
    fn test_channel_parity() {
        assert_eq!(Channel::from_port_id(40), Channel::Left);
        assert_eq!(Channel::from_port_id(41), Channel::Right);
    }

    #[test]
    fn test_link_flag_blocks() {
        assert_eq!(
            LinkFlags::isolated_route().to_property_block(),
            "{ object.linger=true link.passive=true link.dont-remix=true }"
        );
        assert_eq!(
            LinkFlags::restored_sink().to_property_block(),
            "{ object.linger=true }"
        );
    }

    #[test]
    fn test_port_direction_parse() {
        assert_eq!(PortDirection::parse("out"), Some(PortDirection::Out));
        assert_eq!(PortDirection::parse("Input"), Some(PortDirection::In));
        assert_eq!(PortDirection::parse("duplex"), None);
    }
}
