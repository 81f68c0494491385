// Graph snapshot reader
//
// Turns one `pw-dump` payload into a typed, classified snapshot of nodes,
// ports and links. Reading never mutates the graph. A short-lived cache
// coalesces bursts of reads within one operation cycle.

use colored::Colorize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::cache::{Clock, SnapshotCache};
use super::classifier::Classifier;
use super::manager::{with_watchdog, GraphManager};
use super::types::{keys, Link, Node, ObjectId, Port, PortDirection, Properties, Result, RoutingError};

const NODE_TYPE: &str = "PipeWire:Interface:Node";
const PORT_TYPE: &str = "PipeWire:Interface:Port";
const LINK_TYPE: &str = "PipeWire:Interface:Link";

/// Point-in-time view of the audio graph
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    nodes: BTreeMap<ObjectId, Node>,
    /// Ports in dump order; channel pairing relies on this order
    ports: Vec<Port>,
    links: Vec<Link>,
}

impl Snapshot {
    /// Parse a `pw-dump` JSON array, classifying every node on the way
    pub fn from_dump(payload: &str, classifier: &Classifier) -> Result<Self> {
        let data: Value = serde_json::from_str(payload)
            .map_err(|e| RoutingError::MalformedData(format!("JSON parse error: {}", e)))?;
        let objects = data
            .as_array()
            .ok_or_else(|| RoutingError::MalformedData("dump is not a JSON array".to_string()))?;

        let mut snapshot = Snapshot::default();
        for object in objects {
            let Some(id) = object.get("id").and_then(as_object_id) else {
                continue;
            };
            let info = object.get("info").unwrap_or(&Value::Null);
            match object.get("type").and_then(Value::as_str) {
                Some(NODE_TYPE) => {
                    let properties = props_of(info);
                    let kind = properties.get(keys::MEDIA_CLASS).cloned().unwrap_or_default();
                    let role = classifier.classify(&properties);
                    snapshot.nodes.insert(
                        id,
                        Node {
                            id,
                            kind,
                            properties,
                            role,
                        },
                    );
                }
                Some(PORT_TYPE) => match parse_port(id, info) {
                    Some(port) => snapshot.ports.push(port),
                    None => crate::route_debug!("Skipping port {} without owner/direction", id),
                },
                Some(LINK_TYPE) => match parse_link(id, info) {
                    Some(link) => snapshot.links.push(link),
                    None => crate::route_debug!("Skipping link {} without endpoints", id),
                },
                _ => {}
            }
        }

        debug!(
            "Parsed snapshot: {} nodes, {} ports, {} links",
            snapshot.nodes.len(),
            snapshot.ports.len(),
            snapshot.links.len()
        );
        Ok(snapshot)
    }

    /// Build a snapshot directly from typed parts
    pub fn from_parts(nodes: Vec<Node>, ports: Vec<Port>, links: Vec<Link>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|node| (node.id, node)).collect(),
            ports,
            links,
        }
    }

    pub fn node(&self, id: ObjectId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Port ids of a node in one direction, in discovery order
    pub fn port_ids(&self, node_id: ObjectId, direction: PortDirection) -> Vec<ObjectId> {
        self.ports
            .iter()
            .filter(|port| port.node_id == node_id && port.direction == direction)
            .map(|port| port.id)
            .collect()
    }

    /// Links whose input side belongs to the given node
    pub fn links_into(&self, node_id: ObjectId) -> impl Iterator<Item = &Link> {
        self.links
            .iter()
            .filter(move |link| link.target_node_id == node_id)
    }
}

fn as_object_id(value: &Value) -> Option<ObjectId> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| ObjectId::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn props_of(info: &Value) -> Properties {
    let mut properties = Properties::new();
    if let Some(map) = info.get("props").and_then(Value::as_object) {
        for (key, value) in map {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            properties.insert(key.clone(), rendered);
        }
    }
    properties
}

fn parse_port(id: ObjectId, info: &Value) -> Option<Port> {
    let props = info.get("props").unwrap_or(&Value::Null);
    let node_id = props.get("node.id").and_then(as_object_id)?;
    let direction = props
        .get("port.direction")
        .or_else(|| info.get("direction"))
        .and_then(Value::as_str)
        .and_then(PortDirection::parse)?;
    Some(Port {
        id,
        node_id,
        direction,
    })
}

fn parse_link(id: ObjectId, info: &Value) -> Option<Link> {
    Some(Link {
        id,
        source_node_id: info.get("output-node-id").and_then(as_object_id)?,
        source_port_id: info.get("output-port-id").and_then(as_object_id)?,
        target_node_id: info.get("input-node-id").and_then(as_object_id)?,
        target_port_id: info.get("input-port-id").and_then(as_object_id)?,
    })
}

/// Reads classified snapshots from the graph manager under a timeout
pub struct SnapshotReader {
    manager: Arc<dyn GraphManager>,
    classifier: Arc<Classifier>,
    cache: Mutex<SnapshotCache>,
    timeout: Duration,
}

impl SnapshotReader {
    pub fn new(
        manager: Arc<dyn GraphManager>,
        classifier: Arc<Classifier>,
        clock: Arc<dyn Clock>,
        cache_window: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            manager,
            classifier,
            cache: Mutex::new(SnapshotCache::new(clock, cache_window)),
            timeout,
        }
    }

    /// Snapshot that may come from the freshness cache
    pub async fn read_snapshot(&self) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = self.cache.lock().await.get() {
            return Ok(snapshot);
        }
        self.read_fresh().await
    }

    /// Snapshot straight from the graph manager, bypassing and refreshing the cache
    pub async fn read_fresh(&self) -> Result<Arc<Snapshot>> {
        let started = std::time::Instant::now();
        let payload = with_watchdog("pw-dump", self.timeout, self.manager.dump())
            .await
            .map_err(|e| {
                error!("{} Snapshot read failed: {}", "SNAPSHOT_ERROR".bright_red(), e);
                e
            })?;

        let snapshot = Arc::new(Snapshot::from_dump(&payload, &self.classifier)?);
        info!(
            "{} {} nodes, {} links in {:.2}s",
            "SNAPSHOT".bright_blue(),
            snapshot.nodes.len(),
            snapshot.links.len(),
            started.elapsed().as_secs_f64()
        );

        self.cache.lock().await.store(snapshot.clone());
        Ok(snapshot)
    }

    /// Forget the cached snapshot after the graph has been mutated
    pub async fn invalidate(&self) {
        self.cache.lock().await.invalidate();
    }
}
