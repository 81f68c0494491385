// In-memory graph manager for tests and dry runs
//
// Keeps a small node/port/link graph, renders it in `pw-dump` shape, applies
// link mutations like the real daemon would, and counts every call. Failures,
// delays and unavailability can be injected per operation.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::manager::GraphManager;
use super::types::{Link, LinkRequest, ObjectId, PortDirection, Result, RoutingError};

#[derive(Debug, Default)]
struct FakeState {
    nodes: BTreeMap<ObjectId, BTreeMap<String, String>>,
    /// (port id, owner, direction) in creation order
    ports: Vec<(ObjectId, ObjectId, PortDirection)>,
    links: Vec<Link>,
    next_id: ObjectId,
    unavailable: bool,
    dump_delay: Option<Duration>,
    create_delay: Option<Duration>,
    failing_source_ports: HashSet<ObjectId>,
    failing_destroys: HashSet<ObjectId>,
    created: Vec<LinkRequest>,
    dump_calls: usize,
    create_calls: usize,
    destroy_calls: usize,
}

/// Deterministic stand-in for the PipeWire daemon
#[derive(Debug, Default)]
pub struct FakeGraphManager {
    state: Mutex<FakeState>,
}

/// Call counters recorded by the fake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallCounts {
    pub dumps: usize,
    pub creates: usize,
    pub destroys: usize,
}

impl CallCounts {
    pub fn mutations(&self) -> usize {
        self.creates + self.destroys
    }
}

impl FakeGraphManager {
    pub fn new() -> Self {
        let manager = Self::default();
        manager.lock().next_id = 1000;
        manager
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_node(&self, id: ObjectId, properties: &[(&str, &str)]) -> &Self {
        self.lock().nodes.insert(
            id,
            properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    pub fn add_port(&self, id: ObjectId, node_id: ObjectId, direction: PortDirection) -> &Self {
        self.lock().ports.push((id, node_id, direction));
        self
    }

    /// Insert an existing link, resolving owners from the port table
    pub fn add_link(&self, id: ObjectId, source_port_id: ObjectId, target_port_id: ObjectId) -> &Self {
        let mut state = self.lock();
        let owner = |port: ObjectId| {
            state
                .ports
                .iter()
                .find(|(pid, _, _)| *pid == port)
                .map(|(_, node, _)| *node)
                .unwrap_or(0)
        };
        let link = Link {
            id,
            source_node_id: owner(source_port_id),
            source_port_id,
            target_node_id: owner(target_port_id),
            target_port_id,
        };
        state.links.push(link);
        self
    }

    pub fn remove_node(&self, id: ObjectId) -> &Self {
        let mut state = self.lock();
        state.nodes.remove(&id);
        state.ports.retain(|(_, node, _)| *node != id);
        state
            .links
            .retain(|link| link.source_node_id != id && link.target_node_id != id);
        self
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn set_dump_delay(&self, delay: Option<Duration>) {
        self.lock().dump_delay = delay;
    }

    pub fn set_create_delay(&self, delay: Option<Duration>) {
        self.lock().create_delay = delay;
    }

    /// Make every create-link from this output port fail
    pub fn fail_links_from_port(&self, port_id: ObjectId) {
        self.lock().failing_source_ports.insert(port_id);
    }

    /// Make destroying this link fail with a rejection
    pub fn fail_destroy(&self, link_id: ObjectId) {
        self.lock().failing_destroys.insert(link_id);
    }

    pub fn links(&self) -> Vec<Link> {
        self.lock().links.clone()
    }

    /// Links between two nodes
    pub fn links_between(&self, source: ObjectId, target: ObjectId) -> Vec<Link> {
        self.lock()
            .links
            .iter()
            .filter(|link| link.source_node_id == source && link.target_node_id == target)
            .copied()
            .collect()
    }

    /// Every create-link request received, in order
    pub fn created_requests(&self) -> Vec<LinkRequest> {
        self.lock().created.clone()
    }

    pub fn calls(&self) -> CallCounts {
        let state = self.lock();
        CallCounts {
            dumps: state.dump_calls,
            creates: state.create_calls,
            destroys: state.destroy_calls,
        }
    }

    fn render_dump(state: &FakeState) -> String {
        let mut objects: Vec<Value> = Vec::new();
        for (id, props) in &state.nodes {
            objects.push(json!({
                "id": id,
                "type": "PipeWire:Interface:Node",
                "info": { "props": props },
            }));
        }
        for (id, node_id, direction) in &state.ports {
            let direction = match direction {
                PortDirection::In => "in",
                PortDirection::Out => "out",
            };
            objects.push(json!({
                "id": id,
                "type": "PipeWire:Interface:Port",
                "info": { "props": { "node.id": node_id.to_string(), "port.direction": direction } },
            }));
        }
        for link in &state.links {
            objects.push(json!({
                "id": link.id,
                "type": "PipeWire:Interface:Link",
                "info": {
                    "output-node-id": link.source_node_id,
                    "output-port-id": link.source_port_id,
                    "input-node-id": link.target_node_id,
                    "input-port-id": link.target_port_id,
                },
            }));
        }
        Value::Array(objects).to_string()
    }
}

#[async_trait]
impl GraphManager for FakeGraphManager {
    async fn dump(&self) -> Result<String> {
        let (delay, payload) = {
            let mut state = self.lock();
            state.dump_calls += 1;
            if state.unavailable {
                return Err(RoutingError::Unavailable("fake daemon stopped".to_string()));
            }
            (state.dump_delay, Self::render_dump(&state))
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(payload)
    }

    async fn list_links(&self) -> Result<Vec<Link>> {
        let state = self.lock();
        if state.unavailable {
            return Err(RoutingError::Unavailable("fake daemon stopped".to_string()));
        }
        Ok(state.links.clone())
    }

    async fn object_info(&self, id: ObjectId) -> Result<BTreeMap<String, String>> {
        self.lock()
            .nodes
            .get(&id)
            .cloned()
            .ok_or(RoutingError::NotFound { id })
    }

    async fn create_link(&self, request: &LinkRequest) -> Result<()> {
        let delay = {
            let mut state = self.lock();
            state.create_calls += 1;
            state.create_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if state.unavailable {
            return Err(RoutingError::Unavailable("fake daemon stopped".to_string()));
        }
        if state.failing_source_ports.contains(&request.source_port_id) {
            return Err(RoutingError::Rejected(format!(
                "port {} refused link",
                request.source_port_id
            )));
        }
        let port_ok = |port: ObjectId, node: ObjectId, direction: PortDirection| {
            state
                .ports
                .iter()
                .any(|(pid, owner, dir)| *pid == port && *owner == node && *dir == direction)
        };
        if !port_ok(request.source_port_id, request.source_node_id, PortDirection::Out)
            || !port_ok(request.target_port_id, request.target_node_id, PortDirection::In)
        {
            return Err(RoutingError::Rejected("unknown port".to_string()));
        }
        if state.links.iter().any(|link| {
            link.source_port_id == request.source_port_id && link.target_port_id == request.target_port_id
        }) {
            return Err(RoutingError::Rejected("File exists".to_string()));
        }

        state.next_id += 1;
        let link = Link {
            id: state.next_id,
            source_node_id: request.source_node_id,
            source_port_id: request.source_port_id,
            target_node_id: request.target_node_id,
            target_port_id: request.target_port_id,
        };
        state.links.push(link);
        state.created.push(*request);
        Ok(())
    }

    async fn destroy_link(&self, link_id: ObjectId) -> Result<()> {
        let mut state = self.lock();
        state.destroy_calls += 1;
        if state.unavailable {
            return Err(RoutingError::Unavailable("fake daemon stopped".to_string()));
        }
        if state.failing_destroys.contains(&link_id) {
            return Err(RoutingError::Rejected(format!("cannot destroy {}", link_id)));
        }
        let before = state.links.len();
        state.links.retain(|link| link.id != link_id);
        if state.links.len() == before {
            return Err(RoutingError::NotFound { id: link_id });
        }
        Ok(())
    }
}
