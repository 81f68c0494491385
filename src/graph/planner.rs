// Route calculation
//
// Computes the link removals and channel links needed to move from the live
// routing state to "only the selected sources reach the recording target".
// Removals are scoped to links that end at the recording target, so a
// source's path to the speakers is never part of a plan.

use colored::Colorize;
use tracing::{debug, warn};

use super::classifier::{is_bluetooth, is_hardware_sink};
use super::snapshot::Snapshot;
use super::types::{Link, LinkFlags, LinkRequest, ObjectId, PortDirection, Result, RoutingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Hardware sink → target; lets all system audio bleed into the recording
    SinkBleed,
    /// Selected source → target left over from an earlier routing
    StaleRoute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    pub link: Link,
    pub reason: RemovalReason,
}

/// Why a candidate source was dropped during validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Missing,
    Bluetooth,
    HardwareSink,
    RecordingTarget,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Rejection::Missing => "no longer present",
            Rejection::Bluetooth => "Bluetooth device",
            Rejection::HardwareSink => "audio sink",
            Rejection::RecordingTarget => "is the recording target",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    pub valid: Vec<ObjectId>,
    pub rejected: Vec<(ObjectId, Rejection)>,
}

/// Channel links planned for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConnection {
    pub source_node_id: ObjectId,
    pub target_node_id: ObjectId,
    pub channels: Vec<LinkRequest>,
    /// Set when no channel could be paired
    pub problem: Option<String>,
}

/// Ordered transition: every removal precedes every creation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub removals: Vec<Removal>,
    pub connections: Vec<SourceConnection>,
    pub validation: Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStep {
    RemoveLink(ObjectId),
    CreateLink(LinkRequest),
}

impl Plan {
    pub fn steps(&self) -> Vec<PlanStep> {
        self.removals
            .iter()
            .map(|removal| PlanStep::RemoveLink(removal.link.id))
            .chain(
                self.connections
                    .iter()
                    .flat_map(|connection| connection.channels.iter().copied().map(PlanStep::CreateLink)),
            )
            .collect()
    }
}

fn dedup(ids: &[ObjectId]) -> Vec<ObjectId> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }
    seen
}

/// Links into the target that must go before new routes are created
pub fn removal_set(snapshot: &Snapshot, selected: &[ObjectId], target: ObjectId) -> Vec<Removal> {
    snapshot
        .links_into(target)
        .filter_map(|link| {
            let source = snapshot.node(link.source_node_id);
            let reason = if source.is_some_and(|node| is_hardware_sink(&node.properties)) {
                RemovalReason::SinkBleed
            } else if selected.contains(&link.source_node_id) {
                RemovalReason::StaleRoute
            } else {
                return None;
            };
            crate::route_debug!(
                "  Link {} ({} → {}) marked for removal: {:?}",
                link.id,
                link.source_node_id,
                link.target_node_id,
                reason
            );
            Some(Removal {
                link: *link,
                reason,
            })
        })
        .collect()
}

/// Drop candidates that are gone, wireless, sinks, or the target itself
pub fn validate_sources(snapshot: &Snapshot, candidates: &[ObjectId], target: ObjectId) -> Validation {
    let mut validation = Validation::default();
    for id in dedup(candidates) {
        let rejection = match snapshot.node(id) {
            None => Some(Rejection::Missing),
            Some(_) if id == target => Some(Rejection::RecordingTarget),
            Some(node) if is_bluetooth(&node.properties) => Some(Rejection::Bluetooth),
            Some(node) if is_hardware_sink(&node.properties) => Some(Rejection::HardwareSink),
            Some(_) => None,
        };
        match rejection {
            Some(reason) => {
                warn!(
                    "{} Skipping source {}: {}",
                    "SOURCE_REJECTED".bright_yellow(),
                    id,
                    reason
                );
                validation.rejected.push((id, reason));
            }
            None => {
                debug!("Validated source {}", id);
                validation.valid.push(id);
            }
        }
    }
    validation
}

/// Pair the source's output ports with the target's input ports by position
pub fn pair_ports(
    snapshot: &Snapshot,
    source: ObjectId,
    target: ObjectId,
    flags: LinkFlags,
) -> SourceConnection {
    let source_ports = snapshot.port_ids(source, PortDirection::Out);
    let target_ports = snapshot.port_ids(target, PortDirection::In);

    let problem = if source_ports.is_empty() {
        Some(format!("Node {}: no output ports", source))
    } else if target_ports.is_empty() {
        Some(format!("Node {}: target has no input ports", source))
    } else {
        None
    };

    let channels = source_ports
        .iter()
        .zip(target_ports.iter())
        .map(|(&source_port_id, &target_port_id)| LinkRequest {
            source_node_id: source,
            source_port_id,
            target_node_id: target,
            target_port_id,
            flags,
        })
        .collect::<Vec<_>>();

    crate::route_debug!(
        "  Pairing {} channel(s): {:?} → {:?}",
        channels.len(),
        &source_ports[..channels.len()],
        &target_ports[..channels.len()]
    );

    SourceConnection {
        source_node_id: source,
        target_node_id: target,
        channels,
        problem,
    }
}

/// Channel plans for already-validated sources
pub fn connection_plan(snapshot: &Snapshot, sources: &[ObjectId], target: ObjectId) -> Vec<SourceConnection> {
    sources
        .iter()
        .map(|&source| pair_ports(snapshot, source, target, LinkFlags::isolated_route()))
        .collect()
}

/// Full transition from one snapshot
///
/// An empty selection yields a removal-only plan. A non-empty selection that
/// validates to nothing fails with `NoValidSources` and plans no mutation.
pub fn compute_transition(snapshot: &Snapshot, selected: &[ObjectId], target: ObjectId) -> Result<Plan> {
    let selected = dedup(selected);
    let validation = validate_sources(snapshot, &selected, target);
    if !selected.is_empty() && validation.valid.is_empty() {
        return Err(RoutingError::NoValidSources {
            requested: selected.len(),
        });
    }

    let removals = removal_set(snapshot, &selected, target);
    let connections = connection_plan(snapshot, &validation.valid, target);
    Ok(Plan {
        removals,
        connections,
        validation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{keys, Node, Port, Role};

    fn node(id: ObjectId, props: &[(&str, &str)]) -> Node {
        let properties: crate::graph::types::Properties = props
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Node {
            id,
            kind: properties.get(keys::MEDIA_CLASS).cloned().unwrap_or_default(),
            properties,
            role: Role::Application,
        }
    }

    fn port(id: ObjectId, node_id: ObjectId, direction: PortDirection) -> Port {
        Port { id, node_id, direction }
    }

    fn link(id: ObjectId, src: (ObjectId, ObjectId), dst: (ObjectId, ObjectId)) -> Link {
        Link {
            id,
            source_node_id: src.0,
            source_port_id: src.1,
            target_node_id: dst.0,
            target_port_id: dst.1,
        }
    }

    /// Game 10, analog sink 20, target 30, browser 40, Bluetooth 50
    fn scenario() -> Snapshot {
        Snapshot::from_parts(
            vec![
                node(10, &[(keys::MEDIA_CLASS, "Stream/Output/Audio"), (keys::APPLICATION_BINARY, "game.exe")]),
                node(20, &[(keys::MEDIA_CLASS, "Audio/Sink"), (keys::NODE_NAME, "alsa_output.analog-stereo")]),
                node(30, &[(keys::MEDIA_CLASS, "Stream/Input/Audio"), (keys::APPLICATION_NAME, "Steam")]),
                node(40, &[(keys::MEDIA_CLASS, "Stream/Output/Audio"), (keys::APPLICATION_NAME, "Firefox")]),
                node(50, &[(keys::MEDIA_CLASS, "Stream/Output/Audio"), (keys::NODE_NAME, "bluez_input.headset")]),
            ],
            vec![
                port(11, 10, PortDirection::Out),
                port(12, 10, PortDirection::Out),
                port(21, 20, PortDirection::In),
                port(22, 20, PortDirection::In),
                port(23, 20, PortDirection::Out),
                port(24, 20, PortDirection::Out),
                port(31, 30, PortDirection::In),
                port(32, 30, PortDirection::In),
                port(41, 40, PortDirection::Out),
            ],
            vec![
                link(100, (10, 11), (20, 21)),
                link(101, (10, 12), (20, 22)),
                link(102, (20, 23), (30, 31)),
                link(103, (20, 24), (30, 32)),
                link(104, (10, 11), (30, 31)),
                link(105, (40, 41), (30, 31)),
            ],
        )
    }

    #[test]
    fn test_removals_scoped_to_target() {
        let removals = removal_set(&scenario(), &[10], 30);
        let ids: Vec<_> = removals.iter().map(|r| r.link.id).collect();
        assert_eq!(ids, vec![102, 103, 104]);
        assert_eq!(removals[0].reason, RemovalReason::SinkBleed);
        assert_eq!(removals[2].reason, RemovalReason::StaleRoute);
    }

    #[test]
    fn test_unselected_source_route_is_kept() {
        let removals = removal_set(&scenario(), &[10], 30);
        assert!(removals.iter().all(|r| r.link.id != 105));
    }

    #[test]
    fn test_validation_filters_bluetooth_and_sinks() {
        let validation = validate_sources(&scenario(), &[50, 10, 20, 99, 30, 10], 30);
        assert_eq!(validation.valid, vec![10]);
        assert_eq!(
            validation.rejected,
            vec![
                (50, Rejection::Bluetooth),
                (20, Rejection::HardwareSink),
                (99, Rejection::Missing),
                (30, Rejection::RecordingTarget),
            ]
        );
    }

    #[test]
    fn test_only_bluetooth_is_no_valid_sources() {
        let result = compute_transition(&scenario(), &[50], 30);
        assert!(matches!(result, Err(RoutingError::NoValidSources { requested: 1 })));
    }

    #[test]
    fn test_stereo_pairing_in_discovery_order() {
        let connection = pair_ports(&scenario(), 10, 30, LinkFlags::isolated_route());
        assert!(connection.problem.is_none());
        let pairs: Vec<_> = connection
            .channels
            .iter()
            .map(|c| (c.source_port_id, c.target_port_id))
            .collect();
        assert_eq!(pairs, vec![(11, 31), (12, 32)]);
    }

    #[test]
    fn test_mono_source_degrades() {
        let connection = pair_ports(&scenario(), 40, 30, LinkFlags::isolated_route());
        assert_eq!(connection.channels.len(), 1);
    }

    #[test]
    fn test_missing_ports_reported() {
        let connection = pair_ports(&scenario(), 50, 30, LinkFlags::isolated_route());
        assert!(connection.channels.is_empty());
        assert_eq!(connection.problem.as_deref(), Some("Node 50: no output ports"));
    }

    #[test]
    fn test_plan_orders_removals_first() {
        let plan = compute_transition(&scenario(), &[10], 30).unwrap();
        let steps = plan.steps();
        let first_create = steps
            .iter()
            .position(|step| matches!(step, PlanStep::CreateLink(_)))
            .unwrap();
        assert!(steps[..first_create]
            .iter()
            .all(|step| matches!(step, PlanStep::RemoveLink(_))));
        assert_eq!(first_create, 3);
        assert_eq!(steps.len(), 5);
    }

    #[test]
    fn test_empty_selection_only_clears_sink() {
        let plan = compute_transition(&scenario(), &[], 30).unwrap();
        let ids: Vec<_> = plan.removals.iter().map(|r| r.link.id).collect();
        assert_eq!(ids, vec![102, 103]);
        assert!(plan.connections.is_empty());
    }
}
