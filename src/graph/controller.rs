// Routing controller
//
// Public operations of the routing core: detect sources, apply routing for a
// selection, list current routes, disconnect everything from the recording
// target and restore the default sink path. Every operation resolves the
// recording target again from a fresh snapshot; node ids are never carried
// across operations. Callers serialize operations.

use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::cache::{Clock, SystemClock};
use super::classifier::{guess_stream_purpose, is_producer, is_recording_target, Classifier};
use super::executor::{ConnectionStatus, LinkExecutor};
use super::manager::{with_watchdog, GraphManager};
use super::planner::{compute_transition, connection_plan, pair_ports, validate_sources};
use super::sink_selection::select_restore_sink;
use super::snapshot::{Snapshot, SnapshotReader};
use super::types::{
    keys, Channel, LinkFlags, ObjectId, PortDirection, Result, Role, Route, RoutingError,
};
use crate::config::RouterConfig;

/// Session state; not persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RoutingState {
    Unrouted,
    Isolated { sources: Vec<ObjectId> },
}

/// Boolean outcome plus human-readable summary of a routing operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingOutcome {
    pub ok: bool,
    pub summary: String,
    pub removed: usize,
    pub connected: usize,
    pub failed: Vec<String>,
}

impl RoutingOutcome {
    /// Turn a reported failure into `RoutingError::PartialFailure`
    pub fn into_result(self) -> Result<Self> {
        if self.ok {
            Ok(self)
        } else {
            Err(RoutingError::PartialFailure {
                summary: self.summary,
            })
        }
    }
}

/// A classified, routable audio producer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedSource {
    pub node_id: ObjectId,
    pub label: String,
    pub role: Role,
    pub application: String,
    pub binary: String,
    pub media_class: String,
    pub media_name: String,
    pub stream_purpose: String,
    /// Listed on the user's exclusion list
    pub excluded: bool,
}

/// The recording application's input node as currently resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingTarget {
    pub node_id: ObjectId,
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

/// Game sources that are not excluded; the default selection
pub fn default_selection(sources: &[DetectedSource]) -> Vec<ObjectId> {
    sources
        .iter()
        .filter(|source| source.role == Role::Game && !source.excluded)
        .map(|source| source.node_id)
        .collect()
}

/// Distinct source nodes among the routes, in first-seen order
pub fn routed_sources(routes: &[Route]) -> Vec<ObjectId> {
    let mut sources = Vec::new();
    for route in routes {
        if !sources.contains(&route.source_node_id) {
            sources.push(route.source_node_id);
        }
    }
    sources
}

pub struct RoutingController {
    manager: Arc<dyn GraphManager>,
    reader: SnapshotReader,
    executor: LinkExecutor,
    config: RouterConfig,
    preferred_sink: Option<String>,
    state: Mutex<RoutingState>,
}

impl RoutingController {
    pub fn new(manager: Arc<dyn GraphManager>, config: RouterConfig) -> Self {
        Self::with_parts(manager, config, Arc::new(Classifier::default()), Arc::new(SystemClock))
    }

    pub fn with_parts(
        manager: Arc<dyn GraphManager>,
        config: RouterConfig,
        classifier: Arc<Classifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let reader = SnapshotReader::new(
            manager.clone(),
            classifier,
            clock,
            config.cache_window(),
            config.snapshot_timeout(),
        );
        let executor = LinkExecutor::new(manager.clone(), config.link_timeout(), config.destroy_timeout());
        Self {
            manager,
            reader,
            executor,
            config,
            preferred_sink: None,
            state: Mutex::new(RoutingState::Unrouted),
        }
    }

    /// Sink node name to favour when restoring the default path
    pub fn with_preferred_sink(mut self, preferred_sink: Option<String>) -> Self {
        self.preferred_sink = preferred_sink;
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub async fn state(&self) -> RoutingState {
        self.state.lock().await.clone()
    }

    async fn set_state(&self, state: RoutingState) {
        *self.state.lock().await = state;
    }

    /// Find the recording target in a snapshot
    ///
    /// Input streams of the recording application win over its other nodes,
    /// then nodes that expose input ports.
    pub fn resolve_target(&self, snapshot: &Snapshot) -> Result<ObjectId> {
        let application = &self.config.target_application;
        let candidates: Vec<_> = snapshot
            .nodes()
            .filter(|node| is_recording_target(&node.properties, application))
            .collect();

        candidates
            .iter()
            .find(|node| node.kind.contains("Stream/Input/Audio"))
            .or_else(|| {
                candidates
                    .iter()
                    .find(|node| !snapshot.port_ids(node.id, PortDirection::In).is_empty())
            })
            .or_else(|| candidates.first())
            .map(|node| node.id)
            .ok_or_else(|| {
                warn!(
                    "{} No {} node found - is it running?",
                    "TARGET_NOT_FOUND".bright_yellow(),
                    application
                );
                RoutingError::TargetNotFound {
                    application: application.clone(),
                }
            })
    }

    /// Resolve the recording target and confirm it with a per-object query
    pub async fn recording_target(&self) -> Result<RecordingTarget> {
        let snapshot = self.reader.read_fresh().await?;
        let node_id = self.resolve_target(&snapshot)?;
        let properties = with_watchdog(
            "pw-cli info",
            self.config.snapshot_timeout(),
            self.manager.object_info(node_id),
        )
        .await
        .map_err(|e| match e {
            RoutingError::NotFound { .. } => RoutingError::TargetNotFound {
                application: self.config.target_application.clone(),
            },
            other => other,
        })?;
        let name = snapshot
            .node(node_id)
            .map(|node| node.display_name())
            .unwrap_or_else(|| format!("Node {}", node_id));
        Ok(RecordingTarget {
            node_id,
            name,
            properties,
        })
    }

    /// Classified producers, excluding internal nodes and the recorder itself
    pub async fn detect_sources(&self, excluded: &[String]) -> Result<Vec<DetectedSource>> {
        let snapshot = self.reader.read_snapshot().await?;
        let application = &self.config.target_application;

        let sources: Vec<DetectedSource> = snapshot
            .nodes()
            .filter(|node| is_producer(&node.properties))
            .filter(|node| node.role != Role::Internal)
            .filter(|node| !is_recording_target(&node.properties, application))
            .map(|node| {
                let media_name = node.prop(keys::MEDIA_NAME).to_string();
                let mut label = node.display_name();
                let mut stream_purpose = String::new();
                if !media_name.is_empty() {
                    label = format!("{} ({})", label, media_name);
                    stream_purpose = guess_stream_purpose(&node.properties).to_string();
                }
                DetectedSource {
                    node_id: node.id,
                    excluded: excluded.contains(&label),
                    label,
                    role: node.role,
                    application: node.prop(keys::APPLICATION_NAME).to_string(),
                    binary: node.prop(keys::APPLICATION_BINARY).to_string(),
                    media_class: node.kind.clone(),
                    media_name,
                    stream_purpose,
                }
            })
            .collect();

        info!("{} Found {} audio source(s)", "SOURCES".bright_blue(), sources.len());
        for source in &sources {
            crate::route_debug!(
                "  Source: id={}, name={}, type={}",
                source.node_id,
                source.label,
                source.role
            );
        }
        Ok(sources)
    }

    /// Map persisted source labels onto current node ids
    ///
    /// Returns the resolved ids and the labels that matched nothing.
    pub async fn resolve_labels(&self, labels: &[String]) -> Result<(Vec<ObjectId>, Vec<String>)> {
        let sources = self.detect_sources(&[]).await?;
        let mut ids = Vec::new();
        let mut unresolved = Vec::new();
        for label in labels {
            let matches: Vec<_> = sources
                .iter()
                .filter(|source| &source.label == label)
                .map(|source| source.node_id)
                .collect();
            if matches.is_empty() {
                unresolved.push(label.clone());
            } else {
                ids.extend(matches);
            }
        }
        Ok((ids, unresolved))
    }

    /// Links currently feeding the recording target
    pub async fn current_routes(&self) -> Result<Vec<Route>> {
        let snapshot = self.reader.read_fresh().await?;
        let target = self.resolve_target(&snapshot)?;

        let routes: Vec<Route> = snapshot
            .links_into(target)
            .map(|link| Route {
                link_id: link.id,
                source_node_id: link.source_node_id,
                source_port_id: link.source_port_id,
                source_label: snapshot
                    .node(link.source_node_id)
                    .map(|node| node.display_name())
                    .unwrap_or_else(|| format!("Node {}", link.source_node_id)),
                target_node_id: link.target_node_id,
                target_port_id: link.target_port_id,
                channel: Channel::from_port_id(link.source_port_id),
            })
            .collect();

        crate::route_debug!("Found {} route(s) into node {}", routes.len(), target);
        Ok(routes)
    }

    /// Route exactly the selected sources into the recording target
    ///
    /// Removes sink → target and stale selected → target links first, then
    /// re-validates the selection on a fresh snapshot and creates channel
    /// links. Source → speaker links are never touched.
    pub async fn apply_routing(&self, selected: &[ObjectId]) -> Result<RoutingOutcome> {
        info!(
            "{} Routing {} source(s): {:?}",
            "ROUTE_APPLY".bright_cyan(),
            selected.len(),
            selected
        );

        let snapshot = self.reader.read_fresh().await?;
        let target = self.resolve_target(&snapshot)?;
        let plan = compute_transition(&snapshot, selected, target)?;

        let removal_ids: Vec<ObjectId> = plan.removals.iter().map(|removal| removal.link.id).collect();
        crate::route_debug!("Removing {} existing route(s): {:?}", removal_ids.len(), removal_ids);
        let removals = self.executor.remove_links(&removal_ids).await;
        self.reader.invalidate().await;

        let mut failed: Vec<String> = removals
            .failed
            .iter()
            .map(|(link_id, reason)| format!("Link {}: {}", link_id, reason))
            .collect();

        let mut connected = Vec::new();
        if !plan.validation.valid.is_empty() {
            let settle = self.config.settle_delay();
            if !settle.is_zero() {
                tokio::time::sleep(settle).await;
            }

            let fresh = self.reader.read_fresh().await?;
            let target = self.resolve_target(&fresh)?;
            let revalidated = validate_sources(&fresh, &plan.validation.valid, target);
            if revalidated.valid.is_empty() {
                error!(
                    "{} Every source vanished after removing old routes",
                    "ROUTE_APPLY_FAILED".bright_red()
                );
                return Err(RoutingError::NoValidSources {
                    requested: selected.len(),
                });
            }

            for connection in connection_plan(&fresh, &revalidated.valid, target) {
                let result = self.executor.connect_source(&connection).await;
                match result.status() {
                    ConnectionStatus::Connected => connected.push(result.source_node_id),
                    ConnectionStatus::Partial | ConnectionStatus::Failed => {
                        failed.push(if result.failures.is_empty() {
                            format!("Node {}: all channels failed", result.source_node_id)
                        } else {
                            result.failures.join("; ")
                        });
                    }
                }
            }
            self.reader.invalidate().await;
        }

        let mut summary = format!(
            "Removed {} existing route(s), connected {} source(s)",
            removals.cleared(),
            connected.len()
        );
        if !failed.is_empty() {
            summary.push_str(&format!(" ({} failed)", failed.len()));
        }

        let ok = failed.is_empty();
        if ok {
            info!("{} {}", "ROUTE_APPLIED".bright_green(), summary);
            self.set_state(RoutingState::Isolated { sources: connected.clone() }).await;
        } else {
            warn!("{} {}", "ROUTE_APPLY_PARTIAL".bright_yellow(), summary);
        }

        Ok(RoutingOutcome {
            ok,
            summary,
            removed: removals.cleared(),
            connected: connected.len(),
            failed,
        })
    }

    /// Remove every link into the recording target, whatever its source
    pub async fn disconnect_all(&self) -> Result<RoutingOutcome> {
        info!("{} Disconnecting all routes", "ROUTE_DISCONNECT".bright_cyan());

        let snapshot = self.reader.read_fresh().await?;
        let target = self.resolve_target(&snapshot)?;
        let link_ids: Vec<ObjectId> = snapshot.links_into(target).map(|link| link.id).collect();

        let report = self.executor.remove_links(&link_ids).await;
        self.reader.invalidate().await;

        let mut summary = format!("Disconnected {} routes", report.cleared());
        if !report.failed.is_empty() {
            summary.push_str(&format!(" ({} failed)", report.failed.len()));
        }

        // Re-check; other clients may have linked into the target meanwhile
        match with_watchdog(
            "pw-cli list-objects",
            self.config.snapshot_timeout(),
            self.manager.list_links(),
        )
        .await
        {
            Ok(links) => {
                let remaining = links.iter().filter(|link| link.target_node_id == target).count();
                if remaining > 0 {
                    warn!(
                        "{} {} route(s) still feed node {}",
                        "ROUTE_REMAINING".bright_yellow(),
                        remaining,
                        target
                    );
                    summary.push_str(&format!(", {} remaining", remaining));
                }
            }
            Err(e) => warn!("Could not verify disconnection: {}", e),
        }

        let ok = report.failed.is_empty();
        if ok {
            self.set_state(RoutingState::Unrouted).await;
        }
        Ok(RoutingOutcome {
            ok,
            summary,
            removed: report.cleared(),
            connected: 0,
            failed: report
                .failed
                .iter()
                .map(|(link_id, reason)| format!("Link {}: {}", link_id, reason))
                .collect(),
        })
    }

    /// Link the best hardware sink back into the recording target
    pub async fn restore_default(&self) -> Result<RoutingOutcome> {
        info!("{} Reconnecting default sink", "SINK_RESTORE".bright_magenta());

        let snapshot = self.reader.read_fresh().await?;
        let target = self.resolve_target(&snapshot)?;

        let Some(sink) = select_restore_sink(&snapshot, self.preferred_sink.as_deref()) else {
            warn!("{} No audio sink found", "SINK_RESTORE_FAILED".bright_yellow());
            return Ok(RoutingOutcome {
                ok: false,
                summary: "No audio sink found in system".to_string(),
                removed: 0,
                connected: 0,
                failed: vec!["no sink".to_string()],
            });
        };
        info!("Using sink: {} (node {}, {:?})", sink.name, sink.node_id, sink.tier);

        let connection = pair_ports(&snapshot, sink.node_id, target, LinkFlags::restored_sink());
        if connection.problem.is_some() {
            return Ok(RoutingOutcome {
                ok: false,
                summary: "Could not find audio ports for sink or recording target".to_string(),
                removed: 0,
                connected: 0,
                failed: connection.problem.into_iter().collect(),
            });
        }

        let mut linked = 0;
        let mut failed = Vec::new();
        for request in &connection.channels {
            let exists = snapshot.links().iter().any(|link| {
                link.source_port_id == request.source_port_id && link.target_port_id == request.target_port_id
            });
            if exists {
                crate::route_debug!("  Sink link {} → {} already present", request.source_port_id, request.target_port_id);
                linked += 1;
                continue;
            }
            let outcome = self.executor.create_link(request).await;
            if outcome.is_success() {
                linked += 1;
            } else {
                failed.push(format!("{:?}", outcome));
            }
        }
        self.reader.invalidate().await;

        if linked == 0 {
            error!("{} No sink links were created", "SINK_RESTORE_FAILED".bright_red());
            return Ok(RoutingOutcome {
                ok: false,
                summary: "Failed to create sink links".to_string(),
                removed: 0,
                connected: 0,
                failed,
            });
        }

        self.set_state(RoutingState::Unrouted).await;
        let summary = format!("Sink reconnected: {} ({} channel(s))", sink.name, linked);
        info!("{} {}", "SINK_RESTORED".bright_green(), summary);
        Ok(RoutingOutcome {
            ok: true,
            summary,
            removed: 0,
            connected: linked,
            failed,
        })
    }
}

impl std::fmt::Debug for RoutingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingController")
            .field("target_application", &self.config.target_application)
            .field("executor", &self.executor)
            .finish()
    }
}
