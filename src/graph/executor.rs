// Link executor
//
// Applies single create/destroy operations against the graph manager. Each
// call is one attempt under its own deadline; outcomes are reported, never
// retried here. Batches are best-effort and keep going after a failure.

use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::manager::{with_watchdog, GraphManager};
use super::planner::SourceConnection;
use super::types::{LinkRequest, ObjectId, RoutingError};

/// Result of one link operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    Destroyed,
    /// Destroy target did not exist; the desired end state holds
    AlreadyGone,
    Failed(String),
    TimedOut,
}

impl LinkOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            LinkOutcome::Created | LinkOutcome::Destroyed | LinkOutcome::AlreadyGone
        )
    }

    fn describe(&self) -> String {
        match self {
            LinkOutcome::Created => "created".to_string(),
            LinkOutcome::Destroyed => "destroyed".to_string(),
            LinkOutcome::AlreadyGone => "already gone".to_string(),
            LinkOutcome::Failed(reason) => reason.clone(),
            LinkOutcome::TimedOut => "timed out".to_string(),
        }
    }
}

/// Aggregate of a batch of destroys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub removed: usize,
    pub already_gone: usize,
    pub failed: Vec<(ObjectId, String)>,
}

impl RemovalReport {
    /// Links that no longer exist, whoever removed them
    pub fn cleared(&self) -> usize {
        self.removed + self.already_gone
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Partial,
    Failed,
}

/// Per-source result of creating its channel links
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceResult {
    pub source_node_id: ObjectId,
    pub requested: usize,
    pub created: usize,
    pub failures: Vec<String>,
}

impl SourceResult {
    pub fn status(&self) -> ConnectionStatus {
        if self.requested > 0 && self.created == self.requested {
            ConnectionStatus::Connected
        } else if self.created > 0 {
            ConnectionStatus::Partial
        } else {
            ConnectionStatus::Failed
        }
    }
}

/// Applies link operations with per-operation deadlines
pub struct LinkExecutor {
    manager: Arc<dyn GraphManager>,
    link_timeout: Duration,
    destroy_timeout: Duration,
}

impl LinkExecutor {
    pub fn new(manager: Arc<dyn GraphManager>, link_timeout: Duration, destroy_timeout: Duration) -> Self {
        Self {
            manager,
            link_timeout,
            destroy_timeout,
        }
    }

    pub async fn create_link(&self, request: &LinkRequest) -> LinkOutcome {
        crate::route_debug!(
            "    {}:{} → {}:{} {}",
            request.source_node_id,
            request.source_port_id,
            request.target_node_id,
            request.target_port_id,
            request.flags.to_property_block()
        );
        let call = self.manager.create_link(request);
        match with_watchdog("create-link", self.link_timeout, call).await {
            Ok(()) => LinkOutcome::Created,
            Err(RoutingError::Timeout { .. }) => LinkOutcome::TimedOut,
            Err(e) => LinkOutcome::Failed(e.to_string()),
        }
    }

    pub async fn destroy_link(&self, link_id: ObjectId) -> LinkOutcome {
        let call = self.manager.destroy_link(link_id);
        match with_watchdog("destroy", self.destroy_timeout, call).await {
            Ok(()) => LinkOutcome::Destroyed,
            Err(RoutingError::NotFound { .. }) => LinkOutcome::AlreadyGone,
            Err(RoutingError::Timeout { .. }) => LinkOutcome::TimedOut,
            Err(e) => LinkOutcome::Failed(e.to_string()),
        }
    }

    /// Destroy every link in order, continuing past failures
    pub async fn remove_links(&self, link_ids: &[ObjectId]) -> RemovalReport {
        let mut report = RemovalReport::default();
        for &link_id in link_ids {
            match self.destroy_link(link_id).await {
                LinkOutcome::Destroyed => {
                    crate::route_debug!("  ✓ Destroyed link {}", link_id);
                    report.removed += 1;
                }
                LinkOutcome::AlreadyGone => report.already_gone += 1,
                outcome => {
                    error!(
                        "{} Link {}: {}",
                        "LINK_DESTROY_FAILED".bright_red(),
                        link_id,
                        outcome.describe()
                    );
                    report.failed.push((link_id, outcome.describe()));
                }
            }
        }
        report
    }

    /// Create every planned channel of one source
    pub async fn connect_source(&self, connection: &SourceConnection) -> SourceResult {
        let mut result = SourceResult {
            source_node_id: connection.source_node_id,
            requested: connection.channels.len(),
            created: 0,
            failures: Vec::new(),
        };

        if let Some(problem) = &connection.problem {
            error!("{} {}", "SOURCE_NO_PORTS".bright_red(), problem);
            result.failures.push(problem.clone());
            return result;
        }

        for (channel, request) in connection.channels.iter().enumerate() {
            match self.create_link(request).await {
                LinkOutcome::Created => result.created += 1,
                outcome => {
                    warn!(
                        "{} Node {} channel {}: {}",
                        "LINK_CREATE_FAILED".bright_yellow(),
                        connection.source_node_id,
                        channel,
                        outcome.describe()
                    );
                    result.failures.push(format!(
                        "Node {} channel {}: {}",
                        connection.source_node_id,
                        channel,
                        outcome.describe()
                    ));
                }
            }
        }

        if result.status() == ConnectionStatus::Connected {
            info!(
                "{} Node {} ({} channel(s))",
                "SOURCE_CONNECTED".bright_green(),
                connection.source_node_id,
                result.created
            );
        }
        result
    }
}

impl std::fmt::Debug for LinkExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkExecutor")
            .field("link_timeout", &self.link_timeout)
            .field("destroy_timeout", &self.destroy_timeout)
            .finish()
    }
}
