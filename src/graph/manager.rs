// Graph manager capability and PipeWire transport
//
// The routing core talks to the audio daemon only through the narrow
// `GraphManager` trait (query + mutate). `PwCliManager` implements it by
// running the `pw-dump` and `pw-cli` tools. Timeouts are applied by the
// callers through `with_watchdog`, which abandons a hung call and reports
// `RoutingError::Timeout`.

use async_trait::async_trait;
use colored::Colorize;
use regex::Regex;
use std::collections::BTreeMap;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use sysinfo::System;
use tokio::process::Command;
use tracing::{error, warn};

use super::types::{Link, LinkRequest, ObjectId, Result, RoutingError};

/// Query and mutation interface of the external audio graph manager
#[async_trait]
pub trait GraphManager: Send + Sync {
    /// Complete object dump as a JSON array
    async fn dump(&self) -> Result<String>;

    /// Structured list of link objects
    async fn list_links(&self) -> Result<Vec<Link>>;

    /// Properties of a single object
    async fn object_info(&self, id: ObjectId) -> Result<BTreeMap<String, String>>;

    async fn create_link(&self, request: &LinkRequest) -> Result<()>;

    /// Fails with `RoutingError::NotFound` when the link is already gone
    async fn destroy_link(&self, link_id: ObjectId) -> Result<()>;
}

/// Run a graph-manager call under a deadline
///
/// The call is abandoned on expiry. It may still take effect in the daemon;
/// the next snapshot shows the real outcome.
pub async fn with_watchdog<T>(
    operation: &str,
    limit: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            error!(
                "{} {} exceeded {:?}",
                "GRAPH_TIMEOUT".bright_red(),
                operation,
                limit
            );
            Err(RoutingError::Timeout {
                operation: operation.to_string(),
                after: limit,
            })
        }
    }
}

const PW_DUMP: &str = "pw-dump";
const PW_CLI: &str = "pw-cli";
const DAEMON_PROCESS: &str = "pipewire";

/// PipeWire through its command-line tools
#[derive(Debug, Clone)]
pub struct PwCliManager {
    dump_binary: String,
    cli_binary: String,
}

impl PwCliManager {
    pub fn new() -> Self {
        Self {
            dump_binary: PW_DUMP.to_string(),
            cli_binary: PW_CLI.to_string(),
        }
    }

    /// Use non-default tool paths
    pub fn with_binaries(dump_binary: impl Into<String>, cli_binary: impl Into<String>) -> Self {
        Self {
            dump_binary: dump_binary.into(),
            cli_binary: cli_binary.into(),
        }
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<String> {
        crate::route_debug!("Running: {} {}", program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    error!(
                        "{} {} not found! Is PipeWire installed?",
                        "PW_TOOL_MISSING".bright_red(),
                        program
                    );
                    RoutingError::Unavailable(format!("{} not installed", program))
                } else {
                    RoutingError::Unavailable(format!("failed to run {}: {}", program, e))
                }
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        crate::route_debug!(
            "  Returned: code={:?} stdout={}B stderr={}",
            output.status.code(),
            stdout.len(),
            stderr
        );

        if output.status.success() {
            return Ok(stdout);
        }

        if !daemon_running() {
            return Err(RoutingError::Unavailable(
                "PipeWire daemon not running".to_string(),
            ));
        }

        let reason = if stderr.is_empty() {
            format!("exit code {:?}", output.status.code())
        } else {
            stderr
        };
        Err(RoutingError::Rejected(reason))
    }
}

impl Default for PwCliManager {
    fn default() -> Self {
        Self::new()
    }
}

fn daemon_running() -> bool {
    let mut system = System::new();
    system.refresh_processes();
    system
        .processes()
        .values()
        .any(|process| process.name() == DAEMON_PROCESS)
}

fn is_missing_object(reason: &str) -> bool {
    let lower = reason.to_lowercase();
    ["no such", "not found", "unknown global", "does not exist"]
        .iter()
        .any(|marker| lower.contains(marker))
}

#[async_trait]
impl GraphManager for PwCliManager {
    async fn dump(&self) -> Result<String> {
        self.run(&self.dump_binary, &[]).await
    }

    async fn list_links(&self) -> Result<Vec<Link>> {
        let args = ["list-objects".to_string(), "Link".to_string()];
        let text = self.run(&self.cli_binary, &args).await?;
        Ok(parse_link_listing(&text))
    }

    async fn object_info(&self, id: ObjectId) -> Result<BTreeMap<String, String>> {
        let args = ["info".to_string(), id.to_string()];
        match self.run(&self.cli_binary, &args).await {
            Ok(text) => Ok(parse_info_properties(&text)),
            Err(RoutingError::Rejected(reason)) if is_missing_object(&reason) => {
                Err(RoutingError::NotFound { id })
            }
            Err(e) => Err(e),
        }
    }

    async fn create_link(&self, request: &LinkRequest) -> Result<()> {
        let args = [
            "create-link".to_string(),
            request.source_node_id.to_string(),
            request.source_port_id.to_string(),
            request.target_node_id.to_string(),
            request.target_port_id.to_string(),
            request.flags.to_property_block(),
        ];
        self.run(&self.cli_binary, &args).await.map(|_| ())
    }

    async fn destroy_link(&self, link_id: ObjectId) -> Result<()> {
        let args = ["destroy".to_string(), link_id.to_string()];
        match self.run(&self.cli_binary, &args).await {
            Ok(_) => Ok(()),
            Err(RoutingError::Rejected(reason)) if is_missing_object(&reason) => {
                warn!(
                    "{} Link {} already gone",
                    "LINK_ALREADY_GONE".bright_yellow(),
                    link_id
                );
                Err(RoutingError::NotFound { id: link_id })
            }
            Err(e) => Err(e),
        }
    }
}

/// Parse the text form of `pw-cli list-objects Link`
///
/// Each object starts with an `id N` header line and carries
/// `link.output.node`, `link.output.port`, `link.input.node` and
/// `link.input.port` properties. Incomplete objects are skipped.
pub fn parse_link_listing(text: &str) -> Vec<Link> {
    let id_re = Regex::new(r"^\s*id\s+(\d+)").ok();
    let prop_re = Regex::new(r#"link\.(output|input)\.(node|port)\s*=\s*"?(\d+)"?"#).ok();
    let (Some(id_re), Some(prop_re)) = (id_re, prop_re) else {
        return Vec::new();
    };

    #[derive(Default)]
    struct Partial {
        id: Option<ObjectId>,
        output_node: Option<ObjectId>,
        output_port: Option<ObjectId>,
        input_node: Option<ObjectId>,
        input_port: Option<ObjectId>,
    }

    impl Partial {
        fn finish(self) -> Option<Link> {
            Some(Link {
                id: self.id?,
                source_node_id: self.output_node?,
                source_port_id: self.output_port?,
                target_node_id: self.input_node?,
                target_port_id: self.input_port?,
            })
        }
    }

    let mut links = Vec::new();
    let mut current = Partial::default();

    for line in text.lines() {
        if let Some(caps) = id_re.captures(line) {
            if let Some(link) = std::mem::take(&mut current).finish() {
                links.push(link);
            }
            current.id = caps[1].parse().ok();
            continue;
        }
        if let Some(caps) = prop_re.captures(line) {
            let value = caps[3].parse().ok();
            match (&caps[1], &caps[2]) {
                ("output", "node") => current.output_node = value,
                ("output", "port") => current.output_port = value,
                ("input", "node") => current.input_node = value,
                ("input", "port") => current.input_port = value,
                _ => {}
            }
        }
    }
    if let Some(link) = current.finish() {
        links.push(link);
    }
    links
}

/// Parse `key = value` lines from `pw-cli info`
pub fn parse_info_properties(text: &str) -> BTreeMap<String, String> {
    let Ok(re) = Regex::new(r#"^\s*\*?\s*([\w.\-]+)\s*=\s*"?([^"]*)"?\s*$"#) else {
        return BTreeMap::new();
    };
    text.lines()
        .filter_map(|line| re.captures(line))
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}
