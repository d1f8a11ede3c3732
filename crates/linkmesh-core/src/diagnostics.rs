//! Ad hoc reachability and throughput checks between nodes
//!
//! Diagnostics never touch the registry beyond resolving nodes. Throughput
//! runs as two phases: a best-effort listener setup on the target whose
//! outcome is reported but never fatal, then the required client
//! measurement on the source.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::OrchestratorError;
use crate::model::Node;
use crate::orchestrator::Orchestrator;

/// Which diagnostic to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Ping,
    Throughput,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Ping => "ping",
            DiagnosticKind::Throughput => "throughput",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagnosticKind {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ping" => Ok(DiagnosticKind::Ping),
            // The tool name is accepted as an alias
            "throughput" | "iperf3" => Ok(DiagnosticKind::Throughput),
            other => Err(OrchestratorError::UnsupportedDiagnostic(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiagnosticsConfig {
    /// Echo requests sent by a ping diagnostic
    pub ping_count: u32,
    /// Ping destination when no target node is given
    pub fallback_ping_target: String,
    /// Duration of the throughput client run
    pub throughput_seconds: u32,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            ping_count: 4,
            fallback_ping_target: "1.1.1.1".to_string(),
            throughput_seconds: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiagnosticRequest {
    pub kind: DiagnosticKind,
    pub source_node_id: String,
    pub target_node_id: Option<String>,
}

/// How the best-effort setup phase went
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SetupOutcome {
    Started { output: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub kind: DiagnosticKind,
    /// Output of the required phase
    pub output: String,
    /// Present for two-phase diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<SetupOutcome>,
}

/// Commands of the two-phase throughput diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThroughputPhases {
    /// Runs on the target; allowed to fail
    pub setup: String,
    /// Runs on the source; its output is the result
    pub measurement: String,
}

impl ThroughputPhases {
    pub fn new(target_address: &str, seconds: u32) -> Self {
        Self {
            setup: "iperf3 -s -D || true".to_string(),
            measurement: format!("iperf3 -c {} -t {}", target_address, seconds),
        }
    }
}

pub fn ping_command(count: u32, destination: &str) -> String {
    format!("ping -c {} {}", count, destination)
}

impl Orchestrator {
    /// Run one diagnostic; no retries
    pub async fn run_diagnostic(
        &self,
        request: DiagnosticRequest,
    ) -> Result<DiagnosticReport, OrchestratorError> {
        let source = self.require_node(&request.source_node_id).await?;
        let target = match request.target_node_id.as_deref() {
            Some(id) if !id.is_empty() => Some(self.require_node(id).await?),
            _ => None,
        };

        match request.kind {
            DiagnosticKind::Ping => self.run_ping(&source, target.as_ref()).await,
            DiagnosticKind::Throughput => {
                let target = target
                    .ok_or(OrchestratorError::DiagnosticTargetRequired(request.kind))?;
                self.run_throughput(&source, &target).await
            }
        }
    }

    async fn run_ping(
        &self,
        source: &Node,
        target: Option<&Node>,
    ) -> Result<DiagnosticReport, OrchestratorError> {
        let config = &self.config.diagnostics;
        let destination = target
            .map(|node| node.address.as_str())
            .unwrap_or(config.fallback_ping_target.as_str());
        let command = ping_command(config.ping_count, destination);

        info!(source_node_id = %source.id, destination = %destination, "Running ping diagnostic");

        let output = self
            .shell
            .execute(&self.target_for(source), &command)
            .await
            .map_err(|e| {
                OrchestratorError::DiagnosticExecutionFailed(format!(
                    "ping on {} failed: {}",
                    source.name, e
                ))
            })?;

        Ok(DiagnosticReport {
            kind: DiagnosticKind::Ping,
            output,
            setup: None,
        })
    }

    async fn run_throughput(
        &self,
        source: &Node,
        target: &Node,
    ) -> Result<DiagnosticReport, OrchestratorError> {
        let phases =
            ThroughputPhases::new(&target.address, self.config.diagnostics.throughput_seconds);

        info!(
            source_node_id = %source.id,
            target_node_id = %target.id,
            "Running throughput diagnostic"
        );

        let setup = match self.shell.execute(&self.target_for(target), &phases.setup).await {
            Ok(output) => SetupOutcome::Started { output },
            Err(e) => {
                warn!(
                    target_node_id = %target.id,
                    "Throughput listener setup failed, measuring anyway: {}",
                    e
                );
                SetupOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        let output = self
            .shell
            .execute(&self.target_for(source), &phases.measurement)
            .await
            .map_err(|e| {
                OrchestratorError::DiagnosticExecutionFailed(format!(
                    "throughput client on {} failed: {}",
                    source.name, e
                ))
            })?;

        Ok(DiagnosticReport {
            kind: DiagnosticKind::Throughput,
            output,
            setup: Some(setup),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("ping".parse::<DiagnosticKind>().unwrap(), DiagnosticKind::Ping);
        assert_eq!(
            "throughput".parse::<DiagnosticKind>().unwrap(),
            DiagnosticKind::Throughput
        );
        assert_eq!(
            "iperf3".parse::<DiagnosticKind>().unwrap(),
            DiagnosticKind::Throughput
        );
        assert!(matches!(
            "traceroute".parse::<DiagnosticKind>(),
            Err(OrchestratorError::UnsupportedDiagnostic(_))
        ));
    }

    #[test]
    fn test_commands() {
        assert_eq!(ping_command(4, "1.1.1.1"), "ping -c 4 1.1.1.1");

        let phases = ThroughputPhases::new("10.9.9.9", 5);
        assert_eq!(phases.setup, "iperf3 -s -D || true");
        assert_eq!(phases.measurement, "iperf3 -c 10.9.9.9 -t 5");
    }
}
