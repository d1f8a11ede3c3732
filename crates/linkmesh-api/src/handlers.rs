use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use linkmesh_core::{
    DiagnosticKind, DiagnosticRequest, OrchestratorError, RegistryError, TunnelSpec,
    TunnelType as CoreTunnelType,
};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::models::*;
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_body(status: StatusCode, error: String, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error,
            code: Some(code.to_string()),
        }),
    )
}

/// HTTP status for an orchestration failure
pub fn status_for(err: &OrchestratorError) -> StatusCode {
    match err {
        OrchestratorError::NodeNotFound(_)
        | OrchestratorError::TunnelNotFound(_)
        | OrchestratorError::Registry(RegistryError::NotFound(_)) => StatusCode::NOT_FOUND,
        OrchestratorError::UnsupportedTunnelType(_)
        | OrchestratorError::UnsupportedDiagnostic(_)
        | OrchestratorError::InvalidTunnelSpec(_)
        | OrchestratorError::InvalidNode(_)
        | OrchestratorError::NodeUnreachable(_)
        | OrchestratorError::DiagnosticTargetRequired(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::Registry(RegistryError::Conflict(_)) => StatusCode::CONFLICT,
        OrchestratorError::TunnelProvisioningFailed { .. }
        | OrchestratorError::DiagnosticExecutionFailed(_)
        | OrchestratorError::Registry(RegistryError::Backend(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn orchestration_error(err: OrchestratorError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        warn!("Request rejected: {}", err);
    }
    error_body(status, err.to_string(), err.code())
}

fn parse_overlay_ip(field: &str, value: &str) -> Result<IpAddr, ApiError> {
    value.trim().parse().map_err(|_| {
        error_body(
            StatusCode::BAD_REQUEST,
            format!("{} '{}' is not a valid IP address", field, value),
            "INVALID_TUNNEL_SPEC",
        )
    })
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List all nodes, newest first
#[utoipa::path(
    get,
    path = "/api/nodes",
    responses(
        (status = 200, description = "List of nodes", body = NodeList),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "nodes"
)]
pub async fn list_nodes(State(state): State<Arc<AppState>>) -> Result<Json<NodeList>, ApiError> {
    debug!("Listing nodes");

    let nodes: Vec<Node> = state
        .orchestrator
        .list_nodes()
        .await
        .map_err(orchestration_error)?
        .into_iter()
        .map(Node::from)
        .collect();
    let total = nodes.len();

    Ok(Json(NodeList { nodes, total }))
}

/// Admit a node after a successful SSH probe
#[utoipa::path(
    post,
    path = "/api/nodes",
    request_body = CreateNodeRequest,
    responses(
        (status = 201, description = "Node admitted", body = Node),
        (status = 400, description = "Invalid request or SSH probe failed", body = ErrorResponse),
        (status = 409, description = "Address and port already registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "nodes"
)]
pub async fn create_node(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateNodeRequest>,
) -> Result<(StatusCode, Json<Node>), ApiError> {
    info!("Admitting node {} at {}:{}", req.name, req.address, req.port);

    let node = req
        .into_new_node()
        .map_err(|msg| error_body(StatusCode::BAD_REQUEST, msg, "INVALID_NODE"))?;

    let summary = state
        .orchestrator
        .add_node(node)
        .await
        .map_err(orchestration_error)?;

    Ok((StatusCode::CREATED, Json(summary.into())))
}

/// Delete a node, tearing down every tunnel that touches it
#[utoipa::path(
    delete,
    path = "/api/nodes/{id}",
    params(
        ("id" = String, Path, description = "Node ID")
    ),
    responses(
        (status = 204, description = "Node deleted"),
        (status = 404, description = "Node not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "nodes"
)]
pub async fn delete_node(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    info!("Deleting node: {}", id);

    state
        .orchestrator
        .remove_node(&id)
        .await
        .map_err(orchestration_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// List all tunnels with their endpoints, newest first
#[utoipa::path(
    get,
    path = "/api/tunnels",
    responses(
        (status = 200, description = "List of tunnels", body = TunnelList),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "tunnels"
)]
pub async fn list_tunnels(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TunnelList>, ApiError> {
    debug!("Listing tunnels");

    let tunnels: Vec<TunnelInfo> = state
        .orchestrator
        .list_tunnels()
        .await
        .map_err(orchestration_error)?
        .into_iter()
        .map(TunnelInfo::from)
        .collect();
    let total = tunnels.len();

    Ok(Json(TunnelList { tunnels, total }))
}

/// Provision a tunnel on both nodes
#[utoipa::path(
    post,
    path = "/api/tunnels",
    request_body = CreateTunnelRequest,
    responses(
        (status = 201, description = "Tunnel provisioned", body = TunnelInfo),
        (status = 400, description = "Invalid tunnel configuration", body = ErrorResponse),
        (status = 404, description = "Node not found", body = ErrorResponse),
        (status = 500, description = "Provisioning failed on a node", body = ErrorResponse)
    ),
    tag = "tunnels"
)]
pub async fn create_tunnel(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTunnelRequest>,
) -> Result<(StatusCode, Json<TunnelInfo>), ApiError> {
    info!(
        "Creating {} tunnel between {} and {}",
        req.tunnel_type, req.local_node_id, req.remote_node_id
    );

    let tunnel_type: CoreTunnelType = req.tunnel_type.parse().map_err(orchestration_error)?;
    let spec = TunnelSpec {
        name: req.name,
        tunnel_type,
        local_node_id: req.local_node_id,
        remote_node_id: req.remote_node_id,
        local_ip: parse_overlay_ip("local_ip", &req.local_ip)?,
        remote_ip: parse_overlay_ip("remote_ip", &req.remote_ip)?,
    };

    let tunnel = state
        .orchestrator
        .create_tunnel(spec)
        .await
        .map_err(orchestration_error)?;

    Ok((StatusCode::CREATED, Json(tunnel.into())))
}

/// Delete a tunnel; remote cleanup is best effort
#[utoipa::path(
    delete,
    path = "/api/tunnels/{id}",
    params(
        ("id" = String, Path, description = "Tunnel ID")
    ),
    responses(
        (status = 204, description = "Tunnel deleted successfully"),
        (status = 404, description = "Tunnel not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "tunnels"
)]
pub async fn delete_tunnel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    info!("Deleting tunnel: {}", id);

    state
        .orchestrator
        .delete_tunnel(&id)
        .await
        .map_err(orchestration_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Run a ping or throughput diagnostic from a node
#[utoipa::path(
    post,
    path = "/api/tests",
    request_body = RunTestRequest,
    responses(
        (status = 200, description = "Diagnostic output", body = TestResult),
        (status = 400, description = "Unsupported test or missing target", body = ErrorResponse),
        (status = 404, description = "Node not found", body = ErrorResponse),
        (status = 500, description = "Diagnostic command failed", body = ErrorResponse)
    ),
    tag = "diagnostics"
)]
pub async fn run_test(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunTestRequest>,
) -> Result<Json<TestResult>, ApiError> {
    info!("Running {} test from {}", req.test_type, req.source_node_id);

    if req.source_node_id.is_empty() {
        return Err(error_body(
            StatusCode::BAD_REQUEST,
            "source_node_id is required".to_string(),
            "INVALID_REQUEST",
        ));
    }

    let kind: DiagnosticKind = req.test_type.parse().map_err(orchestration_error)?;
    let report = state
        .orchestrator
        .run_diagnostic(DiagnosticRequest {
            kind,
            source_node_id: req.source_node_id,
            target_node_id: req.target_node_id,
        })
        .await
        .map_err(orchestration_error)?;

    Ok(Json(report.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkmesh_core::TunnelType;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&OrchestratorError::NodeNotFound("n".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&OrchestratorError::NodeUnreachable("n:22".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&OrchestratorError::DiagnosticTargetRequired(
                DiagnosticKind::Throughput
            )),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&RegistryError::Conflict("dup".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&OrchestratorError::TunnelProvisioningFailed {
                tunnel_type: TunnelType::Gre,
                detail: "remote side failed".into(),
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
