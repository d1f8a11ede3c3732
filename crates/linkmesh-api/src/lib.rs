//! REST API over the tunnel orchestrator

pub mod handlers;
pub mod models;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use linkmesh_core::Orchestrator;

/// Application state shared across handlers
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Linkmesh API",
        version = "0.1.0",
        description = "REST API for provisioning GRE and VXLAN links between SSH-managed hosts",
        contact(
            name = "Linkmesh Team",
            email = "team@linkmesh.dev"
        )
    ),
    paths(
        handlers::health_check,
        handlers::list_nodes,
        handlers::create_node,
        handlers::delete_node,
        handlers::list_tunnels,
        handlers::create_tunnel,
        handlers::delete_tunnel,
        handlers::run_test,
    ),
    components(
        schemas(
            models::TunnelType,
            models::Node,
            models::NodeList,
            models::CreateNodeRequest,
            models::TunnelInfo,
            models::TunnelList,
            models::CreateTunnelRequest,
            models::RunTestRequest,
            models::ListenerSetup,
            models::TestResult,
            models::HealthResponse,
            models::ErrorResponse,
        )
    ),
    tags(
        (name = "nodes", description = "Node admission and removal"),
        (name = "tunnels", description = "Tunnel provisioning and teardown"),
        (name = "diagnostics", description = "Ping and throughput tests"),
        (name = "system", description = "System health and info endpoints")
    )
)]
struct ApiDoc;

/// API server configuration
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Allow browser requests from localhost origins (for development)
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            enable_cors: true,
        }
    }
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, orchestrator: Arc<Orchestrator>) -> Self {
        let state = Arc::new(AppState { orchestrator });
        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let api_doc = ApiDoc::openapi();

        let api_router = Router::new()
            .route("/api/health", get(handlers::health_check))
            .route(
                "/api/nodes",
                get(handlers::list_nodes).post(handlers::create_node),
            )
            .route("/api/nodes/{id}", delete(handlers::delete_node))
            .route(
                "/api/tunnels",
                get(handlers::list_tunnels).post(handlers::create_tunnel),
            )
            .route("/api/tunnels/{id}", delete(handlers::delete_tunnel))
            .route("/api/tests", post(handlers::run_test))
            .with_state(self.state.clone());

        // SwaggerUi also serves /api/openapi.json
        let mut router = Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", api_doc))
            .merge(api_router)
            .layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            use tower_http::cors::AllowOrigin;

            let cors = CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE])
                .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                        || origin_str.starts_with("https://localhost:")
                        || origin_str.starts_with("https://127.0.0.1:")
                }));
            router = router.layer(cors);
        }

        router
    }

    /// Start the API server
    pub async fn start(self) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        info!("Starting API server on {}", self.config.bind_addr);
        info!(
            "OpenAPI spec: http://{}/api/openapi.json",
            self.config.bind_addr
        );
        info!("Swagger UI: http://{}/swagger-ui", self.config.bind_addr);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        axum::serve(listener, router)
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }
}

/// Convenience function to create and start an API server
pub async fn run_api_server(
    bind_addr: SocketAddr,
    orchestrator: Arc<Orchestrator>,
) -> Result<(), anyhow::Error> {
    let config = ApiServerConfig {
        bind_addr,
        ..ApiServerConfig::default()
    };

    ApiServer::new(config, orchestrator).start().await
}
