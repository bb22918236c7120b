//! REST API over configuration history, active configs and their sessions

pub mod handlers;
pub mod models;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use ihpp_control::{ActiveRegistry, ConfigExporter, SysConfigHandle};
use ihpp_db::ConfigStore;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across handlers
pub struct AppState {
    pub store: ConfigStore,
    pub registry: Arc<ActiveRegistry>,
    pub exporter: Arc<ConfigExporter>,
    pub sys_config: SysConfigHandle,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Inspect HTTP Proxy API",
        version = "0.1.0",
        description = "REST API for proxy configuration history and sessions"
    ),
    paths(
        handlers::list_history,
        handlers::list_configs,
        handlers::get_config,
        handlers::list_config_sessions,
        handlers::delete_config,
        handlers::export_proxies,
        handlers::get_sysconfig,
        handlers::health_check,
    ),
    components(
        schemas(
            models::ProxySettings,
            models::ConfigRow,
            models::ActiveConfig,
            models::Session,
            models::DeleteConfigResponse,
            models::ExportResponse,
            models::SysConfigResponse,
            models::HealthResponse,
            models::ErrorResponse,
        )
    ),
    tags(
        (name = "configs", description = "Configuration history and lifecycle endpoints"),
        (name = "proxyserver", description = "Proxy server config file endpoints"),
        (name = "system", description = "System health and info endpoints")
    )
)]
struct ApiDoc;

/// API server configuration
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Enable CORS for local development origins
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 20000)),
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
    /// Create a new API server
    pub fn new(
        config: ApiServerConfig,
        store: ConfigStore,
        registry: Arc<ActiveRegistry>,
        sys_config: SysConfigHandle,
    ) -> Self {
        let exporter = Arc::new(ConfigExporter::new(registry.clone(), sys_config.clone()));

        let state = Arc::new(AppState {
            store,
            registry,
            exporter,
            sys_config,
        });

        Self { config, state }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let api_router = Router::new()
            .route("/api/health", get(handlers::health_check))
            .route("/api/sysconfig", get(handlers::get_sysconfig))
            .route("/api/configs", get(handlers::list_configs))
            .route("/api/configs/history", get(handlers::list_history))
            .route(
                "/api/configs/{id}",
                get(handlers::get_config).delete(handlers::delete_config),
            )
            .route(
                "/api/configs/{id}/sessions",
                get(handlers::list_config_sessions),
            )
            .route("/api/proxyserver/export", post(handlers::export_proxies))
            .with_state(self.state.clone());

        // SwaggerUi serves /api/openapi.json itself
        let router = Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
            .merge(api_router);

        let mut router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            use tower_http::cors::AllowOrigin;

            let cors = CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE])
                .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                }));
            router = router.layer(cors);
        }

        router
    }

    /// Start the API server
    pub async fn start(self) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        info!("Starting API server on {}", self.config.bind_addr);
        info!("Swagger UI: http://{}/swagger-ui", self.config.bind_addr);

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        axum::serve(listener, router)
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }
}
