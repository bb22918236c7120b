use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use ihpp_control::{ControlError, ExportError};
use ihpp_db::{HistoryQuery, StoreError};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::models::*;
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl ToString, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: Some(code.to_string()),
        }),
    )
}

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(_) => api_error(StatusCode::NOT_FOUND, &e, "CONFIG_NOT_FOUND"),
        StoreError::Persistence(_) => {
            error!("Store error: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, &e, "PERSISTENCE_ERROR")
        }
    }
}

/// List every configuration ever registered
#[utoipa::path(
    get,
    path = "/api/configs/history",
    params(HistoryParams),
    responses(
        (status = 200, description = "Configuration history, newest first", body = Vec<ConfigRow>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "configs"
)]
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ConfigRow>>, ApiError> {
    debug!("Listing config history: {:?}", params);

    let rows = state
        .store
        .list_history(&HistoryQuery {
            search: params.q,
            limit: params.limit,
        })
        .await
        .map_err(store_error)?;

    Ok(Json(rows.into_iter().map(ConfigRow::from).collect()))
}

/// List the currently selected configurations
#[utoipa::path(
    get,
    path = "/api/configs",
    responses(
        (status = 200, description = "Selected configurations", body = Vec<ActiveConfig>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "configs"
)]
pub async fn list_configs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ActiveConfig>>, ApiError> {
    debug!("Listing selected configs");

    let mut configs = Vec::new();

    for id in state.registry.selected_ids().await {
        let Some(row) = state.store.find_by_id(&id).await.map_err(store_error)? else {
            warn!(config_id = %id, "Selected config has no stored row, skipping");
            continue;
        };

        configs.push(ActiveConfig {
            is_proxyserver_active: state.registry.is_active(&id).await,
            id,
            config_row: row.into(),
        });
    }

    Ok(Json(configs))
}

/// Get a configuration by ID
#[utoipa::path(
    get,
    path = "/api/configs/{id}",
    params(
        ("id" = String, Path, description = "Config ID")
    ),
    responses(
        (status = 200, description = "Configuration", body = ConfigRow),
        (status = 404, description = "Config not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "configs"
)]
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ConfigRow>, ApiError> {
    debug!("Getting config: {}", id);

    let row = state.store.get_by_id(&id).await.map_err(store_error)?;

    Ok(Json(row.into()))
}

/// List the sessions captured under a configuration
#[utoipa::path(
    get,
    path = "/api/configs/{id}/sessions",
    params(
        ("id" = String, Path, description = "Config ID")
    ),
    responses(
        (status = 200, description = "Sessions in creation order", body = Vec<Session>),
        (status = 404, description = "Config not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "configs"
)]
pub async fn list_config_sessions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Session>>, ApiError> {
    debug!("Listing sessions for config: {}", id);

    state.store.get_by_id(&id).await.map_err(store_error)?;

    let sessions = state.store.list_sessions(&id).await.map_err(store_error)?;

    Ok(Json(sessions.into_iter().map(Session::from).collect()))
}

/// Delete a configuration and its sessions
///
/// Refused while a proxy server for the configuration is serving. Deleting
/// an unknown ID succeeds.
#[utoipa::path(
    delete,
    path = "/api/configs/{id}",
    params(
        ("id" = String, Path, description = "Config ID")
    ),
    responses(
        (status = 200, description = "Config deleted (or did not exist)", body = DeleteConfigResponse),
        (status = 409, description = "Config is active", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "configs"
)]
pub async fn delete_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteConfigResponse>, ApiError> {
    info!("Deleting config: {}", id);

    let guard = match state.registry.lock_inactive(&id).await {
        Ok(guard) => guard,
        Err(ControlError::Conflict(_)) => {
            return Err(api_error(
                StatusCode::CONFLICT,
                format!("Config '{}' is active; stop its proxy server first", id),
                "CONFIG_ACTIVE",
            ));
        }
        Err(e) => {
            return Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                e,
                "INTERNAL_ERROR",
            ))
        }
    };

    let deleted = state.store.delete_by_id(&id).await.map_err(store_error)?;
    drop(guard);

    state.registry.remove_selected(&id).await;

    Ok(Json(DeleteConfigResponse { id, deleted }))
}

/// Write the selected, serving proxies into the config file
#[utoipa::path(
    post,
    path = "/api/proxyserver/export",
    responses(
        (status = 200, description = "Config file updated", body = ExportResponse),
        (status = 400, description = "No config file in use", body = ErrorResponse),
        (status = 500, description = "Config file could not be updated", body = ErrorResponse)
    ),
    tag = "proxyserver"
)]
pub async fn export_proxies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ExportResponse>, ApiError> {
    info!("Exporting active proxies to config file");

    let outcome = state
        .exporter
        .export_active_proxies()
        .await
        .map_err(|e| match e {
            ExportError::NoConfigFile => api_error(StatusCode::BAD_REQUEST, e, "NO_CONFIG_FILE"),
            _ => {
                error!("Export failed: {}", e);
                api_error(StatusCode::INTERNAL_SERVER_ERROR, e, "CONFIG_FILE_ERROR")
            }
        })?;

    Ok(Json(ExportResponse {
        config_file: outcome.config_file.display().to_string(),
        proxies: outcome.proxies.into_iter().map(ProxySettings::from).collect(),
    }))
}

/// Current system configuration
#[utoipa::path(
    get,
    path = "/api/sysconfig",
    responses(
        (status = 200, description = "System configuration", body = SysConfigResponse)
    ),
    tag = "system"
)]
pub async fn get_sysconfig(State(state): State<Arc<AppState>>) -> Json<SysConfigResponse> {
    Json(state.sys_config.get().into())
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
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_proxies: state.registry.serving_count().await,
    })
}
