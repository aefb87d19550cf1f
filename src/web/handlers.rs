//! Request handlers: thin translations between HTTP and the core.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use serde::Deserialize;
use wakehall_core::{AwakableDevice, FindOptions, ScanReport, registry};

use super::error::ApiResult;
use crate::state::AppState;

/// GET / - the embedded dashboard page.
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

/// GET /api/devices - every configured device with its computed liveness.
pub async fn list_devices(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<AwakableDevice>>> {
    let devices = registry::list_awakable(&state.registry).await?;
    Ok(Json(devices))
}

/// POST /api/devices/:id/wake - wake by registry id. With a dependency
/// configured, the response confirms the prerequisite's wake; the device's
/// own delayed wake fires after the response has gone out.
pub async fn wake_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<usize>,
) -> ApiResult<StatusCode> {
    registry::wake_by_id(&state.registry, id).await?;
    tracing::info!("wake triggered for device {id}");
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
pub struct ScanParams {
    /// CIDR block, dash range, or single address; local subnets if absent.
    #[serde(default)]
    pub target: Option<String>,
    /// Skip hostname resolution in the ARP listing.
    #[serde(default)]
    pub numeric: bool,
}

/// GET /api/scan - sweep the local network for observed devices.
pub async fn scan(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScanParams>,
) -> ApiResult<Json<ScanReport>> {
    let report = state
        .scanner
        .find(FindOptions {
            address: params.target.unwrap_or_default(),
            skip_name_resolution: params.numeric,
            arp_tool: None,
        })
        .await?;
    Ok(Json(report))
}
