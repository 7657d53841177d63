use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::state::RegistryState;

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    #[serde(rename = "serviceName")]
    service_name: String,
    #[serde(rename = "serviceAddr")]
    service_addr: String,
}

/// `POST /default_registry` — upserts `serviceName`'s endpoint, rewriting
/// the caller-supplied `serviceAddr` (a bare `:port` suffix) with the
/// request's observed source IP, matching spec.md §4.2/§6.
pub async fn register(
    State(state): State<RegistryState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Json(body): Json<RegisterBody>,
) -> StatusCode {
    let endpoint = format!("{}{}", remote.ip(), body.service_addr);
    info!(service = %body.service_name, endpoint = %endpoint, "heartbeat received");
    state.upsert(&body.service_name, endpoint).await;
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    #[serde(rename = "serviceName", default)]
    service_name: Option<String>,
}

/// `GET /default_registry?serviceName=X` — returns the alive endpoint list,
/// evicting stale entries inline. `400` when the query parameter is absent.
pub async fn lookup(
    State(state): State<RegistryState>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<Vec<String>>, StatusCode> {
    let service_name = query.service_name.ok_or(StatusCode::BAD_REQUEST)?;
    Ok(Json(state.alive_endpoints(&service_name).await))
}
