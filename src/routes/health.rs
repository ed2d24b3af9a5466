//! Health and version endpoints
//!
//! `/health` reports liveness plus a database ping summary and, like every
//! data endpoint, requires a valid bearer token. `/version` is public and
//! returns build information for deployment verification.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::auth;
use crate::routes::{error_response, json_response};
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall health status (true if the gateway is running)
    pub healthy: bool,
    /// 'online' when the database answers pings, 'degraded' otherwise
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    /// Current timestamp
    pub timestamp: String,
    /// Node identifier
    pub node_id: String,
    /// Database connectivity details
    pub database: DatabaseHealth,
}

#[derive(Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub name: String,
}

/// Handle `GET /health`
pub async fn health_check(req: &Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    if let Err(err) = auth::authorize(req.headers(), &state.allowlist) {
        return error_response(err);
    }

    let connected = state.mongo.ping().await.is_ok();

    let response = HealthResponse {
        healthy: true,
        status: if connected { "online" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        node_id: state.args.node_id.to_string(),
        database: DatabaseHealth {
            connected,
            name: state.mongo.db_name().to_string(),
        },
    };

    // Liveness: 200 as long as the gateway itself is running
    json_response(StatusCode::OK, &response)
}

#[derive(Serialize)]
pub struct VersionResponse {
    /// Cargo package version
    pub version: &'static str,
    /// Git commit hash (short)
    pub commit: &'static str,
    /// Git commit hash (full)
    pub commit_full: &'static str,
    /// Build timestamp
    pub build_time: &'static str,
    /// Service name
    pub service: &'static str,
}

/// Handle `GET /version`
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "wicket",
    };

    json_response(StatusCode::OK, &response)
}
