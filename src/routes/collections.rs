//! Collection administration endpoints
//!
//! `POST /create` creates a collection, optionally with an index.
//! `DELETE /delete` drops a collection.

use bson::Document;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::auth;
use crate::db::IndexSpec;
use crate::routes::{error_response, json_response, request_params};
use crate::server::AppState;
use crate::types::{GatewayError, Result};

/// Handle `POST /create`
pub async fn handle_create(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    match create(req, state).await {
        Ok(response) => response,
        Err(err) => error_response(err),
    }
}

async fn create(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<Full<Bytes>>> {
    auth::authorize(req.headers(), &state.allowlist)?;

    let params = request_params(req).await?;
    let collection = auth::require_collection(&params)?.to_string();
    let index = parse_index(&params)?;

    state.mongo.create_collection(&collection, index).await?;
    info!(collection = %collection, "Collection created");

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "collection": collection }),
    ))
}

/// Handle `DELETE /delete`
pub async fn handle_delete(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    match delete(req, state).await {
        Ok(response) => response,
        Err(err) => error_response(err),
    }
}

async fn delete(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<Full<Bytes>>> {
    auth::authorize(req.headers(), &state.allowlist)?;

    let params = request_params(req).await?;
    let collection = auth::require_collection(&params)?.to_string();

    state.mongo.drop_collection(&collection).await?;
    info!(collection = %collection, "Collection dropped");

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "collection": collection }),
    ))
}

/// Parse the optional index definition from a create request
fn parse_index(params: &Value) -> Result<Option<IndexSpec>> {
    let Some(index) = params.get("index") else {
        return Ok(None);
    };

    if !index.is_object() {
        return Err(GatewayError::BadRequest(
            "'index' must be an object".to_string(),
        ));
    }

    let keys = index
        .get("keys")
        .filter(|v| v.is_object())
        .ok_or_else(|| GatewayError::BadRequest("'index.keys' must be an object".to_string()))?;
    let keys: Document = bson::to_document(keys)?;
    if keys.is_empty() {
        return Err(GatewayError::BadRequest(
            "'index.keys' must not be empty".to_string(),
        ));
    }

    let unique = index.get("unique").and_then(|v| v.as_bool()).unwrap_or(false);
    let name = index
        .get("name")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Ok(Some(IndexSpec { keys, unique, name }))
}
