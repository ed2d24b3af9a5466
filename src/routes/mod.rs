//! HTTP routes for wicket

pub mod collections;
pub mod documents;
pub mod health;

pub use collections::{handle_create, handle_delete};
pub use documents::{
    handle_aggregate, handle_find, handle_find_by_id_and_delete, handle_find_by_id_and_update,
    handle_insert, handle_insert_many,
};
pub use health::{health_check, version_info};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, warn};

use crate::types::{GatewayError, Result};

/// Query-string keys that carry URL-encoded JSON on GET requests
const JSON_QUERY_KEYS: &[&str] = &["filter", "sort", "pipeline"];

/// Build a JSON response with permissive CORS headers
pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

/// Convert a gateway error into its response envelope
pub(crate) fn error_response(err: GatewayError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    let message = err.to_string();

    if status.is_server_error() {
        error!(status = %status, "{}", message);
    } else {
        warn!(status = %status, "{}", message);
    }

    json_response(status, &serde_json::json!({ "error": message }))
}

/// Extract the operation parameters from a request.
///
/// GET requests carry them as query parameters (`filter`, `sort` and
/// `pipeline` URL-encoded JSON); every other method carries a JSON object
/// body. An absent body resolves to an empty object so that the guard
/// layer reports the missing collection, not a parse failure.
pub(crate) async fn request_params(req: Request<Incoming>) -> Result<Value> {
    if req.method() == Method::GET {
        return params_from_query(req.uri().query());
    }

    let body = req.collect().await?.to_bytes();
    if body.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let params: Value = serde_json::from_slice(&body)?;
    if !params.is_object() {
        return Err(GatewayError::BadRequest(
            "Request body must be a JSON object".to_string(),
        ));
    }

    Ok(params)
}

fn params_from_query(query: Option<&str>) -> Result<Value> {
    let mut params = Map::new();

    if let Some(q) = query {
        for pair in q.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = urlencoding::decode(value).unwrap_or_default().to_string();

            if JSON_QUERY_KEYS.contains(&key) {
                let parsed: Value = serde_json::from_str(&value).map_err(|e| {
                    GatewayError::BadRequest(format!("Invalid JSON in '{}': {}", key, e))
                })?;
                params.insert(key.to_string(), parsed);
            } else {
                params.insert(key.to_string(), Value::String(value));
            }
        }
    }

    Ok(Value::Object(params))
}
