//! Document endpoints
//!
//! One handler per data operation: paginated find, aggregation, inserts,
//! and the atomic find-by-id update/delete pair. All parameter coercion
//! (pagination bounds, `_id` normalization, `$set` wrapping) happens here,
//! before anything reaches the driver.

use bson::{oid::ObjectId, Bson, DateTime, Document};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::auth;
use crate::config::Args;
use crate::routes::{error_response, json_response, request_params};
use crate::server::AppState;
use crate::types::{GatewayError, Result};

/// Handle `GET|POST /find`
pub async fn handle_find(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    match find(req, state).await {
        Ok(response) => response,
        Err(err) => error_response(err),
    }
}

async fn find(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<Full<Bytes>>> {
    auth::authorize(req.headers(), &state.allowlist)?;

    let params = request_params(req).await?;
    let collection = auth::require_collection(&params)?.to_string();

    let filter = parse_filter(&params)?;
    let sort = parse_sort(&params)?;
    let skip = coerce_skip(params.get("skip"));
    let limit = coerce_limit(params.get("limit"), &state.args);

    debug!(collection = %collection, skip, limit, "find");

    let documents = state
        .mongo
        .find(&collection, filter, sort, skip, limit)
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            "documents": to_json_documents(documents),
            "skip": skip,
            "limit": limit,
        }),
    ))
}

/// Handle `GET|POST /aggregate`
pub async fn handle_aggregate(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    match aggregate(req, state).await {
        Ok(response) => response,
        Err(err) => error_response(err),
    }
}

async fn aggregate(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<Full<Bytes>>> {
    auth::authorize(req.headers(), &state.allowlist)?;

    let params = request_params(req).await?;
    let collection = auth::require_collection(&params)?.to_string();
    let pipeline = parse_pipeline(&params)?;

    debug!(collection = %collection, stages = pipeline.len(), "aggregate");

    let documents = state.mongo.aggregate(&collection, pipeline).await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "documents": to_json_documents(documents) }),
    ))
}

/// Handle `POST /insert`
pub async fn handle_insert(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    match insert(req, state).await {
        Ok(response) => response,
        Err(err) => error_response(err),
    }
}

async fn insert(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<Full<Bytes>>> {
    auth::authorize(req.headers(), &state.allowlist)?;

    let params = request_params(req).await?;
    let collection = auth::require_collection(&params)?.to_string();
    let document = parse_document(&params)?;

    let inserted_id = state.mongo.insert_one(&collection, document).await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "insertedId": inserted_id.to_hex() }),
    ))
}

/// Handle `POST /insertMany`
pub async fn handle_insert_many(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    match insert_many(req, state).await {
        Ok(response) => response,
        Err(err) => error_response(err),
    }
}

async fn insert_many(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>> {
    auth::authorize(req.headers(), &state.allowlist)?;

    let params = request_params(req).await?;
    let collection = auth::require_collection(&params)?.to_string();
    let documents = parse_documents(&params)?;

    let inserted_ids = state.mongo.insert_many(&collection, documents).await?;
    let inserted_ids: Vec<String> = inserted_ids.into_iter().map(|id| id.to_hex()).collect();

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            "insertedCount": inserted_ids.len(),
            "insertedIds": inserted_ids,
        }),
    ))
}

/// Handle `PUT|POST /findByIdAndUpdate`
pub async fn handle_find_by_id_and_update(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    match find_by_id_and_update(req, state).await {
        Ok(response) => response,
        Err(err) => error_response(err),
    }
}

async fn find_by_id_and_update(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>> {
    auth::authorize(req.headers(), &state.allowlist)?;

    let params = request_params(req).await?;
    let collection = auth::require_collection(&params)?.to_string();
    let id = parse_object_id(&params)?;
    let update = normalize_update(&params)?;

    let updated = state
        .mongo
        .find_by_id_and_update(&collection, id, update)
        .await?;

    match updated {
        Some(document) => Ok(json_response(
            StatusCode::OK,
            &json!({ "success": true, "document": to_json_document(document) }),
        )),
        None => Err(GatewayError::NotFound(format!(
            "No document with id {} in '{}'",
            id.to_hex(),
            collection
        ))),
    }
}

/// Handle `DELETE /findByIdAndDelete`
pub async fn handle_find_by_id_and_delete(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    match find_by_id_and_delete(req, state).await {
        Ok(response) => response,
        Err(err) => error_response(err),
    }
}

async fn find_by_id_and_delete(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>> {
    auth::authorize(req.headers(), &state.allowlist)?;

    let params = request_params(req).await?;
    let collection = auth::require_collection(&params)?.to_string();
    let id = parse_object_id(&params)?;

    let removed = state.mongo.find_by_id_and_delete(&collection, id).await?;

    match removed {
        Some(document) => Ok(json_response(
            StatusCode::OK,
            &json!({ "success": true, "document": to_json_document(document) }),
        )),
        None => Err(GatewayError::NotFound(format!(
            "No document with id {} in '{}'",
            id.to_hex(),
            collection
        ))),
    }
}

// =============================================================================
// Parameter coercion
// =============================================================================

/// Coerce `skip` to a non-negative integer, defaulting to 0.
/// Accepts JSON numbers and numeric strings; anything else falls back.
fn coerce_skip(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Coerce `limit` to a positive integer, defaulting to the configured page
/// size and clamped to the configured ceiling.
fn coerce_limit(value: Option<&Value>, args: &Args) -> i64 {
    let requested = match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };

    match requested {
        Some(limit) if limit > 0 => limit.min(args.max_limit),
        _ => args.default_limit,
    }
}

/// Parse the optional filter, normalizing a string `_id` to an ObjectId
fn parse_filter(params: &Value) -> Result<Document> {
    let mut filter = match params.get("filter") {
        None | Some(Value::Null) => Document::new(),
        Some(value) if value.is_object() => bson::to_document(value)?,
        Some(_) => {
            return Err(GatewayError::BadRequest(
                "'filter' must be an object".to_string(),
            ))
        }
    };

    normalize_id_filter(&mut filter);
    Ok(filter)
}

/// Rewrite a string `_id` that parses as an ObjectId to the native type
fn normalize_id_filter(filter: &mut Document) {
    if let Ok(id) = filter.get_str("_id") {
        if let Ok(oid) = ObjectId::parse_str(id) {
            filter.insert("_id", oid);
        }
    }
}

fn parse_sort(params: &Value) -> Result<Option<Document>> {
    match params.get("sort") {
        None | Some(Value::Null) => Ok(None),
        Some(value) if value.is_object() => Ok(Some(bson::to_document(value)?)),
        Some(_) => Err(GatewayError::BadRequest(
            "'sort' must be an object".to_string(),
        )),
    }
}

/// Parse the aggregation pipeline: a non-empty array of stage objects
fn parse_pipeline(params: &Value) -> Result<Vec<Document>> {
    let stages = params
        .get("pipeline")
        .and_then(|v| v.as_array())
        .ok_or_else(|| GatewayError::BadRequest("'pipeline' must be an array".to_string()))?;

    stages
        .iter()
        .map(|stage| {
            if stage.is_object() {
                Ok(bson::to_document(stage)?)
            } else {
                Err(GatewayError::BadRequest(
                    "'pipeline' stages must be objects".to_string(),
                ))
            }
        })
        .collect()
}

/// Parse the `id` parameter of the findById* operations
fn parse_object_id(params: &Value) -> Result<ObjectId> {
    let id = params
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| GatewayError::BadRequest("'id' is required".to_string()))?;

    ObjectId::parse_str(id)
        .map_err(|_| GatewayError::BadRequest(format!("'{}' is not a valid document id", id)))
}

fn parse_document(params: &Value) -> Result<Document> {
    match params.get("document") {
        Some(value) if value.is_object() => Ok(bson::to_document(value)?),
        _ => Err(GatewayError::BadRequest(
            "'document' must be an object".to_string(),
        )),
    }
}

fn parse_documents(params: &Value) -> Result<Vec<Document>> {
    let documents = params
        .get("documents")
        .and_then(|v| v.as_array())
        .ok_or_else(|| GatewayError::BadRequest("'documents' must be an array".to_string()))?;

    if documents.is_empty() {
        return Err(GatewayError::BadRequest(
            "'documents' must not be empty".to_string(),
        ));
    }

    documents
        .iter()
        .map(|document| {
            if document.is_object() {
                Ok(bson::to_document(document)?)
            } else {
                Err(GatewayError::BadRequest(
                    "'documents' entries must be objects".to_string(),
                ))
            }
        })
        .collect()
}

/// Normalize the `update` parameter into an update document.
///
/// Plain documents (no `$` operator keys) are wrapped in `$set`, and
/// `updated_at` is refreshed inside `$set` either way.
fn normalize_update(params: &Value) -> Result<Document> {
    let update = match params.get("update") {
        Some(value) if value.is_object() => bson::to_document(value)?,
        _ => {
            return Err(GatewayError::BadRequest(
                "'update' must be an object".to_string(),
            ))
        }
    };

    let has_operators = update.keys().any(|k| k.starts_with('$'));
    let mut update = if has_operators {
        update
    } else {
        let mut wrapped = Document::new();
        wrapped.insert("$set", update);
        wrapped
    };

    let set = match update.get_document_mut("$set") {
        Ok(set) => set,
        Err(_) => {
            update.insert("$set", Document::new());
            update.get_document_mut("$set").expect("just inserted")
        }
    };
    set.insert("updated_at", DateTime::now());

    Ok(update)
}

// =============================================================================
// Response shaping
// =============================================================================

/// Render a BSON document as relaxed extended JSON
fn to_json_document(document: Document) -> Value {
    Bson::Document(document).into_relaxed_extjson()
}

fn to_json_documents(documents: Vec<Document>) -> Vec<Value> {
    documents.into_iter().map(to_json_document).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde_json::json;

    fn args() -> Args {
        use clap::Parser;
        Args::parse_from(["wicket", "--api-tokens", "secret"])
    }

    #[test]
    fn skip_coercion_table() {
        assert_eq!(coerce_skip(None), 0);
        assert_eq!(coerce_skip(Some(&json!(25))), 25);
        assert_eq!(coerce_skip(Some(&json!("25"))), 25);
        assert_eq!(coerce_skip(Some(&json!(" 25 "))), 25);
        assert_eq!(coerce_skip(Some(&json!(-5))), 0);
        assert_eq!(coerce_skip(Some(&json!("garbage"))), 0);
        assert_eq!(coerce_skip(Some(&json!(true))), 0);
    }

    #[test]
    fn limit_coercion_table() {
        let args = args();
        assert_eq!(coerce_limit(None, &args), 100);
        assert_eq!(coerce_limit(Some(&json!(10)), &args), 10);
        assert_eq!(coerce_limit(Some(&json!("10")), &args), 10);
        assert_eq!(coerce_limit(Some(&json!(9999)), &args), 500);
        assert_eq!(coerce_limit(Some(&json!(0)), &args), 100);
        assert_eq!(coerce_limit(Some(&json!(-3)), &args), 100);
        assert_eq!(coerce_limit(Some(&json!("garbage")), &args), 100);
    }

    #[test]
    fn filter_defaults_to_empty_document() {
        assert_eq!(parse_filter(&json!({})).unwrap(), Document::new());
        assert_eq!(
            parse_filter(&json!({ "filter": null })).unwrap(),
            Document::new()
        );
    }

    #[test]
    fn filter_must_be_an_object() {
        let err = parse_filter(&json!({ "filter": [1, 2] })).unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)));
    }

    #[test]
    fn string_id_in_filter_becomes_object_id() {
        let hex = "507f1f77bcf86cd799439011";
        let filter = parse_filter(&json!({ "filter": { "_id": hex } })).unwrap();

        assert_eq!(
            filter.get_object_id("_id").unwrap(),
            ObjectId::parse_str(hex).unwrap()
        );
    }

    #[test]
    fn non_object_id_strings_are_left_alone() {
        let filter = parse_filter(&json!({ "filter": { "_id": "not-an-oid" } })).unwrap();
        assert_eq!(filter.get_str("_id").unwrap(), "not-an-oid");
    }

    #[test]
    fn pipeline_requires_an_array_of_objects() {
        let pipeline = parse_pipeline(&json!({
            "pipeline": [ { "$match": { "active": true } }, { "$limit": 5 } ]
        }))
        .unwrap();
        assert_eq!(pipeline.len(), 2);

        for payload in [
            json!({}),
            json!({ "pipeline": { "$match": {} } }),
            json!({ "pipeline": [1, 2] }),
        ] {
            let err = parse_pipeline(&payload).unwrap_err();
            assert!(matches!(err, GatewayError::BadRequest(_)));
        }
    }

    #[test]
    fn empty_pipeline_is_allowed() {
        assert!(parse_pipeline(&json!({ "pipeline": [] })).unwrap().is_empty());
    }

    #[test]
    fn object_id_param_rules() {
        let hex = "507f1f77bcf86cd799439011";
        assert_eq!(
            parse_object_id(&json!({ "id": hex })).unwrap(),
            ObjectId::parse_str(hex).unwrap()
        );

        for payload in [json!({}), json!({ "id": "short" }), json!({ "id": 42 })] {
            let err = parse_object_id(&payload).unwrap_err();
            assert!(matches!(err, GatewayError::BadRequest(_)));
        }
    }

    #[test]
    fn document_params_must_be_objects() {
        assert!(parse_document(&json!({ "document": { "a": 1 } })).is_ok());

        for payload in [json!({}), json!({ "document": [1] }), json!({ "document": "x" })] {
            assert!(parse_document(&payload).is_err());
        }
    }

    #[test]
    fn documents_param_rules() {
        let parsed = parse_documents(&json!({ "documents": [{ "a": 1 }, { "b": 2 }] })).unwrap();
        assert_eq!(parsed.len(), 2);

        for payload in [
            json!({}),
            json!({ "documents": [] }),
            json!({ "documents": [{ "a": 1 }, 2] }),
            json!({ "documents": { "a": 1 } }),
        ] {
            assert!(parse_documents(&payload).is_err());
        }
    }

    #[test]
    fn plain_update_is_wrapped_in_set() {
        let update = normalize_update(&json!({ "update": { "name": "ada" } })).unwrap();

        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("name").unwrap(), "ada");
        assert!(set.get_datetime("updated_at").is_ok());
        assert_eq!(update.len(), 1);
    }

    #[test]
    fn operator_update_is_passed_through_with_refreshed_timestamp() {
        let update = normalize_update(&json!({
            "update": { "$inc": { "count": 1 }, "$set": { "name": "ada" } }
        }))
        .unwrap();

        let rendered = Bson::Document(update.clone()).into_relaxed_extjson();
        assert_eq!(rendered["$inc"]["count"], 1);
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("name").unwrap(), "ada");
        assert!(set.get_datetime("updated_at").is_ok());
    }

    #[test]
    fn operator_update_without_set_gains_one() {
        let update = normalize_update(&json!({ "update": { "$unset": { "tag": "" } } })).unwrap();

        assert!(update.get_document("$unset").is_ok());
        assert!(update
            .get_document("$set")
            .unwrap()
            .get_datetime("updated_at")
            .is_ok());
    }

    #[test]
    fn missing_update_is_a_bad_request() {
        for payload in [json!({}), json!({ "update": [1] }), json!({ "update": null })] {
            let err = normalize_update(&payload).unwrap_err();
            assert!(matches!(err, GatewayError::BadRequest(_)));
        }
    }

    #[test]
    fn response_documents_render_object_ids_as_extended_json() {
        let oid = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        let value = to_json_document(doc! { "_id": oid, "n": 1 });

        assert_eq!(value["_id"]["$oid"], "507f1f77bcf86cd799439011");
        assert_eq!(value["n"], 1);
    }
}
