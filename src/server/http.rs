//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Each request is
//! served independently; the shared MongoDB handle is cloned per use and
//! the driver's pool does the rest.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::auth::TokenAllowlist;
use crate::config::Args;
use crate::db::MongoClient;
use crate::routes;
use crate::types::Result;

/// Shared application state
///
/// The database handle is injected here at startup; handlers never reach
/// for ambient connection state.
pub struct AppState {
    pub args: Args,
    pub allowlist: TokenAllowlist,
    pub mongo: MongoClient,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, mongo: MongoClient) -> Self {
        let allowlist = TokenAllowlist::new(args.token_list());
        Self {
            args,
            allowlist,
            mongo,
            started_at: Instant::now(),
        }
    }
}

/// The fixed endpoint set, one variant per verb+path combination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Preflight,
    Health,
    Version,
    CreateCollection,
    DropCollection,
    Find,
    Aggregate,
    Insert,
    InsertMany,
    FindByIdAndUpdate,
    FindByIdAndDelete,
}

impl Route {
    /// Map a verb+path pair to its endpoint
    pub fn resolve(method: &Method, path: &str) -> Option<Route> {
        match (method, path) {
            (&Method::OPTIONS, _) => Some(Route::Preflight),
            (&Method::GET, "/health") => Some(Route::Health),
            (&Method::GET, "/version") => Some(Route::Version),
            (&Method::POST, "/create") => Some(Route::CreateCollection),
            (&Method::DELETE, "/delete") => Some(Route::DropCollection),
            (&Method::GET | &Method::POST, "/find") => Some(Route::Find),
            (&Method::GET | &Method::POST, "/aggregate") => Some(Route::Aggregate),
            (&Method::POST, "/insert") => Some(Route::Insert),
            (&Method::POST, "/insertMany") => Some(Route::InsertMany),
            (&Method::PUT | &Method::POST, "/findByIdAndUpdate") => Some(Route::FindByIdAndUpdate),
            (&Method::DELETE, "/findByIdAndDelete") => Some(Route::FindByIdAndDelete),
            _ => None,
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "wicket listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move {
                            Ok::<_, Infallible>(handle_request(state, addr, req).await)
                        }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    match Route::resolve(&method, &path) {
        Some(Route::Preflight) => preflight_response(),
        Some(Route::Health) => routes::health_check(&req, state).await,
        Some(Route::Version) => routes::version_info(),
        Some(Route::CreateCollection) => routes::handle_create(req, state).await,
        Some(Route::DropCollection) => routes::handle_delete(req, state).await,
        Some(Route::Find) => routes::handle_find(req, state).await,
        Some(Route::Aggregate) => routes::handle_aggregate(req, state).await,
        Some(Route::Insert) => routes::handle_insert(req, state).await,
        Some(Route::InsertMany) => routes::handle_insert_many(req, state).await,
        Some(Route::FindByIdAndUpdate) => routes::handle_find_by_id_and_update(req, state).await,
        Some(Route::FindByIdAndDelete) => routes::handle_find_by_id_and_delete(req, state).await,
        None => not_found_response(&path),
    }
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": format!("No route for {}", path) });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_endpoint_resolves() {
        assert_eq!(Route::resolve(&Method::GET, "/health"), Some(Route::Health));
        assert_eq!(Route::resolve(&Method::GET, "/version"), Some(Route::Version));
        assert_eq!(
            Route::resolve(&Method::POST, "/create"),
            Some(Route::CreateCollection)
        );
        assert_eq!(
            Route::resolve(&Method::DELETE, "/delete"),
            Some(Route::DropCollection)
        );
        assert_eq!(Route::resolve(&Method::POST, "/insert"), Some(Route::Insert));
        assert_eq!(
            Route::resolve(&Method::POST, "/insertMany"),
            Some(Route::InsertMany)
        );
        assert_eq!(
            Route::resolve(&Method::DELETE, "/findByIdAndDelete"),
            Some(Route::FindByIdAndDelete)
        );
    }

    #[test]
    fn find_and_aggregate_accept_get_and_post() {
        for method in [Method::GET, Method::POST] {
            assert_eq!(Route::resolve(&method, "/find"), Some(Route::Find));
            assert_eq!(Route::resolve(&method, "/aggregate"), Some(Route::Aggregate));
        }
    }

    #[test]
    fn update_accepts_put_and_post() {
        for method in [Method::PUT, Method::POST] {
            assert_eq!(
                Route::resolve(&method, "/findByIdAndUpdate"),
                Some(Route::FindByIdAndUpdate)
            );
        }
    }

    #[test]
    fn options_is_always_preflight() {
        for path in ["/find", "/anything", "/"] {
            assert_eq!(Route::resolve(&Method::OPTIONS, path), Some(Route::Preflight));
        }
    }

    #[test]
    fn wrong_verbs_do_not_resolve() {
        assert_eq!(Route::resolve(&Method::GET, "/insert"), None);
        assert_eq!(Route::resolve(&Method::POST, "/delete"), None);
        assert_eq!(Route::resolve(&Method::GET, "/findByIdAndUpdate"), None);
        assert_eq!(Route::resolve(&Method::POST, "/health"), None);
        assert_eq!(Route::resolve(&Method::GET, "/unknown"), None);
    }
}
