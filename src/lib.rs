//! wicket - authenticated HTTP gateway for MongoDB
//!
//! A thin REST facade over a fixed set of MongoDB operations, for clients
//! that cannot hold a driver connection themselves. Requests authenticate
//! with a static bearer-token allowlist; each verb+path pair maps to
//! exactly one driver call with a canonical JSON envelope.

pub mod auth;
pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{GatewayError, Result};
