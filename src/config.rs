//! Configuration for wicket
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// wicket - authenticated HTTP gateway for MongoDB
#[derive(Parser, Debug, Clone)]
#[command(name = "wicket")]
#[command(about = "HTTP gateway exposing MongoDB CRUD and aggregation behind a bearer-token allowlist")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "wicket")]
    pub mongodb_db: String,

    /// Comma-separated list of accepted bearer tokens
    #[arg(long, env = "API_TOKENS")]
    pub api_tokens: String,

    /// Page size used by /find when the request carries no limit
    #[arg(long, env = "DEFAULT_LIMIT", default_value = "100")]
    pub default_limit: i64,

    /// Hard ceiling on the /find page size
    #[arg(long, env = "MAX_LIMIT", default_value = "500")]
    pub max_limit: i64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Get the list of accepted tokens, trimmed, empty entries dropped
    pub fn token_list(&self) -> Vec<String> {
        self.api_tokens
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.token_list().is_empty() {
            return Err("API_TOKENS must contain at least one non-empty token".to_string());
        }

        if self.default_limit < 1 {
            return Err("DEFAULT_LIMIT must be at least 1".to_string());
        }

        if self.default_limit > self.max_limit {
            return Err("DEFAULT_LIMIT must be less than or equal to MAX_LIMIT".to_string());
        }

        Ok(())
    }
}
