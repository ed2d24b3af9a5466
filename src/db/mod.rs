//! Database access layer

pub mod mongo;

pub use mongo::{IndexSpec, MongoClient};
