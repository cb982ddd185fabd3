//! sync-core: Shared infrastructure for directory synchronisation jobs.
pub mod config;
pub mod error;
pub mod http;
pub mod observability;

pub use reqwest;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;
