//! Services module for block-sync.

pub mod account_directory;
pub mod aggregator;
pub mod engine;
pub mod filter;
pub mod identity_directory;
pub mod metrics;
pub mod query;

pub use account_directory::{AccountDirectory, RestAccountDirectory};
pub use aggregator::{ResultAggregator, RunSummary};
pub use engine::ReconciliationEngine;
pub use filter::FilterCriteria;
pub use identity_directory::{IdentityDirectory, LdapIdentityDirectory, LockQueryResult};
pub use metrics::init_metrics;
