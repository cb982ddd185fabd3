//! Block Sync - keeps account block state in step with directory lock state.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod startup;
