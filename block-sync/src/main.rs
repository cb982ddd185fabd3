//! Block Sync entry point.
//!
//! Prints the decision array on success, or `{"error": "..."}` on failure.
//! Logs go to stderr.

use block_sync::config::SyncConfig;
use block_sync::error::SyncError;
use block_sync::services::init_metrics;
use block_sync::services::metrics::write_textfile;
use block_sync::startup::Application;
use std::process::ExitCode;
use sync_core::observability::{init_tracing, shutdown_tracing};

fn print_error(msg: &str) {
    println!("{}", serde_json::json!({ "error": msg }));
}

async fn run(config: &SyncConfig) -> Result<String, SyncError> {
    let app = Application::build(config).await?;
    let aggregator = app.run_once().await?;
    Ok(aggregator.to_json()?)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing
    init_tracing(
        &config.service_name,
        &config.common.log_level,
        config.common.log_json,
        config.common.otlp_endpoint.as_deref(),
    );
    init_metrics();

    // Log configuration (mask sensitive values)
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        account_directory_url = %config.account_directory.url,
        identity_directory_url = %config.identity_directory.url,
        search_base = %config.identity_directory.search_base,
        anonymous_bind = config.identity_directory.credentials().is_none(),
        exclude = ?config.filter.exclude,
        pattern = ?config.filter.pattern,
        require_identity_binding = config.filter.require_identity_binding,
        enforce = config.enforce,
        "Starting block-sync"
    );

    let result = run(&config).await;

    if let Some(path) = &config.metrics_textfile {
        if let Err(e) = write_textfile(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write metrics textfile");
        }
    }

    let code = match result {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(stage = e.stage(), error = %e, "Main processing error");
            print_error(&format!("Main processing error : {}.", e));
            ExitCode::FAILURE
        }
    };

    shutdown_tracing();
    code
}
