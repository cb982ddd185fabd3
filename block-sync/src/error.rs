//! Error taxonomy for a synchronisation run.
//!
//! Everything except [`DirectoryActionError`] is fatal and ends the run with no
//! output. Action errors stay with the account they belong to.

use sync_core::error::AppError;
use thiserror::Error;

/// Failure while listing accounts. No partial listing is ever returned.
#[derive(Debug, Error)]
pub enum DirectoryFetchError {
    #[error("Error at requesting page {page}: {source}")]
    Transport {
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("Page {page} request returned {status}: {body}")]
    Status {
        page: u32,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Cant parse page {page} of the account listing: {source}")]
    Malformed {
        page: u32,
        #[source]
        source: serde_json::Error,
    },

    #[error("Account listing did not end within {0} pages")]
    PageLimitExceeded(u32),
}

/// Failure of a single block/unblock call.
#[derive(Debug, Error)]
pub enum DirectoryActionError {
    #[error("Error at {action} request for user <{id}>: {source}")]
    Transport {
        id: u64,
        action: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("User <{id}> already {}.", blocked_word(.blocked))]
    AlreadyInTargetState { id: u64, blocked: bool },

    #[error("{0}")]
    Remote(String),

    #[error("Cant parse API response <{0}>")]
    UnexpectedResponse(String),
}

fn blocked_word(blocked: &bool) -> &'static str {
    if *blocked { "blocked" } else { "unblocked" }
}

impl DirectoryActionError {
    /// True when the account was already where we wanted it.
    pub fn is_already_in_target_state(&self) -> bool {
        matches!(self, Self::AlreadyInTargetState { .. })
    }
}

/// Run-level error surfaced at the job boundary.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Account directory fetch failed: {0}")]
    DirectoryFetch(#[from] DirectoryFetchError),

    #[error("LDAP connection failed: {0}")]
    DirectoryConnect(String),

    #[error("LDAP search failed: {0}")]
    DirectorySearch(String),

    #[error("LDAP domain missing in <{0}>")]
    DomainParse(String),

    #[error("Wrong username pattern format: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error(transparent)]
    Config(#[from] AppError),

    #[error("Error at converting result to JSON: {0}")]
    Output(#[from] serde_json::Error),
}

impl SyncError {
    /// Short stage label used in metrics.
    ///
    /// A transport that cannot be set up (unreadable CA file, TLS backend
    /// failure) is reported as `transport`, not `config`.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::DirectoryFetch(_) => "fetch",
            Self::DirectoryConnect(_) => "connect",
            Self::DirectorySearch(_) => "search",
            Self::DomainParse(_) => "domain",
            Self::InvalidPattern(_) => "filter",
            Self::Config(AppError::TransportError(_)) => "transport",
            Self::Config(_) => "config",
            Self::Output(_) => "output",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_in_target_state_messages() {
        let blocked = DirectoryActionError::AlreadyInTargetState { id: 7, blocked: true };
        let unblocked = DirectoryActionError::AlreadyInTargetState { id: 7, blocked: false };

        assert_eq!(blocked.to_string(), "User <7> already blocked.");
        assert_eq!(unblocked.to_string(), "User <7> already unblocked.");
        assert!(blocked.is_already_in_target_state());
        assert!(!DirectoryActionError::Remote("403 Forbidden".into()).is_already_in_target_state());
    }

    #[test]
    fn remote_message_is_verbatim() {
        let err = DirectoryActionError::Remote("The request requires higher privileges".into());
        assert_eq!(err.to_string(), "The request requires higher privileges");
    }

    #[test]
    fn stage_labels() {
        assert_eq!(SyncError::DomainParse("ou=x".into()).stage(), "domain");
        assert_eq!(
            SyncError::DirectoryFetch(DirectoryFetchError::PageLimitExceeded(3)).stage(),
            "fetch"
        );
        assert_eq!(SyncError::from(AppError::config("missing")).stage(), "config");
        let unreadable_ca = sync_core::http::build_client(&sync_core::http::HttpSettings {
            ca_certificate: Some("/nonexistent/ca.pem".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(SyncError::from(unreadable_ca).stage(), "transport");
    }
}
