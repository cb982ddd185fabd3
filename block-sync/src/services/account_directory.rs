//! Account directory (REST) client.
//!
//! Lists accounts page by page and flips their block state one call at a time.
//! No batching, no retries.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use sync_core::http::{build_client, TracedRequestExt};
use tracing::{debug, info, instrument};

use crate::config::AccountDirectoryConfig;
use crate::error::{DirectoryActionError, DirectoryFetchError, SyncError};
use crate::models::{Account, ErrorResponse};

/// Accounts requested per listing page.
pub const PAGE_SIZE: u32 = 50;

/// Header carrying the access token.
pub const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Operations the reconciliation needs from the account system.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Every account, in listing order.
    async fn fetch_all_accounts(&self) -> Result<Vec<Account>, DirectoryFetchError>;

    /// Block (`true`) or unblock (`false`) one account.
    async fn set_account_blocked(&self, id: u64, blocked: bool)
        -> Result<(), DirectoryActionError>;
}

/// HTTP implementation of [`AccountDirectory`].
#[derive(Clone)]
pub struct RestAccountDirectory {
    client: Client,
    base_url: String,
    token: SecretString,
    max_pages: u32,
}

impl RestAccountDirectory {
    /// Create a client using the configured timeout and certificate trust.
    pub fn new(config: &AccountDirectoryConfig) -> Result<Self, SyncError> {
        let client = build_client(&config.http)?;
        Ok(Self::with_client(
            client,
            &config.url,
            config.token.clone(),
            config.max_pages,
        ))
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_client(client: Client, base_url: &str, token: SecretString, max_pages: u32) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            max_pages,
        }
    }

    fn users_url(&self) -> String {
        format!("{}/api/v4/users", self.base_url)
    }

    fn action_url(&self, id: u64, action: &str) -> String {
        format!("{}/api/v4/users/{}/{}", self.base_url, id, action)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(TOKEN_HEADER, self.token.expose_secret())
            .with_trace_context()
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<Account>, DirectoryFetchError> {
        let response = self
            .authorized(self.client.get(self.users_url()))
            .query(&[("per_page", PAGE_SIZE), ("page", page)])
            .send()
            .await
            .map_err(|source| DirectoryFetchError::Transport { page, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| DirectoryFetchError::Transport { page, source })?;

        if !status.is_success() {
            return Err(DirectoryFetchError::Status { page, status, body });
        }

        serde_json::from_str(&body).map_err(|source| DirectoryFetchError::Malformed { page, source })
    }
}

/// Interpret the body of a successful block/unblock call.
///
/// `true` is success; `null` or `false` mean the account was already in the
/// requested state; an object with `error`/`error_description` carries a
/// message that is surfaced as-is.
pub fn interpret_action_response(
    id: u64,
    blocked: bool,
    body: &str,
) -> Result<(), DirectoryActionError> {
    match body.trim() {
        "true" => Ok(()),
        "null" | "false" => Err(DirectoryActionError::AlreadyInTargetState { id, blocked }),
        other => Err(error_from_body(other)),
    }
}

fn error_from_body(body: &str) -> DirectoryActionError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(error) => match error.message() {
            Some(message) => DirectoryActionError::Remote(message.to_string()),
            None => DirectoryActionError::UnexpectedResponse(body.to_string()),
        },
        Err(_) => DirectoryActionError::UnexpectedResponse(body.to_string()),
    }
}

#[async_trait]
impl AccountDirectory for RestAccountDirectory {
    #[instrument(skip(self))]
    async fn fetch_all_accounts(&self) -> Result<Vec<Account>, DirectoryFetchError> {
        let mut accounts = Vec::new();

        for page in 1..=self.max_pages {
            let parsed = self.fetch_page(page).await?;
            debug!(page, count = parsed.len(), "Fetched account page");

            if parsed.is_empty() {
                info!(pages = page - 1, total = accounts.len(), "Fetched all accounts");
                return Ok(accounts);
            }
            accounts.extend(parsed);
        }

        Err(DirectoryFetchError::PageLimitExceeded(self.max_pages))
    }

    #[instrument(skip(self))]
    async fn set_account_blocked(
        &self,
        id: u64,
        blocked: bool,
    ) -> Result<(), DirectoryActionError> {
        let action = if blocked { "block" } else { "unblock" };

        let response = self
            .authorized(self.client.post(self.action_url(id, action)))
            .send()
            .await
            .map_err(|source| DirectoryActionError::Transport { id, action, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| DirectoryActionError::Transport { id, action, source })?;

        debug!(status = %status, body = %body, "Account directory {} response", action);

        if status.is_success() {
            interpret_action_response(id, blocked, &body)
        } else {
            Err(match error_from_body(&body) {
                DirectoryActionError::UnexpectedResponse(_) => DirectoryActionError::Remote(
                    format!("{} request returned {}: {}", action, status, body.trim()),
                ),
                remote => remote,
            })
        }
    }
}
