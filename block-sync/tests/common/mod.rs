//! Common test utilities for block-sync integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use block_sync::error::SyncError;
use block_sync::services::identity_directory::presence_map;
use block_sync::services::{IdentityDirectory, LockQueryResult, RestAccountDirectory};
use reqwest::Client;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "glpat-test-token";
pub const DOMAIN: &str = "dc=corp,dc=com";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,block_sync=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Account JSON as the account directory lists it.
pub fn account_json(id: u64, username: &str, state: &str) -> Value {
    json!({
        "id": id,
        "username": username,
        "name": format!("User {}", username),
        "state": state,
        "identities": [
            {"provider": "ldapmain", "extern_uid": format!("cn={},ou=Users,{}", username, DOMAIN)}
        ]
    })
}

/// Client pointed at the mock server.
pub fn account_directory(server: &MockServer, max_pages: u32) -> RestAccountDirectory {
    RestAccountDirectory::with_client(
        Client::new(),
        &server.uri(),
        SecretString::new(TOKEN.to_string()),
        max_pages,
    )
}

/// Serve `pages` as pages 1..=N of the listing, followed by an empty page.
pub async fn mount_listing(server: &MockServer, pages: Vec<Vec<Value>>) {
    let count = pages.len();
    for (i, page) in pages.into_iter().enumerate() {
        Mock::given(method("GET"))
            .and(path("/api/v4/users"))
            .and(query_param("page", (i + 1).to_string()))
            .and(query_param("per_page", "50"))
            .and(header("PRIVATE-TOKEN", TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(page)))
            .expect(1)
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/api/v4/users"))
        .and(query_param("page", (count + 1).to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(server)
        .await;
}

/// Answer block/unblock for `id` with a raw body.
pub async fn mount_action(server: &MockServer, id: u64, action: &str, status: u16, body: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/api/v4/users/{}/{}", id, action)))
        .and(header("PRIVATE-TOKEN", TOKEN))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

/// Searches seen by a fake directory: (kind, usernames).
pub type SearchLog = Arc<Mutex<Vec<(&'static str, Vec<String>)>>>;

/// In-memory identity directory: username -> locked.
pub struct FakeIdentityDirectory {
    pub people: HashMap<String, bool>,
    pub fail_search: bool,
    pub searches: SearchLog,
}

impl FakeIdentityDirectory {
    pub fn new(people: &[(&str, bool)]) -> Self {
        Self {
            people: people
                .iter()
                .map(|(name, locked)| (name.to_string(), *locked))
                .collect(),
            fail_search: false,
            searches: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_search: true,
            ..Self::new(&[])
        }
    }

    /// Handle that stays readable after the fake is moved into a run.
    pub fn search_log(&self) -> SearchLog {
        Arc::clone(&self.searches)
    }

    fn search(
        &self,
        kind: &'static str,
        usernames: &[String],
        matches: impl Fn(bool) -> bool,
    ) -> Result<LockQueryResult, SyncError> {
        self.searches
            .lock()
            .unwrap()
            .push((kind, usernames.to_vec()));
        if self.fail_search {
            return Err(SyncError::DirectorySearch("Size limit exceeded".into()));
        }
        let found = self
            .people
            .iter()
            .filter(|(_, locked)| matches(**locked))
            .map(|(name, _)| name.clone());
        Ok(presence_map(usernames, found))
    }
}

#[async_trait]
impl IdentityDirectory for FakeIdentityDirectory {
    fn domain(&self) -> &str {
        DOMAIN
    }

    async fn find_existing(&self, usernames: &[String]) -> Result<LockQueryResult, SyncError> {
        self.search("existing", usernames, |_| true)
    }

    async fn find_locked(&self, usernames: &[String]) -> Result<LockQueryResult, SyncError> {
        self.search("locked", usernames, |locked| locked)
    }
}
