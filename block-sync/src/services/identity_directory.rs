//! Identity directory (LDAP / Active Directory) client.

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::IdentityDirectoryConfig;
use crate::error::SyncError;
use crate::services::query::{build_filter, locked_filter, PERSON_FILTER};

/// Username -> found/locked. Holds an entry for every requested username.
pub type LockQueryResult = HashMap<String, bool>;

/// Lookups against the authoritative identity directory.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Root naming context of the directory, e.g. `dc=corp,dc=com`.
    fn domain(&self) -> &str;

    /// `true` for every username with a person entry in the directory.
    async fn find_existing(&self, usernames: &[String]) -> Result<LockQueryResult, SyncError>;

    /// `true` for every username whose person entry has the lock bit set.
    async fn find_locked(&self, usernames: &[String]) -> Result<LockQueryResult, SyncError>;
}

/// Extract the domain-component suffix of a distinguished name.
///
/// `ou=Users,ou=MC,dc=mycompany,dc=com` gives `dc=mycompany,dc=com`; input that
/// already starts with `dc=` is returned unchanged.
pub fn parse_domain(point: &str) -> Result<&str, SyncError> {
    let lower = point.to_ascii_lowercase();
    if lower.starts_with("dc=") {
        return Ok(point);
    }
    match lower.find(",dc=") {
        Some(i) => Ok(&point[i + 1..]),
        None => Err(SyncError::DomainParse(point.to_string())),
    }
}

/// Mark every requested username found among `found`, case-insensitively.
///
/// Names returned by the directory that were not requested are ignored, so the
/// keys of the result are exactly the requested spellings.
pub fn presence_map<I>(requested: &[String], found: I) -> LockQueryResult
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut by_lower: HashMap<String, &str> = HashMap::with_capacity(requested.len());
    let mut result: LockQueryResult = HashMap::with_capacity(requested.len());
    for username in requested {
        by_lower.insert(username.to_lowercase(), username);
        result.insert(username.clone(), false);
    }
    for name in found {
        if let Some(requested) = by_lower.get(&name.as_ref().to_lowercase()) {
            result.insert((*requested).to_string(), true);
        }
    }
    result
}

/// One combined filter per chunk of at most `batch_size` usernames, in order.
pub fn batch_filters(
    base_filter: &str,
    attribute: &str,
    usernames: &[String],
    batch_size: usize,
) -> Vec<String> {
    usernames
        .chunks(batch_size.max(1))
        .map(|chunk| build_filter(base_filter, attribute, chunk))
        .collect()
}

/// LDAP implementation of [`IdentityDirectory`].
///
/// One connection is opened and bound at construction and reused for every
/// search of the run.
pub struct LdapIdentityDirectory {
    ldap: Ldap,
    search_base: String,
    domain: String,
    account_attribute: String,
    batch_size: usize,
    timeout: Duration,
}

impl LdapIdentityDirectory {
    /// Connect and bind. Anonymous unless both bind DN and password are set.
    pub async fn connect(config: &IdentityDirectoryConfig) -> Result<Self, SyncError> {
        let domain = parse_domain(&config.search_base)?.to_string();

        debug!(url = %config.url, "Connecting to LDAP server");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(config.timeout)
            .set_starttls(config.starttls);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &config.url)
            .await
            .map_err(|e| SyncError::DirectoryConnect(format!("{}: {}", config.url, e)))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        if let Some((bind_dn, password)) = config.credentials() {
            debug!(bind_dn = %bind_dn, "Performing LDAP bind");
            ldap.with_timeout(config.timeout)
                .simple_bind(bind_dn, password.expose_secret())
                .await
                .and_then(|res| res.success())
                .map_err(|e| {
                    SyncError::DirectoryConnect(format!("bind as {} failed: {}", bind_dn, e))
                })?;
        }

        info!(url = %config.url, domain = %domain, "LDAP connection established");

        Ok(Self {
            ldap,
            search_base: config.search_base.clone(),
            domain,
            account_attribute: config.account_attribute.clone(),
            batch_size: config.batch_size.max(1),
            timeout: config.timeout,
        })
    }

    /// Close the connection.
    pub async fn close(mut self) {
        if let Err(e) = self.ldap.unbind().await {
            debug!(error = %e, "LDAP unbind failed");
        }
    }

    #[instrument(skip(self, usernames), fields(count = usernames.len()))]
    async fn search_users(
        &self,
        base_filter: &str,
        usernames: &[String],
    ) -> Result<LockQueryResult, SyncError> {
        let mut found: Vec<String> = Vec::new();

        for filter in batch_filters(base_filter, &self.account_attribute, usernames, self.batch_size) {
            debug!(filter = %filter, base = %self.search_base, "Searching LDAP");

            let mut ldap = self.ldap.clone();
            let (entries, _) = ldap
                .with_timeout(self.timeout)
                .search(
                    &self.search_base,
                    Scope::Subtree,
                    &filter,
                    vec![self.account_attribute.as_str()],
                )
                .await
                .and_then(|res| res.success())
                .map_err(|e| SyncError::DirectorySearch(e.to_string()))?;

            for entry in entries {
                let entry = SearchEntry::construct(entry);
                if let Some(values) = attribute_values(&entry, &self.account_attribute) {
                    found.extend(values.iter().cloned());
                }
            }
        }

        Ok(presence_map(usernames, found))
    }
}

/// Attribute names come back in the server's spelling; match them loosely.
fn attribute_values<'a>(entry: &'a SearchEntry, attribute: &str) -> Option<&'a Vec<String>> {
    entry.attrs.get(attribute).or_else(|| {
        entry
            .attrs
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, values)| values)
    })
}

#[async_trait]
impl IdentityDirectory for LdapIdentityDirectory {
    fn domain(&self) -> &str {
        &self.domain
    }

    async fn find_existing(&self, usernames: &[String]) -> Result<LockQueryResult, SyncError> {
        self.search_users(PERSON_FILTER, usernames).await
    }

    async fn find_locked(&self, usernames: &[String]) -> Result<LockQueryResult, SyncError> {
        self.search_users(&locked_filter(), usernames).await
    }
}
