//! Run orchestration: fetch, filter, look up, decide.

use std::collections::HashMap;
use std::time::Instant;
use tracing::{info, instrument};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::services::filter::{self, FilterCriteria};
use crate::services::metrics::{record_accounts, record_error, record_run_duration};
use crate::services::{
    AccountDirectory, IdentityDirectory, LdapIdentityDirectory, ReconciliationEngine,
    RestAccountDirectory, ResultAggregator,
};

/// One reconciliation run over explicitly passed-in clients.
pub struct Application<A, I> {
    accounts: A,
    identities: I,
    criteria: FilterCriteria,
    enforce: bool,
}

impl Application<RestAccountDirectory, LdapIdentityDirectory> {
    /// Build both clients from configuration.
    ///
    /// Fails when the search base has no domain component, when the HTTP
    /// transport cannot be set up, or when the LDAP connect/bind fails.
    /// Failures are counted by stage like run failures.
    pub async fn build(config: &SyncConfig) -> Result<Self, SyncError> {
        let result = Self::connect(config).await;
        if let Err(e) = &result {
            record_error(e.stage());
        }
        result
    }

    async fn connect(config: &SyncConfig) -> Result<Self, SyncError> {
        let accounts = RestAccountDirectory::new(&config.account_directory)?;
        let identities = LdapIdentityDirectory::connect(&config.identity_directory).await?;

        Ok(Self::new(
            accounts,
            identities,
            config.filter.clone(),
            config.enforce,
        ))
    }

    /// Run once and release the LDAP connection.
    pub async fn run_once(self) -> Result<ResultAggregator, SyncError> {
        let result = self.run().await;
        self.identities.close().await;
        result
    }
}

impl<A: AccountDirectory, I: IdentityDirectory> Application<A, I> {
    pub fn new(accounts: A, identities: I, criteria: FilterCriteria, enforce: bool) -> Self {
        Self {
            accounts,
            identities,
            criteria,
            enforce,
        }
    }

    /// Execute the whole pipeline.
    ///
    /// Fetch, search and filter errors abort with no output; per-account
    /// action failures end up as `FAIL` entries in the result.
    #[instrument(skip(self), fields(enforce = self.enforce))]
    pub async fn run(&self) -> Result<ResultAggregator, SyncError> {
        let started = Instant::now();
        let result = self.run_inner().await;
        record_run_duration(started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            record_error(e.stage());
        }
        result
    }

    async fn run_inner(&self) -> Result<ResultAggregator, SyncError> {
        let mut aggregator = ResultAggregator::new();

        let accounts = self.accounts.fetch_all_accounts().await?;
        record_accounts("fetched", accounts.len());

        let accounts = filter::apply(accounts, &self.criteria, self.identities.domain())?;
        record_accounts("filtered", accounts.len());
        if accounts.is_empty() {
            info!("No accounts left to check against the identity directory");
            return Ok(aggregator);
        }

        let usernames: Vec<String> = accounts.iter().map(|a| a.username.clone()).collect();
        let existing: HashMap<String, bool> = self
            .identities
            .find_existing(&usernames)
            .await?
            .into_iter()
            .filter(|(_, exists)| *exists)
            .collect();
        record_accounts("existing", existing.len());
        if existing.is_empty() {
            info!(searched = ?usernames, "No identity directory entries found");
            return Ok(aggregator);
        }

        // Keep the filtered order so searches are deterministic.
        let existing_names: Vec<String> = usernames
            .into_iter()
            .filter(|u| existing.contains_key(u))
            .collect();
        let locked = self.identities.find_locked(&existing_names).await?;

        let decisions = ReconciliationEngine::new(&self.accounts, self.enforce)
            .reconcile(&accounts, &existing, &locked)
            .await;
        aggregator.extend(decisions);

        let summary = aggregator.summary();
        info!(
            block = summary.block,
            unblock = summary.unblock,
            success = summary.success,
            fail = summary.fail,
            dry_run = summary.dry_run,
            "Reconciliation finished"
        );

        Ok(aggregator)
    }
}
