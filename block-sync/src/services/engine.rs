//! Per-account block/unblock decisions.
//!
//! Each account is compared in isolation against the directory lock state.
//! Action failures are turned into `Outcome::Fail` and never stop the run.

use std::collections::HashMap;
use tracing::{error, info};

use crate::models::{Account, AccountState, ReconciliationDecision, TargetState};
use crate::services::account_directory::AccountDirectory;
use crate::services::metrics::record_decision;

/// The state an account should move to, if any.
///
/// Only `active`+locked and `blocked`+unlocked diverge; everything else,
/// including unrecognised account states, is left alone.
pub fn decide(state: &AccountState, locked: bool) -> Option<TargetState> {
    match (state, locked) {
        (AccountState::Active, true) => Some(TargetState::Block),
        (AccountState::Blocked, false) => Some(TargetState::Unblock),
        _ => None,
    }
}

pub struct ReconciliationEngine<'a, A: AccountDirectory + ?Sized> {
    accounts: &'a A,
    enforce: bool,
}

impl<'a, A: AccountDirectory + ?Sized> ReconciliationEngine<'a, A> {
    /// With `enforce` unset decisions are only recorded, never applied.
    pub fn new(accounts: &'a A, enforce: bool) -> Self {
        Self { accounts, enforce }
    }

    /// Decide (and, when enforcing, apply) every account in order.
    ///
    /// Accounts missing from `existing`, or marked as not existing, are
    /// skipped. A username missing from `locked` counts as unlocked.
    pub async fn reconcile(
        &self,
        accounts: &[Account],
        existing: &HashMap<String, bool>,
        locked: &HashMap<String, bool>,
    ) -> Vec<ReconciliationDecision> {
        let mut decisions = Vec::new();

        for account in accounts {
            if !existing.get(&account.username).copied().unwrap_or(false) {
                continue;
            }
            let is_locked = locked.get(&account.username).copied().unwrap_or(false);
            let Some(target) = decide(&account.lifecycle(), is_locked) else {
                continue;
            };

            let decision = self.apply(account, target).await;
            record_decision(decision.to_state.as_str(), decision.result.as_str());
            decisions.push(decision);
        }

        decisions
    }

    async fn apply(&self, account: &Account, target: TargetState) -> ReconciliationDecision {
        if !self.enforce {
            info!(
                user_id = account.id,
                username = %account.username,
                to_state = target.as_str(),
                "Dry run, state change not applied"
            );
            return ReconciliationDecision::planned(account.clone(), target);
        }

        let blocked = target == TargetState::Block;
        let action = if blocked { "block" } else { "unblock" };
        match self.accounts.set_account_blocked(account.id, blocked).await {
            Ok(()) => {
                info!(
                    user_id = account.id,
                    username = %account.username,
                    to_state = target.as_str(),
                    "Account state changed"
                );
                ReconciliationDecision::succeeded(account.clone(), target)
            }
            Err(e) => {
                error!(
                    user_id = account.id,
                    username = %account.username,
                    to_state = target.as_str(),
                    already_in_target_state = e.is_already_in_target_state(),
                    error = %e,
                    "Error at account directory {} request",
                    action
                );
                ReconciliationDecision::failed(account.clone(), target, e.to_string())
            }
        }
    }
}
