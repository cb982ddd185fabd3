//! Ordered collection of a run's decisions.

use serde::Serialize;

use crate::models::{Outcome, ReconciliationDecision, TargetState};

/// Collects decisions in emission order, one per account.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    decisions: Vec<ReconciliationDecision>,
}

/// Counts per target state and outcome.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub block: usize,
    pub unblock: usize,
    pub success: usize,
    pub fail: usize,
    pub dry_run: usize,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one decision. Decisions without a target state are dropped.
    pub fn record(&mut self, decision: ReconciliationDecision) {
        if decision.to_state != TargetState::None {
            self.decisions.push(decision);
        }
    }

    pub fn extend<I: IntoIterator<Item = ReconciliationDecision>>(&mut self, decisions: I) {
        for decision in decisions {
            self.record(decision);
        }
    }

    pub fn decisions(&self) -> &[ReconciliationDecision] {
        &self.decisions
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for decision in &self.decisions {
            match decision.to_state {
                TargetState::Block => summary.block += 1,
                TargetState::Unblock => summary.unblock += 1,
                TargetState::None => {}
            }
            match decision.result {
                Outcome::Success => summary.success += 1,
                Outcome::Fail => summary.fail += 1,
                Outcome::None => summary.dry_run += 1,
            }
        }
        summary
    }

    pub fn into_decisions(self) -> Vec<ReconciliationDecision> {
        self.decisions
    }

    /// The run output: a JSON array of `{to_state, result, user}`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.decisions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AccountState};

    fn account(id: u64, state: AccountState) -> Account {
        Account::new(id, format!("u{}", id), state)
    }

    #[test]
    fn empty_run_is_an_empty_array() {
        let aggregator = ResultAggregator::new();
        assert_eq!(aggregator.to_json().unwrap(), "[]");
        assert_eq!(aggregator.summary(), RunSummary::default());
    }

    #[test]
    fn keeps_emission_order_and_drops_none_targets() {
        let mut aggregator = ResultAggregator::new();
        aggregator.extend([
            ReconciliationDecision::failed(account(3, AccountState::Active), TargetState::Block, "x"),
            ReconciliationDecision::planned(account(4, AccountState::Active), TargetState::None),
            ReconciliationDecision::succeeded(account(1, AccountState::Blocked), TargetState::Unblock),
        ]);

        let ids: Vec<u64> = aggregator.decisions().iter().map(|d| d.user.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(
            aggregator.summary(),
            RunSummary {
                block: 1,
                unblock: 1,
                success: 1,
                fail: 1,
                dry_run: 0,
            }
        );
    }

    #[test]
    fn json_output_shape() {
        let mut aggregator = ResultAggregator::new();
        aggregator.record(ReconciliationDecision::planned(
            account(1, AccountState::Active),
            TargetState::Block,
        ));

        let value: serde_json::Value = serde_json::from_str(&aggregator.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{
                "to_state": "BLOCK",
                "result": "NONE",
                "user": {"id": 1, "username": "u1", "state": "active", "identities": []}
            }])
        );
    }
}
