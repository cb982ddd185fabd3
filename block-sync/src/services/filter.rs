//! Working-set reduction ahead of the directory lookups.
//!
//! Stages run in a fixed order, each on the previous stage's output:
//! exclusion list, username pattern, identity binding. A stage only removes
//! accounts; relative order is preserved.

use regex::Regex;
use tracing::debug;

use crate::error::SyncError;
use crate::models::Account;
use crate::services::identity_directory::parse_domain;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Usernames dropped on exact match.
    pub exclude: Vec<String>,
    /// Usernames must match this pattern as a whole.
    pub pattern: Option<String>,
    /// Drop accounts without an identity bound to the configured domain.
    pub require_identity_binding: bool,
}

/// Split a comma-separated exclusion list, dropping blank entries.
pub fn parse_exclusions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Compile a username pattern anchored at both ends.
pub fn compile_pattern(pattern: &str) -> Result<Regex, SyncError> {
    Ok(Regex::new(&format!("^(?:{})$", pattern))?)
}

/// Apply `criteria` to `accounts`.
///
/// `domain` is the identity directory's root naming context; it is only
/// consulted when `require_identity_binding` is set.
pub fn apply(
    accounts: Vec<Account>,
    criteria: &FilterCriteria,
    domain: &str,
) -> Result<Vec<Account>, SyncError> {
    let pattern = match criteria.pattern.as_deref() {
        Some(p) if !p.trim().is_empty() => Some(compile_pattern(p)?),
        _ => None,
    };

    let mut accounts = accounts;
    let initial = accounts.len();

    if !criteria.exclude.is_empty() {
        accounts.retain(|a| !criteria.exclude.iter().any(|e| e == &a.username));
        debug!(before = initial, after = accounts.len(), "Applied exclusion list");
    }

    if let Some(pattern) = &pattern {
        let before = accounts.len();
        accounts.retain(|a| pattern.is_match(&a.username));
        debug!(before, after = accounts.len(), "Applied username pattern");
    }

    if criteria.require_identity_binding {
        let before = accounts.len();
        accounts.retain(|a| has_binding_in_domain(a, domain));
        debug!(before, after = accounts.len(), "Applied identity binding check");
    }

    Ok(accounts)
}

/// True when at least one identity's DN sits under `domain`.
///
/// Identities with a missing or blank external identifier, or one without a
/// domain component, never match.
pub fn has_binding_in_domain(account: &Account, domain: &str) -> bool {
    account.identities.iter().any(|identity| {
        identity
            .uid()
            .and_then(|uid| parse_domain(uid).ok())
            .is_some_and(|d| d.eq_ignore_ascii_case(domain))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountState, Identity};

    const DOMAIN: &str = "dc=corp,dc=com";

    fn account(id: u64, username: &str) -> Account {
        Account::new(id, username, AccountState::Active)
    }

    fn bound(id: u64, username: &str, dn: &str) -> Account {
        account(id, username).with_identity(Identity::new("ldapmain", dn))
    }

    fn usernames(accounts: &[Account]) -> Vec<&str> {
        accounts.iter().map(|a| a.username.as_str()).collect()
    }

    #[test]
    fn exclusions_are_parsed_and_trimmed() {
        assert_eq!(parse_exclusions("root, ghost ,,alert-bot,"), vec!["root", "ghost", "alert-bot"]);
        assert!(parse_exclusions(" , ").is_empty());
    }

    #[test]
    fn empty_criteria_keep_everything() {
        let accounts = vec![account(1, "a"), account(2, "b")];
        let result = apply(accounts.clone(), &FilterCriteria::default(), DOMAIN).unwrap();
        assert_eq!(result, accounts);
    }

    #[test]
    fn exclusion_is_exact_match() {
        let criteria = FilterCriteria {
            exclude: vec!["root".into()],
            ..Default::default()
        };
        let result = apply(
            vec![account(1, "root"), account(2, "rooter"), account(3, "Root")],
            &criteria,
            DOMAIN,
        )
        .unwrap();
        assert_eq!(usernames(&result), vec!["rooter", "Root"]);
    }

    #[test]
    fn pattern_is_a_full_match() {
        let criteria = FilterCriteria {
            pattern: Some("u[0-9]+".into()),
            ..Default::default()
        };
        let result = apply(
            vec![account(1, "u1"), account(2, "xu2"), account(3, "u3x"), account(4, "u44")],
            &criteria,
            DOMAIN,
        )
        .unwrap();
        assert_eq!(usernames(&result), vec!["u1", "u44"]);
    }

    #[test]
    fn alternation_pattern_is_anchored_as_a_whole() {
        let criteria = FilterCriteria {
            pattern: Some("a|b".into()),
            ..Default::default()
        };
        let result = apply(vec![account(1, "a"), account(2, "ab"), account(3, "b")], &criteria, DOMAIN)
            .unwrap();
        assert_eq!(usernames(&result), vec!["a", "b"]);
    }

    #[test]
    fn blank_pattern_is_ignored() {
        let criteria = FilterCriteria {
            pattern: Some("  ".into()),
            ..Default::default()
        };
        let result = apply(vec![account(1, "anything")], &criteria, DOMAIN).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn invalid_pattern_fails() {
        let criteria = FilterCriteria {
            pattern: Some("u[0-9".into()),
            ..Default::default()
        };
        let err = apply(vec![account(1, "u1")], &criteria, DOMAIN).unwrap_err();
        assert!(matches!(err, SyncError::InvalidPattern(_)));
    }

    #[test]
    fn identity_binding_requires_matching_domain() {
        let criteria = FilterCriteria {
            require_identity_binding: true,
            ..Default::default()
        };
        let accounts = vec![
            bound(1, "inside", "cn=inside,ou=Users,DC=Corp,DC=Com"),
            bound(2, "elsewhere", "cn=elsewhere,ou=Users,dc=other,dc=com"),
            account(3, "unbound"),
            bound(4, "no-dc", "cn=no-dc,o=corp"),
            bound(5, "blank", "  "),
            account(6, "second")
                .with_identity(Identity::new("github", "12345"))
                .with_identity(Identity::new("ldapmain", "cn=second,dc=corp,dc=com")),
        ];

        let result = apply(accounts, &criteria, DOMAIN).unwrap();
        assert_eq!(usernames(&result), vec!["inside", "second"]);
    }

    #[test]
    fn identity_without_uid_is_unbound() {
        let criteria = FilterCriteria {
            require_identity_binding: true,
            ..Default::default()
        };
        let mut null_uid = account(1, "null-uid");
        null_uid.identities.push(Identity {
            provider: "github".into(),
            extern_uid: None,
        });
        let mixed = bound(2, "mixed", "cn=mixed,dc=corp,dc=com").with_identity(Identity {
            provider: "github".into(),
            extern_uid: None,
        });

        let result = apply(vec![null_uid, mixed], &criteria, DOMAIN).unwrap();
        assert_eq!(usernames(&result), vec!["mixed"]);
    }

    #[test]
    fn pattern_whitespace_is_significant() {
        let criteria = FilterCriteria {
            pattern: Some(" u[0-9]+".into()),
            ..Default::default()
        };
        let result = apply(vec![account(1, "u1"), account(2, " u2")], &criteria, DOMAIN).unwrap();
        assert_eq!(usernames(&result), vec![" u2"]);
    }

    #[test]
    fn exclusion_runs_before_pattern() {
        let criteria = FilterCriteria {
            exclude: vec!["u1".into()],
            pattern: Some("u[0-9]+".into()),
            require_identity_binding: false,
        };
        let result = apply(
            vec![account(1, "u1"), account(2, "u2"), account(3, "admin"), account(4, "u3")],
            &criteria,
            DOMAIN,
        )
        .unwrap();
        assert_eq!(usernames(&result), vec!["u2", "u3"]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let criteria = FilterCriteria {
            exclude: vec!["u1".into()],
            pattern: Some("u[0-9]+".into()),
            require_identity_binding: true,
        };
        let accounts = vec![
            bound(1, "u1", "cn=u1,dc=corp,dc=com"),
            bound(2, "u2", "cn=u2,dc=corp,dc=com"),
            bound(3, "bob", "cn=bob,dc=corp,dc=com"),
            account(4, "u4"),
            bound(5, "u5", "cn=u5,dc=corp,dc=com"),
        ];

        let once = apply(accounts, &criteria, DOMAIN).unwrap();
        let twice = apply(once.clone(), &criteria, DOMAIN).unwrap();
        assert_eq!(once, twice);
        assert_eq!(usernames(&once), vec!["u2", "u5"]);
    }
}
