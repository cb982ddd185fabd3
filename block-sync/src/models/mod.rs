//! Domain models for block-sync.

use serde::{Deserialize, Serialize};

// ============================================================================
// Account Directory Models
// ============================================================================

/// Link between an account and an entry in an external identity system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub provider: String,
    /// Distinguished name of the bound entry, e.g.
    /// `cn=John,ou=Users,dc=mycompany,dc=com`. Missing or `null` for some
    /// providers.
    #[serde(default, alias = "external_uid")]
    pub extern_uid: Option<String>,
}

impl Identity {
    pub fn new(provider: impl Into<String>, extern_uid: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            extern_uid: Some(extern_uid.into()),
        }
    }

    /// The external identifier, if present and not blank.
    pub fn uid(&self) -> Option<&str> {
        self.extern_uid
            .as_deref()
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
    }
}

/// An account as listed by the account directory.
///
/// Unknown fields in the listing are ignored; `id`, `username` and `state`
/// are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub username: String,
    pub state: String,
    #[serde(default)]
    pub identities: Vec<Identity>,
}

impl Account {
    pub fn new(id: u64, username: impl Into<String>, state: AccountState) -> Self {
        Self {
            id,
            username: username.into(),
            state: state.as_str().to_string(),
            identities: Vec::new(),
        }
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identities.push(identity);
        self
    }

    pub fn lifecycle(&self) -> AccountState {
        AccountState::from_str(&self.state)
    }
}

/// Lifecycle state reported by the account directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountState {
    Active,
    Blocked,
    Other(String),
}

impl AccountState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Blocked => "blocked",
            Self::Other(s) => s,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "blocked" => Self::Blocked,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Structured error payload returned by the account directory.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl ErrorResponse {
    /// The most specific non-blank message, description first.
    pub fn message(&self) -> Option<&str> {
        [&self.error_description, &self.error]
            .into_iter()
            .filter_map(|m| m.as_deref())
            .find(|m| !m.trim().is_empty())
    }
}

// ============================================================================
// Reconciliation Models
// ============================================================================

/// The state an account should be moved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetState {
    None,
    Block,
    Unblock,
}

impl TargetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Block => "BLOCK",
            Self::Unblock => "UNBLOCK",
        }
    }
}

/// What happened when the target state was (or was not) applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    None,
    Success,
    Fail,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Success => "SUCCESS",
            Self::Fail => "FAIL",
        }
    }
}

/// One per diverging account per run.
///
/// Serialises as `{"to_state", "result", "user"}`; the failure message is kept
/// for logging and callers but is not part of the run output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationDecision {
    pub to_state: TargetState,
    pub result: Outcome,
    pub user: Account,
    #[serde(skip)]
    pub error: Option<String>,
}

impl ReconciliationDecision {
    pub fn planned(user: Account, to_state: TargetState) -> Self {
        Self {
            to_state,
            result: Outcome::None,
            user,
            error: None,
        }
    }

    pub fn succeeded(user: Account, to_state: TargetState) -> Self {
        Self {
            to_state,
            result: Outcome::Success,
            user,
            error: None,
        }
    }

    pub fn failed(user: Account, to_state: TargetState, error: impl Into<String>) -> Self {
        Self {
            to_state,
            result: Outcome::Fail,
            user,
            error: Some(error.into()),
        }
    }
}
