//! Configuration module for block-sync.

use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use sync_core::config as core_config;
use sync_core::error::AppError;
use sync_core::http::HttpSettings;

use crate::services::filter::{parse_exclusions, FilterCriteria};

pub const DEFAULT_ACCOUNT_ATTRIBUTE: &str = "sAMAccountName";

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub account_directory: AccountDirectoryConfig,
    pub identity_directory: IdentityDirectoryConfig,
    pub filter: FilterCriteria,
    pub enforce: bool,
    pub metrics_textfile: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AccountDirectoryConfig {
    pub url: String,
    pub token: SecretString,
    pub http: HttpSettings,
    pub max_pages: u32,
}

#[derive(Debug, Clone)]
pub struct IdentityDirectoryConfig {
    pub url: String,
    pub bind_dn: Option<String>,
    pub bind_password: Option<SecretString>,
    pub search_base: String,
    pub account_attribute: String,
    pub starttls: bool,
    pub timeout: Duration,
    pub batch_size: usize,
}

impl IdentityDirectoryConfig {
    /// Bind credentials, or `None` for an anonymous bind.
    pub fn credentials(&self) -> Option<(&str, &SecretString)> {
        match (&self.bind_dn, &self.bind_password) {
            (Some(dn), Some(password)) => Some((dn.as_str(), password)),
            _ => None,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the job settings from an arbitrary key lookup.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            value(key).ok_or_else(|| AppError::config(format!("{} is required", key)))
        };

        let ca_certificate = value("ACCOUNT_DIRECTORY_CA_CERT").map(PathBuf::from);
        let accept_invalid_certs = parse_or(&value, "ACCOUNT_DIRECTORY_ACCEPT_INVALID_CERTS", false)?;
        if ca_certificate.is_some() && accept_invalid_certs {
            return Err(AppError::config(
                "ACCOUNT_DIRECTORY_CA_CERT and ACCOUNT_DIRECTORY_ACCEPT_INVALID_CERTS cannot be combined",
            ));
        }

        let max_pages: u32 = parse_or(&value, "ACCOUNT_DIRECTORY_MAX_PAGES", 10_000)?;
        let batch_size: usize = parse_or(&value, "IDENTITY_DIRECTORY_BATCH_SIZE", 500)?;
        if max_pages == 0 || batch_size == 0 {
            return Err(AppError::config(
                "ACCOUNT_DIRECTORY_MAX_PAGES and IDENTITY_DIRECTORY_BATCH_SIZE must be positive",
            ));
        }

        Ok(Self {
            common,
            service_name: value("SERVICE_NAME").unwrap_or_else(|| "block-sync".to_string()),
            account_directory: AccountDirectoryConfig {
                url: required("ACCOUNT_DIRECTORY_URL")?
                    .trim_end_matches('/')
                    .to_string(),
                token: SecretString::new(required("ACCOUNT_DIRECTORY_TOKEN")?),
                http: HttpSettings {
                    timeout: Duration::from_secs(parse_or(
                        &value,
                        "ACCOUNT_DIRECTORY_TIMEOUT_SECS",
                        30,
                    )?),
                    ca_certificate,
                    accept_invalid_certs,
                },
                max_pages,
            },
            identity_directory: IdentityDirectoryConfig {
                url: required("IDENTITY_DIRECTORY_URL")?,
                bind_dn: value("IDENTITY_DIRECTORY_BIND_DN"),
                bind_password: value("IDENTITY_DIRECTORY_BIND_PASSWORD").map(SecretString::new),
                search_base: required("IDENTITY_DIRECTORY_SEARCH_BASE")?,
                account_attribute: value("IDENTITY_DIRECTORY_ACCOUNT_ATTRIBUTE")
                    .unwrap_or_else(|| DEFAULT_ACCOUNT_ATTRIBUTE.to_string()),
                starttls: parse_or(&value, "IDENTITY_DIRECTORY_STARTTLS", false)?,
                timeout: Duration::from_secs(parse_or(
                    &value,
                    "IDENTITY_DIRECTORY_TIMEOUT_SECS",
                    30,
                )?),
                batch_size,
            },
            filter: FilterCriteria {
                exclude: value("SYNC_EXCLUDE")
                    .map(|s| parse_exclusions(&s))
                    .unwrap_or_default(),
                pattern: value("SYNC_USERNAME_PATTERN"),
                require_identity_binding: parse_or(&value, "SYNC_REQUIRE_IDENTITY_BINDING", false)?,
            },
            enforce: parse_or(&value, "SYNC_ENFORCE", false)?,
            metrics_textfile: value("METRICS_TEXTFILE_PATH").map(PathBuf::from),
        })
    }
}

fn parse_or<T, F>(value: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match value(key) {
        Some(raw) => raw
            .trim()
            .to_ascii_lowercase()
            .parse()
            .map_err(|e| AppError::config(format!("{} value <{}> is invalid: {}", key, raw, e))),
        None => Ok(default),
    }
}
