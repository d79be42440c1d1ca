//! Runtime settings for the DB-Library extension.

use crate::errors::{Result, SybaseError};
use std::str::FromStr;

pub const DEFAULT_MIN_SEVERITY: i32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbLibConfig {
    /// Seconds to wait for a login; DB-Library default when `None`.
    pub login_timeout: Option<u32>,
    /// Seconds to wait for a command; DB-Library default when `None`.
    pub query_timeout: Option<u32>,
    /// DB-Library errors below this severity are not recorded.
    pub min_error_severity: i32,
    /// Server messages below this severity are ignored.
    pub min_message_severity: i32,
    /// When `false`, persistent connects open ordinary links.
    pub allow_persistent: bool,
    /// Upper bound on open links, persistent ones included.
    pub max_links: Option<usize>,
}

impl Default for DbLibConfig {
    fn default() -> Self {
        DbLibConfig {
            login_timeout: None,
            query_timeout: None,
            min_error_severity: DEFAULT_MIN_SEVERITY,
            min_message_severity: DEFAULT_MIN_SEVERITY,
            allow_persistent: true,
            max_links: None,
        }
    }
}

impl DbLibConfig {
    /// Reads `SYBASE_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = DbLibConfig::default();
        Ok(DbLibConfig {
            login_timeout: parse(&lookup, "SYBASE_LOGIN_TIMEOUT")?,
            query_timeout: parse(&lookup, "SYBASE_QUERY_TIMEOUT")?,
            min_error_severity: parse(&lookup, "SYBASE_MIN_ERROR_SEVERITY")?
                .unwrap_or(defaults.min_error_severity),
            min_message_severity: parse(&lookup, "SYBASE_MIN_MESSAGE_SEVERITY")?
                .unwrap_or(defaults.min_message_severity),
            allow_persistent: parse_flag(&lookup, "SYBASE_ALLOW_PERSISTENT")?
                .unwrap_or(defaults.allow_persistent),
            max_links: parse(&lookup, "SYBASE_MAX_LINKS")?,
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SybaseError::Config { key, value }),
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<bool>> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "on" | "true" | "yes" => Ok(Some(true)),
            "0" | "off" | "false" | "no" | "" => Ok(Some(false)),
            _ => Err(SybaseError::Config { key, value }),
        },
    }
}
