use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::engine::errors::{EngineError, EngineResult};

static TENANT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,62}$").expect("valid tenant regex"));

const RESERVED: [&str; 2] = ["main", "temp"];

/// Validated tenant ("company") namespace.
///
/// Every table reference goes through [`Tenant::table`], so a tenant name is
/// the only identifier spliced into SQL text and it is checked once here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Tenant(String);

impl Tenant {
    pub fn parse(name: &str) -> EngineResult<Self> {
        if !TENANT_NAME.is_match(name) || RESERVED.contains(&name) {
            return Err(EngineError::InvalidTenant(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quoted schema name, e.g. `"acme"`.
    pub fn schema(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Fully qualified table name, e.g. `"acme".jira_issues`.
    pub fn table(&self, name: &str) -> String {
        format!("\"{}\".{}", self.0, name)
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Tenant {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Tenant::parse(&raw).map_err(serde::de::Error::custom)
    }
}
