use anyhow::{anyhow, Context, Result};
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::{fmt, fs};

use super::target::expand;
pub use super::{Grant, Principal, Target};

static REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d$").expect("REGION is a valid regex pattern")
});

pub const DEFAULT_STATE_FILE: &str = "rds-grant.state.yaml";

/// Configuration contains everything needed to reach the cluster, the
/// principals (MySQL accounts) and the grants bound to them.
///  - `region`: the AWS region of the RDS Data API, optional.
///  - `state`: where the last-applied snapshot is kept, relative to the
///  config file. Defaults to `rds-grant.state.yaml`.
///  - `target`: the default [Target] for every principal and grant.
///  - `principals`: the accounts.
///  - `grants`: the privileges of the accounts on each database.
///
/// For example:
///
/// ```yaml
/// region: us-east-1
/// target:
///   resource_arn: arn:aws:rds:us-east-1:123456789012:cluster:main
///   secret_arn: arn:aws:secretsmanager:us-east-1:123456789012:secret:admin-AbCdEf
///
/// principals:
///   - user: app
///     host: "%"
///     password: ${APP_PASSWORD}
///
/// grants:
///   - user: app
///     host: "%"
///     database: app_db
///     privileges:
///       - SELECT
///       - INSERT
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Target::is_empty")]
    pub target: Target,
    #[serde(default)]
    pub principals: Vec<Principal>,
    #[serde(default)]
    pub grants: Vec<Grant>,
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let yaml = serde_yaml::to_string(&self).map_err(|_| fmt::Error)?;
        write!(f, "{}", yaml)
    }
}

impl std::str::FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(s)?;
        let config = config.resolve_targets();

        // Validate
        config.validate()?;

        Ok(config)
    }
}

impl Config {
    pub fn new(config_path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(config_path).context("failed to read config file")?;
        let config: Config = serde_yaml::from_str(&config_str)?;

        // expand env variables before validating, the password length
        // check only makes sense on the expanded value
        let mut config = config.expand_env_vars().resolve_targets();

        config.validate()?;

        // keep the state next to the config file
        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let state = config
            .state
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE));
        config.state = Some(base.join(state));

        Ok(config)
    }

    /// Path of the state file, when the config was loaded from disk.
    pub fn state_path(&self) -> PathBuf {
        self.state
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(region) = &self.region {
            if !REGION.is_match(region) {
                return Err(anyhow!("invalid region: {:?}", region));
            }
        }

        if !self.target.is_empty() {
            self.target.validate()?;
        }

        // Validate principals
        for principal in &self.principals {
            principal
                .validate()
                .with_context(|| format!("invalid principal {}", principal))?;
        }
        // Validate principals are unique by (user, host)
        let mut accounts = HashSet::new();
        for principal in &self.principals {
            if !accounts.insert((principal.user.as_str(), principal.host.as_str())) {
                return Err(anyhow!("duplicated principal: {}", principal));
            }
        }

        // Validate grants
        for grant in &self.grants {
            grant
                .validate()
                .with_context(|| format!("invalid grant {}", grant))?;
        }
        // Validate grants are unique by (user, host, database)
        let mut keys = HashSet::new();
        for grant in &self.grants {
            if !keys.insert(grant.key()) {
                return Err(anyhow!("duplicated grant: {}", grant));
            }
        }

        // The account may be managed somewhere else, so this is not an error
        for grant in &self.grants {
            if !accounts.contains(&(grant.user.as_str(), grant.host.as_str())) {
                warn!(
                    "grant {} references an account that is not declared in this config",
                    grant
                );
            }
        }

        Ok(())
    }

    // Every resource without its own target inherits the top-level one
    fn resolve_targets(mut self) -> Self {
        for principal in &mut self.principals {
            if principal.target.is_empty() {
                principal.target = self.target.clone();
            }
        }
        for grant in &mut self.grants {
            if grant.target.is_empty() {
                grant.target = self.target.clone();
            }
        }

        self
    }

    // Expand env variables in targets and passwords
    fn expand_env_vars(mut self) -> Self {
        self.target = self.target.expand_env_vars();
        for principal in &mut self.principals {
            principal.target = principal.target.expand_env_vars();
            principal.password = expand(&principal.password);
        }
        for grant in &mut self.grants {
            grant.target = grant.target.expand_env_vars();
        }

        self
    }
}
