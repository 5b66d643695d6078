use anyhow::{anyhow, Result};
use envmnt::{ExpandOptions, ExpansionType};
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static RESOURCE_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws[a-z-]*:rds:[a-z0-9-]+:\d{12}:cluster:[A-Za-z0-9-]+$")
        .expect("RESOURCE_ARN is a valid regex pattern")
});

static SECRET_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws[a-z-]*:secretsmanager:[a-z0-9-]+:\d{12}:secret:[A-Za-z0-9/_+=.@-]+$")
        .expect("SECRET_ARN is a valid regex pattern")
});

/// Where a statement runs and which stored credential authorizes it.
/// The user behind the secret should have the permission to create users
/// and grant privileges.
///
/// For example:
/// ```yaml
/// target:
///   resource_arn: arn:aws:rds:us-east-1:123456789012:cluster:main
///   secret_arn: arn:aws:secretsmanager:us-east-1:123456789012:secret:admin-AbCdEf
/// ```
///
/// Both fields are immutable once a resource is created: changing either
/// one means the resource lives somewhere else and must be replaced.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, Default)]
pub struct Target {
    pub resource_arn: String,
    pub secret_arn: String,
}

impl Target {
    pub fn new(resource_arn: impl Into<String>, secret_arn: impl Into<String>) -> Self {
        Self {
            resource_arn: resource_arn.into(),
            secret_arn: secret_arn.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.resource_arn.is_empty() && self.secret_arn.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if !RESOURCE_ARN.is_match(&self.resource_arn) {
            return Err(anyhow!(
                "invalid resource_arn: {:?}, expected an RDS cluster ARN",
                self.resource_arn
            ));
        }

        if !SECRET_ARN.is_match(&self.secret_arn) {
            return Err(anyhow!(
                "invalid secret_arn: {:?}, expected a Secrets Manager secret ARN",
                self.secret_arn
            ));
        }

        Ok(())
    }

    // Expand environment variables in both ARNs.
    // For example: arn:aws:rds:${AWS_REGION}:${ACCOUNT_ID}:cluster:main
    pub fn expand_env_vars(&self) -> Self {
        Self {
            resource_arn: expand(&self.resource_arn),
            secret_arn: expand(&self.secret_arn),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.resource_arn, self.secret_arn)
    }
}

/// Expand `${VAR}` / `${VAR:default}` references in `value`.
pub(crate) fn expand(value: &str) -> String {
    let options = ExpandOptions {
        expansion_type: Some(ExpansionType::UnixBracketsWithDefaults),
        default_to_empty: false,
    };

    let expanded = envmnt::expand(value, Some(options));

    // Most likely, the user forgot to export the environment variables.
    if expanded.contains("${") {
        warn!(
            "value may not have fully expanded environment variables: {}",
            expanded
        );
    }

    expanded
}
