use crate::config::{Grant, Principal};
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Last-applied principal. The password is replaced by its fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrincipalRecord {
    #[serde(flatten)]
    pub principal: Principal,
    pub password_md5: String,
}

impl PrincipalRecord {
    /// `desired` must still carry its password.
    pub fn applied(desired: &Principal) -> Self {
        Self {
            principal: desired.without_password(),
            password_md5: desired.password_md5(),
        }
    }
}

/// The snapshot consumed as prior state on the next run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct State {
    #[serde(default)]
    pub principals: Vec<PrincipalRecord>,
    #[serde(default)]
    pub grants: Vec<Grant>,
}

impl State {
    /// Load the state, a missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("no state at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("could not read state file `{}`", path.display()))?;
        let state = serde_yaml::from_str(&content)
            .with_context(|| format!("could not parse state file `{}`", path.display()))?;

        Ok(state)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)
            .with_context(|| format!("could not write state file `{}`", path.display()))?;

        debug!("state saved to {}", path.display());
        Ok(())
    }

    pub fn principal(&self, user: &str, host: &str) -> Option<&PrincipalRecord> {
        self.principals
            .iter()
            .find(|r| r.principal.user == user && r.principal.host == host)
    }

    pub fn put_principal(&mut self, record: PrincipalRecord) {
        self.remove_principal(&record.principal.user, &record.principal.host);
        self.principals.push(record);
    }

    pub fn remove_principal(&mut self, user: &str, host: &str) {
        self.principals
            .retain(|r| !(r.principal.user == user && r.principal.host == host));
    }

    pub fn grant(&self, user: &str, host: &str, database: &str) -> Option<&Grant> {
        self.grants
            .iter()
            .find(|g| g.key() == (user, host, database))
    }

    pub fn put_grant(&mut self, grant: Grant) {
        self.remove_grant(&grant.user, &grant.host, &grant.database);
        self.grants.push(grant);
    }

    pub fn remove_grant(&mut self, user: &str, host: &str, database: &str) {
        self.grants.retain(|g| g.key() != (user, host, database));
    }
}
