use super::principal::{validate_account, validate_target};
use super::{Privilege, PrivilegeSet, Target};
use crate::error::ReconcileError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// System schemas that are never managed by a grant.
pub const RESERVED_DATABASES: &[&str] = &["master", "rdsadmin", "mysql.sys"];

/// MySQL limits database names to 64 characters.
pub const MAX_DATABASE_LENGTH: usize = 64;

/// A set of privileges bound to an account on one database.
///
/// ```yaml
/// grants:
///   - user: app
///     host: "%"
///     database: app_db
///     privileges:
///       - SELECT
///       - INSERT
///       - UPDATE
/// ```
///
/// The account is referenced, not owned: the principal must already exist.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Grant {
    pub user: String,
    pub host: String,
    pub database: String,
    #[serde(default)]
    pub privileges: Vec<String>,
    #[serde(default, skip_serializing_if = "Target::is_empty")]
    pub target: Target,
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.* to '{}'@'{}'", self.database, self.user, self.host)
    }
}

impl Grant {
    pub fn new(user: &str, host: &str, database: &str, privileges: &[&str], target: Target) -> Self {
        Self {
            user: user.to_string(),
            host: host.to_string(),
            database: database.to_string(),
            privileges: privileges.iter().map(|p| p.to_string()).collect(),
            target,
        }
    }

    /// Canonical privilege set, independent of declaration order and case.
    pub fn privilege_set(&self) -> PrivilegeSet {
        self.privileges.iter().collect()
    }

    /// Grants are keyed by the account and the database.
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.user, &self.host, &self.database)
    }

    pub fn requires_replace(&self, prior: &Grant) -> bool {
        self.key() != prior.key() || self.target != prior.target
    }

    pub fn validate(&self) -> Result<(), ReconcileError> {
        validate_account(&self.user, &self.host)?;

        if self.database.is_empty() {
            return Err(ReconcileError::validation("database", "must not be empty"));
        }

        if self.database.chars().count() > MAX_DATABASE_LENGTH {
            return Err(ReconcileError::validation(
                "database",
                format!("must be at most {} characters", MAX_DATABASE_LENGTH),
            ));
        }

        if RESERVED_DATABASES.contains(&self.database.as_str()) {
            return Err(ReconcileError::validation(
                "database",
                format!("{:?} is a reserved system schema", self.database),
            ));
        }

        self.validate_privileges()?;

        validate_target(&self.target)
    }

    fn validate_privileges(&self) -> Result<(), ReconcileError> {
        if self.privileges.is_empty() {
            return Err(ReconcileError::validation("privileges", "must not be empty"));
        }

        let mut seen = HashSet::new();
        for privilege in self.privileges.iter().map(|p| Privilege::new(p)) {
            privilege
                .validate()
                .map_err(|e| ReconcileError::validation("privileges", e.to_string()))?;

            // never listed back by `SHOW GRANTS` on a database
            if privilege.name() == "USAGE" {
                return Err(ReconcileError::validation(
                    "privileges",
                    "USAGE grants nothing on a database",
                ));
            }

            // MySQL folds every other privilege into it
            if privilege.name() == "ALL PRIVILEGES" && self.privileges.len() > 1 {
                return Err(ReconcileError::validation(
                    "privileges",
                    "ALL PRIVILEGES cannot be combined with other privileges",
                ));
            }

            if !seen.insert(privilege.name().to_string()) {
                return Err(ReconcileError::validation(
                    "privileges",
                    format!("duplicated privilege: {}", privilege),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Target {
        Target::new(
            "arn:aws:rds:us-east-1:123456789012:cluster:main",
            "arn:aws:secretsmanager:us-east-1:123456789012:secret:admin-AbCdEf",
        )
    }

    #[test]
    fn test_grant_validate() {
        let grant = Grant::new("test", "%", "integration_test", &["SELECT", "INSERT"], target());
        assert!(grant.validate().is_ok());
    }

    #[test]
    fn test_grant_validate_rejects() {
        let cases = vec![
            (Grant::new("", "%", "db", &["SELECT"], target()), "user"),
            (Grant::new("sys", "%", "db", &["SELECT"], target()), "user"),
            (Grant::new("test", "%", "", &["SELECT"], target()), "database"),
            (Grant::new("test", "%", "mysql.sys", &["SELECT"], target()), "database"),
            (Grant::new("test", "%", "rdsadmin", &["SELECT"], target()), "database"),
            (Grant::new("test", "%", "db", &[], target()), "privileges"),
            (Grant::new("test", "%", "db", &["SELECT", ""], target()), "privileges"),
            (Grant::new("test", "%", "db", &["SELECT", "select"], target()), "privileges"),
            (Grant::new("test", "%", "db", &["SELECT'"], target()), "privileges"),
            (Grant::new("test", "%", "db", &["ALL", "SELECT"], target()), "privileges"),
            (Grant::new("test", "%", "db", &["SELECT", "all privileges"], target()), "privileges"),
            (Grant::new("test", "%", "db", &["USAGE"], target()), "privileges"),
            (Grant::new("test", "%", "db", &["SELECT"], Target::default()), "target"),
        ];

        for (grant, expected) in cases {
            match grant.validate() {
                Err(ReconcileError::Validation { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected validation error on {}, got {:?}", expected, other),
            }
        }
    }

    #[test]
    fn test_grant_validate_accepts_grant_option() {
        let grant = Grant::new("test", "%", "db", &["SELECT", "GRANT OPTION"], target());
        assert!(grant.validate().is_ok());

        let grant = Grant::new("test", "%", "db", &["ALL"], target());
        assert!(grant.validate().is_ok());
    }

    #[test]
    fn test_grant_privilege_set() {
        let grant = Grant::new("test", "%", "db", &["update", "SELECT", "Insert"], target());
        assert_eq!(grant.privilege_set().to_string(), "SELECT,INSERT,UPDATE");
    }

    #[test]
    fn test_grant_requires_replace() {
        let prior = Grant::new("test", "%", "db", &["SELECT"], target());

        let mut desired = prior.clone();
        desired.privileges = vec!["INSERT".to_string()];
        assert!(!desired.requires_replace(&prior));

        desired.database = "other".to_string();
        assert!(desired.requires_replace(&prior));
    }
}
