use super::Target;
use crate::error::ReconcileError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// System accounts that are never managed as ordinary principals.
pub const RESERVED_USERS: &[&str] = &["rdsadmin", "mysql.sys", "sys"];

/// MySQL limits account names to 32 characters.
pub const MAX_USER_LENGTH: usize = 32;

pub const MIN_PASSWORD_LENGTH: usize = 16;

// Dot separated hostname labels, or a trailing `%` wildcard.
static HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\-]*[a-zA-Z0-9])\.)*([A-Za-z0-9]|[A-Za-z0-9][A-Za-z0-9\-]*[A-Za-z0-9]|%)$",
    )
    .expect("HOST is a valid regex pattern")
});

/// A MySQL account.
///
/// ```yaml
/// principals:
///   - user: app
///     host: "%"
///     password: ${APP_PASSWORD}
/// ```
///
/// `(user, host)` is the identity. The password is write-only: it is never
/// serialized and never populated from a read.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Principal {
    pub user: String,
    pub host: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Target::is_empty")]
    pub target: Target,
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("user", &self.user)
            .field("host", &self.host)
            .field("password", &"[REDACTED]")
            .field("target", &self.target)
            .finish()
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "'{}'@'{}'", self.user, self.host)
    }
}

impl Principal {
    pub fn new(user: &str, host: &str, password: &str, target: Target) -> Self {
        Self {
            user: user.to_string(),
            host: host.to_string(),
            password: password.to_string(),
            target,
        }
    }

    /// Observed state is the desired state minus the password.
    pub fn without_password(&self) -> Self {
        Self {
            password: String::new(),
            ..self.clone()
        }
    }

    /// A read that found nothing blanks the identity.
    pub fn is_blank(&self) -> bool {
        self.user.is_empty() && self.host.is_empty()
    }

    /// Changing any of these moves the account, so it has to be recreated.
    pub fn requires_replace(&self, prior: &Principal) -> bool {
        self.user != prior.user || self.host != prior.host || self.target != prior.target
    }

    /// Fingerprint kept in the state file in place of the password.
    pub fn password_md5(&self) -> String {
        format!("{:x}", md5::compute(format!("{}{}", self.password, self.user)))
    }

    pub fn validate(&self) -> Result<(), ReconcileError> {
        validate_account(&self.user, &self.host)?;
        validate_password(&self.password)?;
        validate_target(&self.target)
    }
}

pub(crate) fn validate_account(user: &str, host: &str) -> Result<(), ReconcileError> {
    if user.is_empty() {
        return Err(ReconcileError::validation("user", "must not be empty"));
    }

    if user.chars().count() > MAX_USER_LENGTH {
        return Err(ReconcileError::validation(
            "user",
            format!("must be at most {} characters", MAX_USER_LENGTH),
        ));
    }

    if RESERVED_USERS.contains(&user) {
        return Err(ReconcileError::validation(
            "user",
            format!("{:?} is a reserved system account", user),
        ));
    }

    if !HOST.is_match(host) {
        return Err(ReconcileError::validation(
            "host",
            format!("{:?} must be a valid hostname or the `%` wildcard", host),
        ));
    }

    Ok(())
}

pub(crate) fn validate_password(password: &str) -> Result<(), ReconcileError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ReconcileError::validation(
            "password",
            format!("must be at least {} characters long", MIN_PASSWORD_LENGTH),
        ));
    }

    // its escaping depends on the server's sql_mode
    if password.contains('\\') {
        return Err(ReconcileError::validation(
            "password",
            "must not contain a backslash",
        ));
    }

    Ok(())
}

pub(crate) fn validate_target(target: &Target) -> Result<(), ReconcileError> {
    target
        .validate()
        .map_err(|e| ReconcileError::validation("target", e.to_string()))
}
