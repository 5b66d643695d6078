//! SQL text for every lifecycle step of principals and grants.
//!
//! Rendering is pure. String values are emitted as single-quoted literals
//! with `\` and `'` escaped; database names that are not plain identifiers
//! are backtick-quoted. Values that passed validation render unchanged.

use crate::config::{Grant, Principal, PrivilegeSet};
use std::fmt;

const REDACTED: &str = "'********'";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement<'a> {
    /// `IF NOT EXISTS` keeps a retried create from failing.
    CreatePrincipal {
        user: &'a str,
        host: &'a str,
        password: &'a str,
    },
    UpdatePrincipalSecret {
        user: &'a str,
        host: &'a str,
        password: &'a str,
    },
    /// `IF EXISTS` makes a second delete a no-op.
    DeletePrincipal { user: &'a str, host: &'a str },
    ReadPrincipal { user: &'a str, host: &'a str },
    GrantPrivileges {
        user: &'a str,
        host: &'a str,
        database: &'a str,
        privileges: &'a PrivilegeSet,
    },
    RevokeAllPrivileges {
        user: &'a str,
        host: &'a str,
        database: &'a str,
    },
    /// Revokes only what was last granted, never more.
    RevokeExactPrivileges {
        user: &'a str,
        host: &'a str,
        database: &'a str,
        privileges: &'a PrivilegeSet,
    },
    ReadGrants { user: &'a str, host: &'a str },
}

impl<'a> Statement<'a> {
    pub fn create_principal(principal: &'a Principal) -> Self {
        Statement::CreatePrincipal {
            user: &principal.user,
            host: &principal.host,
            password: &principal.password,
        }
    }

    pub fn update_principal_secret(principal: &'a Principal) -> Self {
        Statement::UpdatePrincipalSecret {
            user: &principal.user,
            host: &principal.host,
            password: &principal.password,
        }
    }

    pub fn delete_principal(principal: &'a Principal) -> Self {
        Statement::DeletePrincipal {
            user: &principal.user,
            host: &principal.host,
        }
    }

    pub fn read_principal(principal: &'a Principal) -> Self {
        Statement::ReadPrincipal {
            user: &principal.user,
            host: &principal.host,
        }
    }

    pub fn grant_privileges(grant: &'a Grant, privileges: &'a PrivilegeSet) -> Self {
        Statement::GrantPrivileges {
            user: &grant.user,
            host: &grant.host,
            database: &grant.database,
            privileges,
        }
    }

    pub fn revoke_all_privileges(grant: &'a Grant) -> Self {
        Statement::RevokeAllPrivileges {
            user: &grant.user,
            host: &grant.host,
            database: &grant.database,
        }
    }

    pub fn revoke_exact_privileges(grant: &'a Grant, privileges: &'a PrivilegeSet) -> Self {
        Statement::RevokeExactPrivileges {
            user: &grant.user,
            host: &grant.host,
            database: &grant.database,
            privileges,
        }
    }

    pub fn read_grants(user: &'a str, host: &'a str) -> Self {
        Statement::ReadGrants { user, host }
    }

    /// The SQL sent to the executor.
    pub fn to_sql(&self) -> String {
        self.render(false)
    }

    /// The SQL with secrets masked, safe for logs and error messages.
    pub fn redacted(&self) -> String {
        self.render(true)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Statement::CreatePrincipal { .. } => "create principal",
            Statement::UpdatePrincipalSecret { .. } => "update principal secret",
            Statement::DeletePrincipal { .. } => "delete principal",
            Statement::ReadPrincipal { .. } => "read principal",
            Statement::GrantPrivileges { .. } => "grant privileges",
            Statement::RevokeAllPrivileges { .. } => "revoke all privileges",
            Statement::RevokeExactPrivileges { .. } => "revoke privileges",
            Statement::ReadGrants { .. } => "read grants",
        }
    }

    fn render(&self, redact: bool) -> String {
        let secret = |password: &str| {
            if redact {
                REDACTED.to_string()
            } else {
                quote_literal(password)
            }
        };

        match *self {
            Statement::CreatePrincipal {
                user,
                host,
                password,
            } => format!(
                "CREATE USER IF NOT EXISTS {} IDENTIFIED BY {}",
                account(user, host),
                secret(password)
            ),
            Statement::UpdatePrincipalSecret {
                user,
                host,
                password,
            } => format!(
                "ALTER USER {} IDENTIFIED BY {}",
                account(user, host),
                secret(password)
            ),
            Statement::DeletePrincipal { user, host } => {
                format!("DROP USER IF EXISTS {}", account(user, host))
            }
            Statement::ReadPrincipal { user, host } => format!(
                "SELECT user,host FROM mysql.user WHERE user={} AND host={}",
                quote_literal(user),
                quote_literal(host)
            ),
            Statement::GrantPrivileges {
                user,
                host,
                database,
                privileges,
            } => format!(
                "GRANT {} ON {}.* TO {}",
                privileges,
                quote_schema(database),
                account(user, host)
            ),
            Statement::RevokeAllPrivileges {
                user,
                host,
                database,
            } => format!(
                "REVOKE ALL PRIVILEGES ON {}.* FROM {}",
                quote_schema(database),
                account(user, host)
            ),
            Statement::RevokeExactPrivileges {
                user,
                host,
                database,
                privileges,
            } => format!(
                "REVOKE {} ON {}.* FROM {}",
                privileges,
                quote_schema(database),
                account(user, host)
            ),
            Statement::ReadGrants { user, host } => {
                format!("SHOW GRANTS FOR {}", account(user, host))
            }
        }
    }
}

/// Always the redacted form.
impl fmt::Display for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.redacted())
    }
}

/// `'user'@'host'`
fn account(user: &str, host: &str) -> String {
    format!("{}@{}", quote_literal(user), quote_literal(host))
}

/// Quote a MySQL string literal, escaping backslashes and single quotes.
///
/// Assumes the default `sql_mode`. Under `NO_BACKSLASH_ESCAPES` a doubled
/// backslash stays doubled, which is why passwords may not contain one.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Plain identifiers are left bare, anything else is backtick-quoted.
pub fn quote_schema(database: &str) -> String {
    let plain = !database.is_empty()
        && database
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !database.chars().all(|c| c.is_ascii_digit());

    if plain {
        database.to_string()
    } else {
        format!("`{}`", database.replace('`', "``"))
    }
}
