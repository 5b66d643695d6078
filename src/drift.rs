//! Decide whether remote entities still exist.
//!
//! The Data API reports "zero rows" and "object absent" the same way at the
//! type level, and "not found" only as message text. All message matching
//! lives here so the fragile part can be swapped out in one place.

use crate::config::{Privilege, PrivilegeSet};
use crate::error::ReconcileError;
use crate::executor::{ExecutorError, Row};
use crate::sql::Statement;
use log::debug;

/// Lower-cased phrasings meaning the user or grant does not exist.
const NOT_FOUND_PATTERNS: &[&str] = &[
    "not found",
    "there is no such grant defined",
    "can't revoke all privileges",
    "does not exist",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The user or grant is absent. Acceptable wherever absence is.
    NotFound,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantPresence {
    /// Privileges actually held on the database, canonical order.
    Granted(PrivilegeSet),
    /// Only the implicit `USAGE` row, or no account at all.
    NoRealPrivileges,
}

pub fn classify_failure(error: &ExecutorError) -> Failure {
    let message = error.message.to_lowercase();

    if NOT_FOUND_PATTERNS.iter().any(|p| message.contains(p)) {
        Failure::NotFound
    } else {
        Failure::Fatal
    }
}

/// Turn a failure into the fatal error, unless it only says "not found".
pub fn absorb_not_found(
    statement: &Statement,
    result: Result<Vec<Row>, ExecutorError>,
) -> Result<Option<Vec<Row>>, ReconcileError> {
    match result {
        Ok(rows) => Ok(Some(rows)),
        Err(e) if classify_failure(&e) == Failure::NotFound => {
            debug!("{} reported not found: {}", statement.kind(), e);
            Ok(None)
        }
        Err(e) => Err(fatal(statement, e)),
    }
}

pub fn fatal(statement: &Statement, error: ExecutorError) -> ReconcileError {
    ReconcileError::Executor {
        statement: statement.redacted(),
        message: error.message,
    }
}

/// Classify the reply to `ReadPrincipal`: zero rows means absent.
pub fn classify_principal(
    statement: &Statement,
    result: Result<Vec<Row>, ExecutorError>,
) -> Result<Presence, ReconcileError> {
    match absorb_not_found(statement, result)? {
        Some(rows) if !rows.is_empty() => Ok(Presence::Present),
        _ => Ok(Presence::Absent),
    }
}

/// Classify the reply to `ReadGrants` for one database.
///
/// MySQL always returns the implicit `GRANT USAGE ON *.*` row, so a reply
/// of at most one row carries no real privileges. Longer replies are parsed
/// and only privileges on `database` count. A missing account is reported
/// the same way as an account without privileges.
pub fn classify_grants(
    statement: &Statement,
    result: Result<Vec<Row>, ExecutorError>,
    database: &str,
) -> Result<GrantPresence, ReconcileError> {
    let rows = match absorb_not_found(statement, result)? {
        Some(rows) if rows.len() > 1 => rows,
        _ => return Ok(GrantPresence::NoRealPrivileges),
    };

    let mut privileges = PrivilegeSet::default();
    for line in rows.iter().filter_map(Row::first_text) {
        if let Some(grant) = parse_grant_line(line) {
            if grant.database == database {
                for privilege in grant.privileges.iter() {
                    privileges.insert(privilege.clone());
                }
            }
        }
    }

    if privileges.is_empty() {
        Ok(GrantPresence::NoRealPrivileges)
    } else {
        Ok(GrantPresence::Granted(privileges))
    }
}

/// A database-level line of `SHOW GRANTS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantLine {
    pub privileges: PrivilegeSet,
    pub database: String,
}

/// Parse ``GRANT SELECT, INSERT ON `db`.* TO `u`@`%` ``.
///
/// A trailing `WITH GRANT OPTION` counts as the `GRANT OPTION` privilege and
/// the `USAGE` placeholder is dropped. Global (`*.*`), table-level and role
/// grants yield `None`.
pub fn parse_grant_line(line: &str) -> Option<GrantLine> {
    let rest = line.trim().strip_prefix("GRANT ")?;
    let (privileges, rest) = rest.split_once(" ON ")?;
    let (object, grantee) = rest.split_once(" TO ")?;
    let database = object.trim().strip_suffix(".*")?;

    let database = if let Some(quoted) = database
        .strip_prefix('`')
        .and_then(|d| d.strip_suffix('`'))
    {
        quoted.replace("``", "`")
    } else if let Some(quoted) = database
        .strip_prefix('\'')
        .and_then(|d| d.strip_suffix('\''))
    {
        quoted.replace("''", "'")
    } else if database == "*" {
        return None;
    } else {
        database.to_string()
    };

    let mut privileges = privileges
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case("USAGE"))
        .collect::<PrivilegeSet>();
    if grantee
        .trim_end()
        .to_uppercase()
        .ends_with(" WITH GRANT OPTION")
    {
        privileges.insert(Privilege::new("GRANT OPTION"));
    }

    Some(GrantLine {
        privileges,
        database,
    })
}
