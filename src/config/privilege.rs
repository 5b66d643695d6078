use anyhow::{anyhow, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

static PRIVILEGE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z_]+( [A-Z_]+)*$").expect("PRIVILEGE_TOKEN is a valid regex pattern")
});

/// Static privileges in the order MySQL lists them in `SHOW GRANTS`.
const CANONICAL_ORDER: &[&str] = &[
    "ALL PRIVILEGES",
    "SELECT",
    "INSERT",
    "UPDATE",
    "DELETE",
    "CREATE",
    "DROP",
    "RELOAD",
    "SHUTDOWN",
    "PROCESS",
    "FILE",
    "REFERENCES",
    "INDEX",
    "ALTER",
    "SHOW DATABASES",
    "SUPER",
    "CREATE TEMPORARY TABLES",
    "LOCK TABLES",
    "EXECUTE",
    "REPLICATION SLAVE",
    "REPLICATION CLIENT",
    "CREATE VIEW",
    "SHOW VIEW",
    "CREATE ROUTINE",
    "ALTER ROUTINE",
    "CREATE USER",
    "EVENT",
    "TRIGGER",
    "CREATE TABLESPACE",
    "CREATE ROLE",
    "DROP ROLE",
    "GRANT OPTION",
];

/// A single privilege token, normalized to upper case with single spaces.
///
/// Ordering follows [`CANONICAL_ORDER`]; dynamic privileges (for example
/// `BACKUP_ADMIN`) sort alphabetically after every static one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Privilege {
    rank: usize,
    name: String,
}

impl Privilege {
    pub fn new(token: &str) -> Self {
        let mut name = token
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        if name == "ALL" {
            name = "ALL PRIVILEGES".to_string();
        }

        let rank = CANONICAL_ORDER
            .iter()
            .position(|p| *p == name)
            .unwrap_or(CANONICAL_ORDER.len());

        Self { rank, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(anyhow!("privilege must not be empty"));
        }

        if !PRIVILEGE_TOKEN.is_match(&self.name) {
            return Err(anyhow!("invalid privilege: {:?}", self.name));
        }

        Ok(())
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An unordered privilege set with a deterministic rendering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrivilegeSet(BTreeSet<Privilege>);

impl PrivilegeSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Privilege> {
        self.0.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|p| p.name == name)
    }

    pub fn insert(&mut self, privilege: Privilege) -> bool {
        self.0.insert(privilege)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().map(|p| p.name.clone()).collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for PrivilegeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(|p| Privilege::new(p.as_ref())).collect())
    }
}

/// Comma separated, no spaces: `SELECT,INSERT,UPDATE`.
impl fmt::Display for PrivilegeSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = self.0.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
        write!(f, "{}", names.join(","))
    }
}
