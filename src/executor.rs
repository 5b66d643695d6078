use crate::config::Target;
use crate::sql::Statement;
use log::debug;
use std::fmt;

/// A scalar returned by the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Long(i64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One result row: column names with their values, in result order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// First text column, `SHOW GRANTS` rows carry a single one.
    pub fn first_text(&self) -> Option<&str> {
        self.columns.iter().find_map(|(_, value)| value.as_text())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// The remote message of a failed statement. There is no structured code,
/// see [`crate::drift::classify_failure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorError {
    pub message: String,
}

impl ExecutorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExecutorError {}

/// Runs one self-contained SQL statement against a target.
///
/// Calls are blocking and stateless: no session or transaction spans two
/// calls. The handle is passed explicitly to every reconciler.
pub trait Executor {
    fn execute(&self, target: &Target, sql: &str) -> Result<Vec<Row>, ExecutorError>;
}

/// Run a statement, logging only its redacted form.
pub fn run<E: Executor + ?Sized>(
    executor: &E,
    target: &Target,
    statement: &Statement,
) -> Result<Vec<Row>, ExecutorError> {
    debug!("execute on {}: {}", target.resource_arn, statement);

    let rows = executor.execute(target, &statement.to_sql())?;
    debug!("  -> {} row(s)", rows.len());

    Ok(rows)
}
