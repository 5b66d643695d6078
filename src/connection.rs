use crate::config::Target;
use crate::executor::{Executor, ExecutorError, Row, Value};
use anyhow::{Context, Result};
use aws_sdk_rdsdata::error::DisplayErrorContext;
use aws_sdk_rdsdata::types::Field;
use log::{debug, info};
use tokio::runtime::{Builder, Runtime};

/// Executes statements through the Amazon RDS Data API.
///
/// Every call is a self-contained, authenticated HTTPS request: there is no
/// connection to keep alive and no transaction spanning calls. The async
/// SDK is driven on an owned current-thread runtime so callers stay
/// blocking.
pub struct RdsDataConnection {
    runtime: Runtime,
    client: aws_sdk_rdsdata::Client,
}

impl RdsDataConnection {
    /// Build a client from the default AWS credential chain, optionally
    /// pinned to `region`.
    pub fn new(region: Option<&str>) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start the async runtime")?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let sdk_config = runtime.block_on(loader.load());
        let client = aws_sdk_rdsdata::Client::new(&sdk_config);

        info!(
            "RDS Data API client ready (region: {})",
            sdk_config
                .region()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "default".to_string())
        );

        Ok(Self { runtime, client })
    }
}

impl Executor for RdsDataConnection {
    fn execute(&self, target: &Target, sql: &str) -> Result<Vec<Row>, ExecutorError> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .execute_statement()
                    .resource_arn(&target.resource_arn)
                    .secret_arn(&target.secret_arn)
                    .sql(sql)
                    .include_result_metadata(true)
                    .send(),
            )
            .map_err(|e| ExecutorError::new(DisplayErrorContext(&e).to_string()))?;

        let names = output
            .column_metadata()
            .iter()
            .enumerate()
            .map(|(i, column)| column_name(column.name(), i))
            .collect::<Vec<_>>();

        let rows = output
            .records()
            .iter()
            .map(|record| {
                Row::new(
                    record
                        .iter()
                        .enumerate()
                        .map(|(i, field)| {
                            let name = names
                                .get(i)
                                .cloned()
                                .unwrap_or_else(|| column_name(None, i));
                            (name, to_value(field))
                        })
                        .collect(),
                )
            })
            .collect::<Vec<_>>();

        debug!("records: {}", rows.len());

        Ok(rows)
    }
}

fn column_name(name: Option<&str>, index: usize) -> String {
    match name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("column{}", index),
    }
}

fn to_value(field: &Field) -> Value {
    match field {
        Field::BooleanValue(v) => Value::Bool(*v),
        Field::LongValue(v) => Value::Long(*v),
        Field::DoubleValue(v) => Value::Double(*v),
        Field::StringValue(v) => Value::Text(v.clone()),
        Field::BlobValue(v) => Value::Bytes(v.as_ref().to_vec()),
        Field::IsNull(_) => Value::Null,
        // arrays are never returned for account or grant lookups
        _ => Value::Null,
    }
}
