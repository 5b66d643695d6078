use crate::config::Config;
use crate::drift::{self, parse_grant_line};
use crate::executor::{self, Executor};
use crate::sql::Statement;
use anyhow::{Context, Result};
use ascii_table::AsciiTable;
use indoc::indoc;
use log::info;

/// Print the database-level grants each declared principal holds right now.
pub fn inspect<E: Executor + ?Sized>(executor: &E, config: &Config) -> Result<()> {
    let mut rows = current_grants(executor, config)?;

    rows.insert(
        0,
        vec![
            "User".to_string(),
            "Host".to_string(),
            "Database".to_string(),
            "Privileges".to_string(),
        ],
    );
    rows.insert(
        1,
        vec![
            "---".to_string(),
            "---".to_string(),
            "---".to_string(),
            "---".to_string(),
        ],
    );

    // Print the table in max size
    let mut table = AsciiTable::default();
    table.set_max_width(table_width(term_size::dimensions().map(|(w, _)| w)));

    info!(
        "Current grants in {}:\n{}",
        config.target.resource_arn,
        table.format(rows)
    );

    info!(indoc! { r#"
        == Legend ==

        (absent)  the account does not exist
        (none)    the account holds no database-level privileges
    "#});

    Ok(())
}

// Terminal width minus a margin, 120 columns when not on a terminal
fn table_width(terminal: Option<usize>) -> usize {
    terminal.unwrap_or(120).saturating_sub(5)
}

/// One row per (principal, database), in declaration order.
pub fn current_grants<E: Executor + ?Sized>(
    executor: &E,
    config: &Config,
) -> Result<Vec<Vec<String>>> {
    let mut rows = vec![];

    for principal in &config.principals {
        let statement = Statement::read_grants(&principal.user, &principal.host);
        let result = executor::run(executor, &principal.target, &statement);
        let lines = drift::absorb_not_found(&statement, result)
            .with_context(|| format!("failed to inspect {}", principal))?;

        let row = |database: &str, privileges: String| {
            vec![
                principal.user.clone(),
                principal.host.clone(),
                database.to_string(),
                privileges,
            ]
        };

        let lines = match lines {
            Some(lines) => lines,
            None => {
                rows.push(row("", "(absent)".to_string()));
                continue;
            }
        };

        let grants = lines
            .iter()
            .filter_map(|line| line.first_text())
            .filter_map(parse_grant_line)
            .collect::<Vec<_>>();

        if grants.is_empty() {
            rows.push(row("", "(none)".to_string()));
        }
        for grant in grants {
            rows.push(row(&grant.database, grant.privileges.to_string()));
        }
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Principal, Target};
    use crate::executor::testing::{text_row, ScriptedExecutor};
    use crate::executor::ExecutorError;

    fn config() -> Config {
        let target = Target::new(
            "arn:aws:rds:us-east-1:123456789012:cluster:main",
            "arn:aws:secretsmanager:us-east-1:123456789012:secret:admin-AbCdEf",
        );
        Config {
            target: target.clone(),
            principals: vec![
                Principal::new("app", "%", "", target.clone()),
                Principal::new("gone", "%", "", target.clone()),
                Principal::new("idle", "%", "", target),
            ],
            ..Config::default()
        }
    }

    #[test]
    fn test_current_grants() {
        let executor = ScriptedExecutor::new()
            .reply(Ok(vec![
                text_row("Grants for app@%", "GRANT USAGE ON *.* TO `app`@`%`"),
                text_row("Grants for app@%", "GRANT SELECT, INSERT ON `app_db`.* TO `app`@`%`"),
                text_row("Grants for app@%", "GRANT ALL ON `logs`.* TO `app`@`%`"),
            ]))
            .reply(Err(ExecutorError::new(
                "There is no such grant defined for user 'gone' on host '%'",
            )))
            .reply(Ok(vec![text_row("Grants for idle@%", "GRANT USAGE ON *.* TO `idle`@`%`")]));

        let rows = current_grants(&executor, &config()).unwrap();

        assert_eq!(
            rows,
            vec![
                vec!["app", "%", "app_db", "SELECT,INSERT"],
                vec!["app", "%", "logs", "ALL PRIVILEGES"],
                vec!["gone", "%", "", "(absent)"],
                vec!["idle", "%", "", "(none)"],
            ]
        );
        assert_eq!(
            executor.statements(),
            vec![
                "SHOW GRANTS FOR 'app'@'%'",
                "SHOW GRANTS FOR 'gone'@'%'",
                "SHOW GRANTS FOR 'idle'@'%'",
            ]
        );
    }

    #[test]
    fn test_table_width() {
        assert_eq!(table_width(None), 115);
        assert_eq!(table_width(Some(80)), 75);
        assert_eq!(table_width(Some(3)), 0);
    }

    #[test]
    fn test_current_grants_fatal() {
        let executor = ScriptedExecutor::new().reply(Err(ExecutorError::new("Access denied")));

        assert!(current_grants(&executor, &config()).is_err());
    }
}
