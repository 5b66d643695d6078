use crate::config::{Config, Grant, Principal};
use crate::connection::RdsDataConnection;
use crate::executor::Executor;
use crate::reconcile::{GrantReconciler, PrincipalReconciler, Reconciler};
use crate::state::{PrincipalRecord, State};
use ansi_term::Colour::{Green, Purple, Red, Yellow};
use anyhow::{anyhow, Context, Result};
use ascii_table::AsciiTable;
use log::{error, info};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    /// Delete then create, an immutable attribute changed.
    Replace,
    Delete,
    NoChange,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Replace => write!(f, "replace"),
            Action::Delete => write!(f, "delete"),
            Action::NoChange => write!(f, "no change"),
        }
    }
}

/// One planned (and, unless dry-run, applied) change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: &'static str,
    pub resource: String,
    pub action: Action,
}

impl Change {
    fn principal(principal: &Principal, action: Action) -> Self {
        Self {
            kind: "principal",
            resource: principal.to_string(),
            action,
        }
    }

    fn grant(grant: &Grant, action: Action) -> Self {
        Self {
            kind: "grant",
            resource: grant.to_string(),
            action,
        }
    }
}

/// Read the config from the given path and converge the cluster to it.
/// If the dryrun flag is set, only reads are issued.
pub fn apply(target: &Path, dryrun: bool, state_path: Option<&Path>) -> Result<()> {
    let config = load(target)?;
    info!("Applying configuration:\n{}", config);

    run(&config, dryrun, state_path)
}

/// Delete every principal and grant recorded in the state.
pub fn destroy(target: &Path, dryrun: bool, state_path: Option<&Path>) -> Result<()> {
    let config = load(target)?;
    info!("Destroying everything managed by {}", target.display());

    let config = Config {
        principals: vec![],
        grants: vec![],
        ..config
    };

    run(&config, dryrun, state_path)
}

fn load(target: &Path) -> Result<Config> {
    if target.is_dir() {
        return Err(anyhow!("{} is a directory", target.display()));
    }

    Config::new(target)
}

fn run(config: &Config, dryrun: bool, state_path: Option<&Path>) -> Result<()> {
    let state_path = state_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.state_path());
    let mut state = State::load(&state_path)?;

    let conn = RdsDataConnection::new(config.region.as_deref())?;
    let result = reconcile(&conn, config, &mut state, dryrun);

    // keep what was applied before a failure
    let saved = if dryrun {
        Ok(())
    } else {
        state.save(&state_path)
    };

    let changes = settle(result, saved)?;
    print_summary(&changes, dryrun, &state_path);

    Ok(())
}

/// The reconcile error wins over a failed save, which is only logged then.
fn settle(result: Result<Vec<Change>>, saved: Result<()>) -> Result<Vec<Change>> {
    match (result, saved) {
        (Ok(changes), Ok(())) => Ok(changes),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(save)) => {
            error!("failed to save state: {:#}", save);
            Err(e)
        }
    }
}

/// Plan every resource against its prior state and apply the plan.
///
/// Removed grants go first, then principals, then grants, so that a grant
/// never references an account that is about to be created.
pub fn reconcile<E: Executor + ?Sized>(
    executor: &E,
    config: &Config,
    state: &mut State,
    dryrun: bool,
) -> Result<Vec<Change>> {
    let mut changes = vec![];

    // Grants in state but not in config
    let removed = state
        .grants
        .iter()
        .filter(|g| !config.grants.iter().any(|d| d.key() == g.key()))
        .cloned()
        .collect::<Vec<_>>();
    for prior in removed {
        if !dryrun {
            GrantReconciler::new(executor)
                .delete(&prior)
                .with_context(|| format!("failed to revoke {}", prior))?;
            state.remove_grant(&prior.user, &prior.host, &prior.database);
        }
        changes.push(log_change(Change::grant(&prior, Action::Delete), dryrun));
    }

    for desired in &config.principals {
        let action = reconcile_principal(executor, desired, state, dryrun)
            .with_context(|| format!("failed to reconcile principal {}", desired))?;
        changes.push(log_change(Change::principal(desired, action), dryrun));
    }

    // Principals in state but not in config
    let removed = state
        .principals
        .iter()
        .filter(|r| {
            !config
                .principals
                .iter()
                .any(|d| d.user == r.principal.user && d.host == r.principal.host)
        })
        .map(|r| r.principal.clone())
        .collect::<Vec<_>>();
    for prior in removed {
        if !dryrun {
            PrincipalReconciler::new(executor)
                .delete(&prior)
                .with_context(|| format!("failed to delete principal {}", prior))?;
            state.remove_principal(&prior.user, &prior.host);
        }
        changes.push(log_change(Change::principal(&prior, Action::Delete), dryrun));
    }

    for desired in &config.grants {
        let action = reconcile_grant(executor, desired, state, dryrun)
            .with_context(|| format!("failed to reconcile grant {}", desired))?;
        changes.push(log_change(Change::grant(desired, action), dryrun));
    }

    Ok(changes)
}

fn reconcile_principal<E: Executor + ?Sized>(
    executor: &E,
    desired: &Principal,
    state: &mut State,
    dryrun: bool,
) -> Result<Action> {
    let mut reconciler = PrincipalReconciler::new(executor);

    let action = match state.principal(&desired.user, &desired.host).cloned() {
        None => Action::Create,
        Some(record) => {
            let observed = reconciler.read(&record.principal)?;
            if observed.is_blank() {
                Action::Create
            } else if desired.requires_replace(&record.principal) {
                Action::Replace
            } else if desired.password_md5() != record.password_md5 {
                Action::Update
            } else {
                Action::NoChange
            }
        }
    };

    if dryrun {
        return Ok(action);
    }

    match action {
        Action::Create => {
            reconciler.create(desired)?;
        }
        Action::Update => {
            let prior = state
                .principal(&desired.user, &desired.host)
                .map(|r| r.principal.clone())
                .unwrap_or_default();
            reconciler.update(desired, &prior)?;
        }
        Action::Replace => {
            if let Some(record) = state.principal(&desired.user, &desired.host) {
                reconciler.delete(&record.principal)?;
            }
            reconciler.create(desired)?;
        }
        Action::Delete | Action::NoChange => return Ok(action),
    }
    state.put_principal(PrincipalRecord::applied(desired));

    Ok(action)
}

fn reconcile_grant<E: Executor + ?Sized>(
    executor: &E,
    desired: &Grant,
    state: &mut State,
    dryrun: bool,
) -> Result<Action> {
    let mut reconciler = GrantReconciler::new(executor);

    let prior = state
        .grant(&desired.user, &desired.host, &desired.database)
        .cloned();
    let (action, observed) = match prior {
        None => (Action::Create, None),
        Some(prior) if desired.requires_replace(&prior) => (Action::Replace, Some(prior)),
        Some(prior) => {
            let observed = reconciler.read(&prior)?;
            if observed.privilege_set() != desired.privilege_set() {
                (Action::Update, Some(observed))
            } else {
                (Action::NoChange, Some(observed))
            }
        }
    };

    if dryrun {
        return Ok(action);
    }

    let applied = match (action, observed) {
        (Action::Create, _) => reconciler.create(desired)?,
        (Action::Update, Some(observed)) => reconciler.update(desired, &observed)?,
        (Action::Replace, Some(prior)) => {
            reconciler.delete(&prior)?;
            reconciler.create(desired)?
        }
        _ => return Ok(action),
    };
    state.put_grant(applied);

    Ok(action)
}

fn log_change(change: Change, dryrun: bool) -> Change {
    let action = match change.action {
        Action::Create => Green.paint(change.action.to_string()),
        Action::Update | Action::Replace => Yellow.paint(change.action.to_string()),
        Action::Delete => Red.paint(change.action.to_string()),
        Action::NoChange => return change,
    };

    if dryrun {
        info!("{}: {} {} {}", Purple.paint("Dry-run"), action, change.kind, change.resource);
    } else {
        info!("{}: {} {} {}", Green.paint("Success"), action, change.kind, change.resource);
    }

    change
}

/// Print summary table
fn print_summary(changes: &[Change], dryrun: bool, state_path: &PathBuf) {
    let status = if dryrun { "dry-run" } else { "applied" };

    let mut summary = vec![vec![
        "Kind".to_string(),
        "Resource".to_string(),
        "Action".to_string(),
        "Status".to_string(),
    ]];
    summary.push(vec![
        "---".to_string(),
        "---".to_string(),
        "---".to_string(),
        "---".to_string(),
    ]);
    for change in changes {
        summary.push(vec![
            change.kind.to_string(),
            change.resource.clone(),
            change.action.to_string(),
            if change.action == Action::NoChange {
                "-".to_string()
            } else {
                status.to_string()
            },
        ]);
    }

    let ascii_table = AsciiTable::default();
    info!("Summary:\n{}", ascii_table.format(summary));

    if changes.is_empty() {
        error!("nothing is managed by this configuration");
    } else if !dryrun {
        info!("State saved to {}", state_path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Target;
    use crate::executor::testing::{text_row, ScriptedExecutor};

    fn target() -> Target {
        Target::new(
            "arn:aws:rds:us-east-1:123456789012:cluster:main",
            "arn:aws:secretsmanager:us-east-1:123456789012:secret:admin-AbCdEf",
        )
    }

    fn config() -> Config {
        Config {
            target: target(),
            principals: vec![Principal::new("test", "%", "test123456789012", target())],
            grants: vec![Grant::new("test", "%", "app_db", &["SELECT"], target())],
            ..Config::default()
        }
    }

    #[test]
    fn test_settle_keeps_reconcile_error() {
        let err = settle(
            Err(anyhow!("failed to reconcile grant app_db.* to 'test'@'%'")),
            Err(anyhow!("could not write state file")),
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed to reconcile grant"));

        let err = settle(Ok(vec![]), Err(anyhow!("could not write state file"))).unwrap_err();
        assert!(err.to_string().contains("could not write state file"));

        assert!(settle(Ok(vec![]), Ok(())).unwrap().is_empty());
    }

    #[test]
    fn test_reconcile_from_empty_state() {
        let executor = ScriptedExecutor::new();
        let mut state = State::default();

        let changes = reconcile(&executor, &config(), &mut state, false).unwrap();

        assert_eq!(
            changes.iter().map(|c| c.action).collect::<Vec<_>>(),
            vec![Action::Create, Action::Create]
        );
        assert_eq!(
            executor.statements(),
            vec![
                "CREATE USER IF NOT EXISTS 'test'@'%' IDENTIFIED BY 'test123456789012'",
                "GRANT SELECT ON app_db.* TO 'test'@'%'",
            ]
        );
        assert!(state.principal("test", "%").is_some());
        assert!(state.grant("test", "%", "app_db").is_some());
    }

    #[test]
    fn test_reconcile_dryrun_only_reads() {
        let executor = ScriptedExecutor::new();
        let mut state = State::default();
        state.put_principal(PrincipalRecord::applied(&config().principals[0]));

        let changes = reconcile(&executor, &config(), &mut state, true).unwrap();

        // the principal read finds nothing, so it would be recreated
        assert_eq!(changes[0].action, Action::Create);
        assert_eq!(
            executor.statements(),
            vec!["SELECT user,host FROM mysql.user WHERE user='test' AND host='%'"]
        );
        assert!(state.grant("test", "%", "app_db").is_none());
    }

    #[test]
    fn test_reconcile_no_change() {
        let executor = ScriptedExecutor::new()
            .reply(Ok(vec![text_row("user", "test")]))
            .reply(Ok(vec![
                text_row("Grants", "GRANT USAGE ON *.* TO `test`@`%`"),
                text_row("Grants", "GRANT SELECT ON `app_db`.* TO `test`@`%`"),
            ]));
        let mut state = State::default();
        state.put_principal(PrincipalRecord::applied(&config().principals[0]));
        state.put_grant(config().grants[0].clone());

        let changes = reconcile(&executor, &config(), &mut state, false).unwrap();

        assert!(changes.iter().all(|c| c.action == Action::NoChange));
        assert_eq!(executor.statements().len(), 2);
    }

    #[test]
    fn test_reconcile_grant_option_is_stable() {
        let executor = ScriptedExecutor::new()
            .reply(Ok(vec![text_row("user", "test")]))
            .reply(Ok(vec![
                text_row("Grants", "GRANT USAGE ON *.* TO `test`@`%`"),
                text_row(
                    "Grants",
                    "GRANT SELECT ON `app_db`.* TO `test`@`%` WITH GRANT OPTION",
                ),
            ]));
        let mut desired = config();
        desired.grants[0].privileges = vec!["SELECT".to_string(), "GRANT OPTION".to_string()];
        let mut state = State::default();
        state.put_principal(PrincipalRecord::applied(&desired.principals[0]));
        state.put_grant(desired.grants[0].clone());

        let changes = reconcile(&executor, &desired, &mut state, true).unwrap();

        assert_eq!(changes[1].action, Action::NoChange);
    }

    #[test]
    fn test_reconcile_password_rotation_and_removed_grant() {
        let executor = ScriptedExecutor::new()
            .reply(Ok(vec![]))
            .reply(Ok(vec![text_row("user", "test")]));
        let mut state = State::default();
        state.put_principal(PrincipalRecord::applied(&config().principals[0]));
        state.put_grant(Grant::new("test", "%", "old_db", &["SELECT", "INSERT"], target()));

        let mut desired = config();
        desired.principals[0].password = "rotated-password-0000".to_string();
        desired.grants.clear();

        let changes = reconcile(&executor, &desired, &mut state, false).unwrap();

        assert_eq!(changes[0].action, Action::Delete);
        assert_eq!(changes[1].action, Action::Update);
        assert_eq!(
            executor.statements(),
            vec![
                "REVOKE SELECT,INSERT ON old_db.* FROM 'test'@'%'",
                "SELECT user,host FROM mysql.user WHERE user='test' AND host='%'",
                "ALTER USER 'test'@'%' IDENTIFIED BY 'rotated-password-0000'",
            ]
        );
        assert!(state.grants.is_empty());
        assert_eq!(
            state.principal("test", "%").unwrap().password_md5,
            desired.principals[0].password_md5()
        );
    }

    #[test]
    fn test_reconcile_target_change_replaces() {
        let executor = ScriptedExecutor::new().reply(Ok(vec![text_row("user", "test")]));
        let mut state = State::default();
        state.put_principal(PrincipalRecord::applied(&config().principals[0]));

        let mut desired = config();
        desired.grants.clear();
        desired.principals[0].target.resource_arn =
            "arn:aws:rds:us-east-1:123456789012:cluster:other".to_string();

        let changes = reconcile(&executor, &desired, &mut state, false).unwrap();

        assert_eq!(changes[0].action, Action::Replace);
        let calls = executor.calls();
        assert_eq!(calls[1].0, target());
        assert_eq!(calls[1].1, "DROP USER IF EXISTS 'test'@'%'");
        assert_eq!(calls[2].0, desired.principals[0].target);
        assert_eq!(
            state.principal("test", "%").unwrap().principal.target,
            desired.principals[0].target
        );
    }
}
