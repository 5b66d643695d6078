#![allow(dead_code)]

use rds_grant::config::{Grant, Principal, Target};
use rds_grant::executor::{Executor, ExecutorError, Row, Value};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

pub const RESOURCE_ARN: &str = "arn:aws:rds:us-east-1:123456789012:cluster:integration";
pub const SECRET_ARN: &str = "arn:aws:secretsmanager:us-east-1:123456789012:secret:admin-AbCdEf";

pub fn target() -> Target {
    Target::new(RESOURCE_ARN, SECRET_ARN)
}

pub fn principal() -> Principal {
    Principal::new("test", "%", "test123456789012", target())
}

pub fn grant(privileges: &[&str]) -> Grant {
    Grant::new("test", "%", "integration_test", privileges, target())
}

type Account = (String, String);

#[derive(Default)]
struct Server {
    // account -> password
    users: BTreeMap<Account, String>,
    // account -> database -> privileges
    grants: BTreeMap<Account, BTreeMap<String, BTreeSet<String>>>,
    log: Vec<(Target, String)>,
}

/// Understands the handful of statements the reconcilers send, with the
/// error messages MySQL 8 returns for them.
#[derive(Default)]
pub struct FakeMysql {
    server: Mutex<Server>,
}

impl FakeMysql {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statements(&self) -> Vec<String> {
        self.calls().into_iter().map(|(_, sql)| sql).collect()
    }

    pub fn calls(&self) -> Vec<(Target, String)> {
        self.server.lock().unwrap().log.clone()
    }

    pub fn has_user(&self, user: &str, host: &str) -> bool {
        self.server
            .lock()
            .unwrap()
            .users
            .contains_key(&(user.to_string(), host.to_string()))
    }

    pub fn password(&self, user: &str, host: &str) -> Option<String> {
        self.server
            .lock()
            .unwrap()
            .users
            .get(&(user.to_string(), host.to_string()))
            .cloned()
    }

    pub fn privileges(&self, user: &str, host: &str, database: &str) -> Vec<String> {
        self.server
            .lock()
            .unwrap()
            .grants
            .get(&(user.to_string(), host.to_string()))
            .and_then(|dbs| dbs.get(database))
            .map(|p| p.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Out-of-band change, as if someone ran `DROP USER` by hand.
    pub fn drop_user(&self, user: &str, host: &str) {
        let mut server = self.server.lock().unwrap();
        let account = (user.to_string(), host.to_string());
        server.users.remove(&account);
        server.grants.remove(&account);
    }

    /// Out-of-band change, as if someone revoked everything by hand.
    pub fn revoke_everything(&self, user: &str, host: &str) {
        let mut server = self.server.lock().unwrap();
        server.grants.remove(&(user.to_string(), host.to_string()));
    }
}

fn unquote(value: &str) -> String {
    value.trim_matches(|c| c == '\'' || c == '`').to_string()
}

fn no_such_grant(account: &Account) -> ExecutorError {
    ExecutorError::new(format!(
        "Database error code: 1141. Message: There is no such grant defined for user '{}' on host '{}'",
        account.0, account.1
    ))
}

fn key(c: &regex::Captures, i: usize) -> Account {
    (c[i].to_string(), c[i + 1].to_string())
}

// How `SHOW GRANTS` lists held privileges: `GRANT OPTION` moves to a
// suffix and `ALL PRIVILEGES` swallows everything else.
fn listed(held: &BTreeSet<String>) -> String {
    if held.contains("ALL PRIVILEGES") {
        return "ALL PRIVILEGES".to_string();
    }

    let listed = held
        .iter()
        .filter(|p| p.as_str() != "GRANT OPTION")
        .cloned()
        .collect::<Vec<_>>();
    if listed.is_empty() {
        "USAGE".to_string()
    } else {
        listed.join(", ")
    }
}

fn privileges(list: &str) -> BTreeSet<String> {
    list.split(',').map(|p| p.trim().to_string()).collect()
}

impl Executor for FakeMysql {
    fn execute(&self, target: &Target, sql: &str) -> Result<Vec<Row>, ExecutorError> {
        let account = r"'([^']*)'@'([^']*)'";
        let create = Regex::new(&format!(
            r"^CREATE USER IF NOT EXISTS {} IDENTIFIED BY '([^']*)'$",
            account
        ))
        .unwrap();
        let alter = Regex::new(&format!(r"^ALTER USER {} IDENTIFIED BY '([^']*)'$", account)).unwrap();
        let drop = Regex::new(&format!(r"^DROP USER IF EXISTS {}$", account)).unwrap();
        let select =
            Regex::new(r"^SELECT user,host FROM mysql.user WHERE user='([^']*)' AND host='([^']*)'$")
                .unwrap();
        let grant = Regex::new(&format!(r"^GRANT (.+) ON (\S+)\.\* TO {}$", account)).unwrap();
        let revoke = Regex::new(&format!(r"^REVOKE (.+) ON (\S+)\.\* FROM {}$", account)).unwrap();
        let show = Regex::new(&format!(r"^SHOW GRANTS FOR {}$", account)).unwrap();

        let mut server = self.server.lock().unwrap();
        server.log.push((target.clone(), sql.to_string()));

        if let Some(c) = create.captures(sql) {
            let account = key(&c, 1);
            server.users.entry(account).or_insert_with(|| c[3].to_string());
            return Ok(vec![]);
        }

        if let Some(c) = alter.captures(sql) {
            let account = key(&c, 1);
            return match server.users.get_mut(&account) {
                Some(password) => {
                    *password = c[3].to_string();
                    Ok(vec![])
                }
                None => Err(ExecutorError::new(format!(
                    "Database error code: 1396. Message: Operation ALTER USER failed for '{}'@'{}'",
                    account.0, account.1
                ))),
            };
        }

        if let Some(c) = drop.captures(sql) {
            let account = key(&c, 1);
            server.users.remove(&account);
            server.grants.remove(&account);
            return Ok(vec![]);
        }

        if let Some(c) = select.captures(sql) {
            let account = key(&c, 1);
            if !server.users.contains_key(&account) {
                return Ok(vec![]);
            }
            return Ok(vec![Row::new(vec![
                ("user".to_string(), Value::Text(account.0)),
                ("host".to_string(), Value::Text(account.1)),
            ])]);
        }

        if let Some(c) = grant.captures(sql) {
            let account = key(&c, 3);
            if !server.users.contains_key(&account) {
                return Err(ExecutorError::new(
                    "Database error code: 1410. Message: You are not allowed to create a user with GRANT",
                ));
            }
            server
                .grants
                .entry(account)
                .or_default()
                .entry(unquote(&c[2]))
                .or_default()
                .extend(privileges(&c[1]));
            return Ok(vec![]);
        }

        if let Some(c) = revoke.captures(sql) {
            let account = key(&c, 3);
            let database = unquote(&c[2]);
            let held = server
                .grants
                .get_mut(&account)
                .and_then(|dbs| dbs.get_mut(&database))
                .filter(|held| !held.is_empty())
                .ok_or_else(|| no_such_grant(&account))?;

            if &c[1] == "ALL PRIVILEGES" {
                held.retain(|p| p == "GRANT OPTION");
            } else {
                let revoked = privileges(&c[1]);
                if !revoked.is_subset(held) {
                    return Err(no_such_grant(&account));
                }
                held.retain(|p| !revoked.contains(p));
            }
            return Ok(vec![]);
        }

        if let Some(c) = show.captures(sql) {
            let account = key(&c, 1);
            if !server.users.contains_key(&account) {
                return Err(no_such_grant(&account));
            }

            let column = format!("Grants for {}@{}", account.0, account.1);
            let line = |text: String| Row::new(vec![(column.clone(), Value::Text(text))]);

            let mut rows = vec![line(format!(
                "GRANT USAGE ON *.* TO `{}`@`{}`",
                account.0, account.1
            ))];
            if let Some(dbs) = server.grants.get(&account) {
                for (database, held) in dbs.iter().filter(|(_, held)| !held.is_empty()) {
                    rows.push(line(format!(
                        "GRANT {} ON `{}`.* TO `{}`@`{}`{}",
                        listed(held),
                        database,
                        account.0,
                        account.1,
                        if held.contains("GRANT OPTION") {
                            " WITH GRANT OPTION"
                        } else {
                            ""
                        }
                    )));
                }
            }
            return Ok(rows);
        }

        Err(ExecutorError::new(format!(
            "Database error code: 1064. Message: You have an error in your SQL syntax near '{}'",
            sql
        )))
    }
}
