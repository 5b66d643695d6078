use super::Reconciler;
use crate::config::{Grant, PrivilegeSet};
use crate::drift::{self, GrantPresence};
use crate::error::ReconcileError;
use crate::executor::{self, Executor};
use crate::sql::Statement;
use log::{debug, info, warn};
use std::fmt;

const GRANT_OPTION: &str = "GRANT OPTION";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantPhase {
    Unmanaged,
    Granting,
    Present,
    Regranting,
    Revoking,
    Revoked,
}

impl fmt::Display for GrantPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GrantPhase::Unmanaged => write!(f, "unmanaged"),
            GrantPhase::Granting => write!(f, "granting"),
            GrantPhase::Present => write!(f, "present"),
            GrantPhase::Regranting => write!(f, "regranting"),
            GrantPhase::Revoking => write!(f, "revoking"),
            GrantPhase::Revoked => write!(f, "revoked"),
        }
    }
}

/// Reconciles the privileges of one account on one database.
pub struct GrantReconciler<'a, E: Executor + ?Sized> {
    executor: &'a E,
    phase: GrantPhase,
}

impl<'a, E: Executor + ?Sized> GrantReconciler<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self {
            executor,
            phase: GrantPhase::Unmanaged,
        }
    }

    pub fn phase(&self) -> GrantPhase {
        self.phase
    }

    fn transition(&mut self, to: GrantPhase) {
        debug!("grant: {} -> {}", self.phase, to);
        self.phase = to;
    }

    fn grant(&self, grant: &Grant) -> Result<(), ReconcileError> {
        let privileges = grant.privilege_set();
        let statement = Statement::grant_privileges(grant, &privileges);

        executor::run(self.executor, &grant.target, &statement)
            .map(|_| ())
            .map_err(|e| drift::fatal(&statement, e))
    }
}

impl<E: Executor + ?Sized> Reconciler for GrantReconciler<'_, E> {
    type State = Grant;

    fn create(&mut self, desired: &Grant) -> Result<Grant, ReconcileError> {
        desired.validate()?;

        let previous = self.phase;
        self.transition(GrantPhase::Granting);
        if let Err(e) = self.grant(desired) {
            self.transition(previous);
            return Err(e);
        }
        self.transition(GrantPhase::Present);

        info!("granted {} on {}", desired.privilege_set(), desired);
        Ok(desired.clone())
    }

    /// Read the privileges held on the database. Without real privileges the
    /// set comes back empty so the next plan regrants.
    fn read(&mut self, prior: &Grant) -> Result<Grant, ReconcileError> {
        let statement = Statement::read_grants(&prior.user, &prior.host);
        let result = executor::run(self.executor, &prior.target, &statement);

        match drift::classify_grants(&statement, result, &prior.database)? {
            GrantPresence::Granted(privileges) => {
                self.transition(GrantPhase::Present);
                Ok(Grant {
                    privileges: privileges.to_vec(),
                    ..prior.clone()
                })
            }
            GrantPresence::NoRealPrivileges => {
                info!("grant {} has no privileges left", prior);
                self.transition(GrantPhase::Unmanaged);
                Ok(Grant {
                    privileges: vec![],
                    ..prior.clone()
                })
            }
        }
    }

    /// Replace the privilege set: revoke everything on the current
    /// account and database, then grant the desired set.
    ///
    /// The two statements are not wrapped in a transaction, the Data API
    /// runs them one at a time. A failure or cancellation between them
    /// leaves the account without privileges on the database until the
    /// next apply regrants.
    fn update(&mut self, desired: &Grant, prior: &Grant) -> Result<Grant, ReconcileError> {
        if desired.requires_replace(prior) {
            return Err(ReconcileError::validation(
                "grant",
                format!(
                    "{} cannot be updated in place into {}, it must be replaced",
                    prior, desired
                ),
            ));
        }
        desired.validate()?;

        let previous = self.phase;
        self.transition(GrantPhase::Regranting);

        let revoke = Statement::revoke_all_privileges(prior);
        let result = executor::run(self.executor, &prior.target, &revoke);
        if let Err(e) = drift::absorb_not_found(&revoke, result) {
            self.transition(previous);
            return Err(e);
        }

        // `ALL PRIVILEGES` does not cover the grant option
        if prior.privilege_set().contains(GRANT_OPTION)
            && !desired.privilege_set().contains(GRANT_OPTION)
        {
            let option = [GRANT_OPTION].into_iter().collect::<PrivilegeSet>();
            let revoke = Statement::revoke_exact_privileges(prior, &option);
            let result = executor::run(self.executor, &prior.target, &revoke);
            if let Err(e) = drift::absorb_not_found(&revoke, result) {
                self.transition(previous);
                return Err(e);
            }
        }

        if let Err(e) = self.grant(desired) {
            warn!("{} is left without privileges: {}", desired, e);
            self.transition(GrantPhase::Unmanaged);
            return Err(e);
        }
        self.transition(GrantPhase::Present);

        info!("regranted {} on {}", desired.privilege_set(), desired);
        Ok(desired.clone())
    }

    /// Revoke exactly the last observed privileges, nothing broader.
    fn delete(&mut self, prior: &Grant) -> Result<(), ReconcileError> {
        let privileges = prior.privilege_set();
        if privileges.is_empty() {
            debug!("nothing to revoke on {}", prior);
            self.transition(GrantPhase::Revoked);
            return Ok(());
        }

        let previous = self.phase;
        self.transition(GrantPhase::Revoking);

        let statement = Statement::revoke_exact_privileges(prior, &privileges);
        let result = executor::run(self.executor, &prior.target, &statement);
        if let Err(e) = drift::absorb_not_found(&statement, result) {
            self.transition(previous);
            return Err(e);
        }
        self.transition(GrantPhase::Revoked);

        info!("revoked {} on {}", privileges, prior);
        Ok(())
    }
}
