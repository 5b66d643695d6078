use super::Reconciler;
use crate::config::principal::validate_password;
use crate::config::Principal;
use crate::drift::{self, Presence};
use crate::error::ReconcileError;
use crate::executor::{self, Executor};
use crate::sql::Statement;
use log::{debug, info};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalPhase {
    Unmanaged,
    Creating,
    Present,
    Updating,
    Deleting,
    Deleted,
}

impl fmt::Display for PrincipalPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrincipalPhase::Unmanaged => write!(f, "unmanaged"),
            PrincipalPhase::Creating => write!(f, "creating"),
            PrincipalPhase::Present => write!(f, "present"),
            PrincipalPhase::Updating => write!(f, "updating"),
            PrincipalPhase::Deleting => write!(f, "deleting"),
            PrincipalPhase::Deleted => write!(f, "deleted"),
        }
    }
}

/// Reconciles one MySQL account.
pub struct PrincipalReconciler<'a, E: Executor + ?Sized> {
    executor: &'a E,
    phase: PrincipalPhase,
}

impl<'a, E: Executor + ?Sized> PrincipalReconciler<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self {
            executor,
            phase: PrincipalPhase::Unmanaged,
        }
    }

    pub fn phase(&self) -> PrincipalPhase {
        self.phase
    }

    fn transition(&mut self, to: PrincipalPhase) {
        debug!("principal: {} -> {}", self.phase, to);
        self.phase = to;
    }

    /// Run `statement` in `during`, landing in `done` on success and back in
    /// the starting phase on failure. With `absent_ok`, a "not found" reply
    /// counts as success.
    fn step(
        &mut self,
        principal: &Principal,
        statement: &Statement,
        (during, done): (PrincipalPhase, PrincipalPhase),
        absent_ok: bool,
    ) -> Result<(), ReconcileError> {
        let previous = self.phase;
        self.transition(during);

        let result = executor::run(self.executor, &principal.target, statement);
        let outcome = if absent_ok {
            drift::absorb_not_found(statement, result).map(|_| ())
        } else {
            result.map(|_| ()).map_err(|e| drift::fatal(statement, e))
        };

        match outcome {
            Ok(()) => {
                self.transition(done);
                Ok(())
            }
            Err(e) => {
                self.transition(previous);
                Err(e)
            }
        }
    }
}

impl<E: Executor + ?Sized> Reconciler for PrincipalReconciler<'_, E> {
    type State = Principal;

    /// Create the account. The returned state never carries the password.
    fn create(&mut self, desired: &Principal) -> Result<Principal, ReconcileError> {
        desired.validate()?;

        let statement = Statement::create_principal(desired);
        self.step(
            desired,
            &statement,
            (PrincipalPhase::Creating, PrincipalPhase::Present),
            false,
        )?;

        info!("created principal {}", desired);
        Ok(desired.without_password())
    }

    /// Look the account up. When it is gone, `user` and `host` come back
    /// blank so the next plan recreates it.
    fn read(&mut self, prior: &Principal) -> Result<Principal, ReconcileError> {
        let statement = Statement::read_principal(prior);
        let result = executor::run(self.executor, &prior.target, &statement);

        match drift::classify_principal(&statement, result)? {
            Presence::Present => {
                self.transition(PrincipalPhase::Present);
                Ok(prior.without_password())
            }
            Presence::Absent => {
                info!("principal {} no longer exists", prior);
                self.transition(PrincipalPhase::Unmanaged);
                Ok(Principal {
                    user: String::new(),
                    host: String::new(),
                    ..prior.without_password()
                })
            }
        }
    }

    /// Rotate the password in place. Anything else is a replace.
    fn update(&mut self, desired: &Principal, prior: &Principal) -> Result<Principal, ReconcileError> {
        if desired.requires_replace(prior) {
            return Err(ReconcileError::validation(
                "principal",
                format!(
                    "{} cannot be updated in place into {}, it must be replaced",
                    prior, desired
                ),
            ));
        }
        validate_password(&desired.password)?;

        let statement = Statement::update_principal_secret(desired);
        self.step(
            desired,
            &statement,
            (PrincipalPhase::Updating, PrincipalPhase::Present),
            false,
        )?;

        info!("updated password of principal {}", desired);
        Ok(desired.without_password())
    }

    /// Drop the account. Dropping an absent account succeeds.
    fn delete(&mut self, prior: &Principal) -> Result<(), ReconcileError> {
        let statement = Statement::delete_principal(prior);
        self.step(
            prior,
            &statement,
            (PrincipalPhase::Deleting, PrincipalPhase::Deleted),
            true,
        )?;

        info!("deleted principal {}", prior);
        Ok(())
    }
}
