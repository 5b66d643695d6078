//! Lifecycle operations driven by the declarative front end.
//!
//! Each reconciler borrows the executor handle it is given and acts on one
//! resource at a time. Nothing is shared between reconcilers, so distinct
//! resources can be reconciled concurrently. Two resources describing the
//! same account (or account and database) race at the SQL level.

mod grant;
mod principal;

pub use grant::{GrantPhase, GrantReconciler};
pub use principal::{PrincipalPhase, PrincipalReconciler};

use crate::error::ReconcileError;

/// The four operations the front end calls for a resource kind.
///
/// Changes to immutable attributes must be planned as replace (delete then
/// create) by the caller and never routed into `update`.
pub trait Reconciler {
    type State;

    fn create(&mut self, desired: &Self::State) -> Result<Self::State, ReconcileError>;

    fn read(&mut self, prior: &Self::State) -> Result<Self::State, ReconcileError>;

    fn update(
        &mut self,
        desired: &Self::State,
        prior: &Self::State,
    ) -> Result<Self::State, ReconcileError>;

    fn delete(&mut self, prior: &Self::State) -> Result<(), ReconcileError>;
}
