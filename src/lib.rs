//! Declarative management of MySQL accounts and database-level grants on
//! Amazon RDS, executed through the RDS Data API.
//!
//! The core is the pair of reconcilers in [`reconcile`]: each one turns a
//! desired [`config::Principal`] or [`config::Grant`] into SQL
//! ([`sql::Statement`]), runs it through an [`executor::Executor`] and
//! classifies the outcome ([`drift`]). The [`apply`] module plans whole
//! configuration files against the last-applied [`state`].

pub mod apply;
pub mod cli;
pub mod config;
pub mod connection;
pub mod drift;
pub mod error;
pub mod executor;
pub mod gen;
pub mod inspect;
pub mod reconcile;
pub mod sql;
pub mod state;
pub mod validate;
