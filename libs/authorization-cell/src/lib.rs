//! # Authorization Cell
//!
//! Decision functions over `(principal, resource)` answering whether a
//! mutation is allowed. Principals are always passed in explicitly and are
//! resolved to accounts through their email. `ADMIN` short-circuits every
//! `can_*` predicate; a principal without a backing account is denied.
//!
//! Lookups go through the shared repository traits, so storage failures
//! surface as [`AuthorizationError`] rather than as a silent denial.

pub mod policy;

pub use policy::{AuthorizationError, AuthorizationPolicy};
