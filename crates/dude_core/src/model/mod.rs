//! In-memory project model.
//!
//! # Responsibility
//! - Hold the state of one project: identity, variables, hooks, workflow.
//! - Enforce lifecycle transitions (`id` and `initialized` are set once).
//!
//! # Invariants
//! - A project is identified by its filesystem path, never by its name.
//! - Variable deletion is two-phase: tombstone first, physical delete on
//!   reconciliation.

pub mod project;
pub mod workflow;
