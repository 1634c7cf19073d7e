//! Repository layer: persistence adapter and project queries.
//!
//! # Responsibility
//! - Define the storage capability contract the core depends on.
//! - Keep SQL text inside the persistence boundary.
//!
//! # Invariants
//! - Only fully parameterized statements reach the store.

pub mod persistence;
pub mod project_repo;
