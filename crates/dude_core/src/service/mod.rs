//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into project-level use-cases.
//! - Keep the CLI decoupled from storage details.

pub mod project_service;
pub mod reconcile;
