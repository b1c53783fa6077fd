//! Repository layer for identity persistence.
//!
//! # Responsibility
//! - Define the record store contract used by the workflow.
//! - Isolate SQLite query details from orchestration.
//!
//! # Invariants
//! - Writes enforce `Identity::validate()` before persistence.
//! - Unique-constraint violations surface as `RepoError::DuplicateKey`.

pub mod identity_repo;
