//! Domain model for submitted identities.
//!
//! # Invariants
//! - An identity is identified by a stable `IdentityId`.
//! - Identities are never updated or deleted.

pub mod identity;
