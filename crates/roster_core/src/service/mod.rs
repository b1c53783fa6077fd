//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and notifier calls into use-case APIs.
//! - Keep front ends decoupled from storage and provider details.

pub mod submission_service;
