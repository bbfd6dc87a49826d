//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services sit between the HTTP handlers and the job store.

pub mod job;

pub use job as job_service;
