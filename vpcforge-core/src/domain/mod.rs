//! Core domain types
//!
//! This module contains the core domain structures used across VPCForge.
//! They are shared between the orchestrator (which persists and produces them)
//! and the client (which reads them back over HTTP).

pub mod job;
pub mod topology;
