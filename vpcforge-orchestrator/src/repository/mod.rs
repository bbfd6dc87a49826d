//! Repository Module
//!
//! Job State Tracker: persistence of job records behind the [`JobStore`]
//! trait, with a Postgres implementation and an in-memory one.

pub mod job;
pub mod memory;

pub use job::{JobStore, PgJobStore, StoreError};
pub use memory::MemoryJobStore;
