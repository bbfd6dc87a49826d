//! Data Transfer Objects
//!
//! Lightweight request, response and message shapes exchanged between the
//! HTTP front end, the job trigger and the client.

pub mod job;
