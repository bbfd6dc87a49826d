//! VPCForge Core
//!
//! Core types and pure logic for the VPCForge topology provisioner.
//!
//! This crate contains:
//! - Domain types: Jobs, their status machine and the provisioned topology
//! - DTOs: Request and message shapes shared by the orchestrator and client
//! - Allocator: Subdivision of a VPC address block into per-zone subnets

pub mod allocator;
pub mod domain;
pub mod dto;
