// Materialized View Lifecycle Core
//
// This crate orchestrates the lifecycle of PostgreSQL materialized views:
// creating them, refreshing them under different consistency trade-offs,
// dropping them, and recording an auditable run history for every attempt.
//
// Consumers (CLI tasks, admin UIs, schedulers) enqueue work through the
// kernel's job queue; a hosting task runtime later invokes the orchestration
// jobs in kernel/jobs.rs.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
