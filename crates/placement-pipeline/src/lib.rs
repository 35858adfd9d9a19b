//! Applicant pipeline core for the placement tracker.
//!
//! Recruiters move applications through the stage board while the collaborator REST
//! service stays the source of truth. Local edits are applied optimistically and rolled
//! back when the remote commit fails; a polling loop keeps the board in step with the
//! server.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
