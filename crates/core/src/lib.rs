//! Execution core for the jailrun service.
//!
//! Everything needed to turn an untrusted Python script into a classified
//! [`OutcomeRecord`](scripting::outcome::OutcomeRecord) lives here: unit
//! assembly, scratch workspaces, sandbox launch, and result classification.
//! Nothing in this crate knows about HTTP.

pub mod error;
pub mod scripting;
