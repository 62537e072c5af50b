//! Sandboxed script execution.
//!
//! One execution flows through these modules in order:
//!
//! 1. [`workspace`] allocates a private scratch directory.
//! 2. [`unit`] appends the entry-point wrapper to the user's script.
//! 3. [`launcher`] builds the sandbox command line.
//! 4. [`subprocess`] runs it under a timeout and collects streams and the
//!    side-channel result file.
//! 5. [`classifier`] turns those raw observations into an
//!    [`outcome::OutcomeRecord`].
//!
//! [`orchestrator::ScriptOrchestrator`] drives the sequence and guarantees
//! the workspace is removed afterwards.

pub mod classifier;
pub mod config;
pub mod launcher;
pub mod orchestrator;
pub mod outcome;
pub mod subprocess;
pub mod unit;
pub mod workspace;
