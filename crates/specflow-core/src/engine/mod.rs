//! # Engine Module
//!
//! Runtime machinery shared by the pipeline stages.
//!
//! ## Architecture
//!
//! - **Process Invocation** ([`process`]) - Launches external engines and streams their
//!   stdout and stderr line by line while they run
//! - **Bounded Execution** ([`pool`]) - Runs the per-frame batch under a concurrency cap
//! - **Decision Gate** ([`gate`]) - Inspects a vibrational spectrum and, when it contains
//!   negative frequencies, waits for an external yes/no decision
//! - **Run State** ([`state`], [`artifacts`]) - The stage sequence, the artifact inventory
//!   of a run and the file lookups and moves between stages
//! - **Configuration** ([`config`]) - Engine locations, resources and chemistry settings
//! - **Progress Monitoring** ([`progress`]) - Stage events and raw process output
//! - **Error Handling** ([`error`]) - The pipeline error taxonomy

pub mod artifacts;
pub mod config;
pub mod error;
pub mod gate;
pub mod pool;
pub mod process;
pub mod progress;
pub mod state;
