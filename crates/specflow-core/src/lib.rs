//! # specflow Core Library
//!
//! Drives a conformer-search, semi-empirical screening and excited-state quantum chemistry
//! workflow through external engines, gluing the stages together with format-exact file I/O.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Topology`, `Frame`,
//!   `FrequencyReport`) and the codecs for every file format exchanged between stages.
//!
//! - **[`engine`]: The Runtime.** Stateful machinery used by the stages: the process
//!   invoker, the bounded worker pool, the frequency gate, progress reporting, the run state
//!   and its artifact inventory, configuration and the error taxonomy.
//!
//! - **[`workflows`]: The Public API.** The pipeline orchestrator that sequences the stages
//!   and hands control to a human decision provider when a spectrum looks suspicious.

pub mod core;
pub mod engine;
pub mod workflows;
