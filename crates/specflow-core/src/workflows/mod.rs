//! # Workflows Module
//!
//! The top-level entry point of the library: the pipeline that carries one molecule from an
//! initial structure to its refined excited state.
//!
//! ## Architecture
//!
//! - **Pipeline Workflow** ([`pipeline`]) - Sequences the stages, owns the run state and
//!   stops cleanly when the frequency gate is rejected
//! - **Stages** (private) - One module per group of stages: structure build, conformer
//!   search, trajectory extraction, batch optimisation, energy ranking and the
//!   quantum-chemistry jobs
//!
//! ## Key Capabilities
//!
//! - **Staged start** from any stage, with its inputs discovered in the working directory
//! - **Bounded batch execution** of the per-conformer optimisations
//! - **Human-in-the-loop** decisions on suspicious vibrational spectra

pub mod pipeline;
mod stages;

pub use stages::structure::StructureInput;
