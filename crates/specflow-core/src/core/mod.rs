//! # Core Module
//!
//! Stateless building blocks shared by every pipeline stage.
//!
//! - **Molecular Representation** ([`models`]) - topologies, frames, energy records and
//!   frequency reports
//! - **File I/O** ([`io`]) - readers and writers for the XYZ, AMBER, MOPAC and ORCA formats
//!   that pass artifacts from one stage to the next

pub mod io;
pub mod models;
