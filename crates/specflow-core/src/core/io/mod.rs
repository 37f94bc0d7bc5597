//! Provides input/output functionality for the file formats exchanged between stages.
//!
//! Each stage of the pipeline hands its successor a file on disk. The modules here read and
//! write those files bit-exactly: multi-frame XYZ coordinates, AMBER topology/trajectory
//! pairs, MOPAC job and output files, ORCA job files and the frequency table of ORCA output.
//! Readers and writers share the trait-based interface defined in [`traits`].

pub mod amber;
pub mod error;
pub mod frequencies;
pub mod mopac;
pub mod orca;
pub mod traits;
pub mod xyz;
