//! Data structures describing molecules and the quantities computed for them.
//!
//! - [`topology`] - the ordered atom labels every frame refers to
//! - [`frame`] - geometry snapshots and trajectories built from them
//! - [`energy`] - per-frame energies and the minimum-energy reduction
//! - [`frequency`] - vibrational frequencies extracted from quantum-chemistry output

pub mod energy;
pub mod frame;
pub mod frequency;
pub mod topology;
