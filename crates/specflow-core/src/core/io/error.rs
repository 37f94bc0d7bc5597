use super::amber::AmberError;
use super::frequencies::FrequencyError;
use super::mopac::MopacError;
use super::orca::OrcaError;
use super::xyz::XyzError;
use thiserror::Error;

/// Any codec failure, as surfaced by the pipeline together with the offending path.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error(transparent)]
    Xyz(#[from] XyzError),
    #[error(transparent)]
    Amber(#[from] AmberError),
    #[error(transparent)]
    Mopac(#[from] MopacError),
    #[error(transparent)]
    Orca(#[from] OrcaError),
    #[error(transparent)]
    Frequency(#[from] FrequencyError),
}
