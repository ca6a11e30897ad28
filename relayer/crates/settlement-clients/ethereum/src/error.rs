use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FeeEstimationError {
    #[error("Fee history did not report a base fee")]
    MissingBaseFee,

    #[error("Fee history did not report priority fee rewards")]
    MissingRewards,
}
