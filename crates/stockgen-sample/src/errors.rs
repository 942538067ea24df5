use thiserror::Error;

/// Errors emitted by the sampling engine.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error(transparent)]
    Core(#[from] stockgen_core::Error),
    #[error(
        "missing dependency value for '{characteristic}' in generation {generation}: no row for {key}"
    )]
    MissingDependencyValue {
        characteristic: String,
        generation: usize,
        key: String,
    },
    #[error(
        "invalid distribution for '{characteristic}' in generation {generation} at {key}: {reason}"
    )]
    InvalidDistribution {
        characteristic: String,
        generation: usize,
        key: String,
        reason: String,
    },
    #[error(
        "quota overflow for '{characteristic}' in generation {generation} at {key}: {reason}"
    )]
    QuotaOverflow {
        characteristic: String,
        generation: usize,
        key: String,
        reason: String,
    },
    #[error("characteristic '{0}' has no distribution table")]
    UnknownCharacteristic(String),
    #[error("column '{0}' has not been sampled yet")]
    UnsampledColumn(String),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("executor cannot run from state {0}")]
    ExecutorState(String),
    #[error("thread pool error: {0}")]
    ThreadPool(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl SampleError {
    /// Characteristic the error is attributed to, when there is one.
    pub fn characteristic(&self) -> Option<&str> {
        match self {
            Self::MissingDependencyValue { characteristic, .. }
            | Self::InvalidDistribution { characteristic, .. }
            | Self::QuotaOverflow { characteristic, .. } => Some(characteristic),
            Self::UnknownCharacteristic(name) => Some(name),
            _ => None,
        }
    }

    /// Generation the error was raised in, for errors raised while sampling.
    pub fn generation(&self) -> Option<usize> {
        match self {
            Self::MissingDependencyValue { generation, .. }
            | Self::InvalidDistribution { generation, .. }
            | Self::QuotaOverflow { generation, .. } => Some(*generation),
            _ => None,
        }
    }
}

/// Result type for sampling operations.
pub type Result<T> = std::result::Result<T, SampleError>;
