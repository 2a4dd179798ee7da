use thiserror::Error;

/// Failures raised by the heart-rate pipeline. Every variant is terminal for
/// the invocation that produced it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// Sampling frequency or configuration cannot produce a realizable filter.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The signal itself is unusable (e.g. empty).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A stage produced NaN/Inf, usually from non-finite input samples.
    #[error("{stage} output is non-finite at sample {index}")]
    NumericDegenerate { stage: &'static str, index: usize },
}

pub type PipelineResult<T> = Result<T, PipelineError>;
