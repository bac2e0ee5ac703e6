use sd_sampler::SamplerError;
use thiserror::Error;

/// Failure reported by a [`Scorer`](crate::Scorer) implementation.
///
/// Not recoverable inside a generation request: the orchestrator aborts
/// and hands this back to the caller.
#[derive(Error, Debug)]
#[error("scorer '{scorer}' failed: {source}")]
pub struct ScorerError {
    pub scorer: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl ScorerError {
    pub fn new(
        scorer: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            scorer: scorer.into(),
            source: source.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SpecError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("draft vocabulary size {draft} does not match target vocabulary size {target}")]
    VocabMismatch { draft: usize, target: usize },
    #[error("verification returned {got} distributions, expected {expected}")]
    VerificationShape { expected: usize, got: usize },
    #[error(transparent)]
    Scorer(#[from] ScorerError),
    #[error("sampler error: {0}")]
    Sampler(#[from] SamplerError),
}

pub type Result<T> = std::result::Result<T, SpecError>;
