use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplerError {
    #[error("invalid distribution: {0}")]
    InvalidDistribution(String),
    #[error("vocabulary size mismatch: expected {expected}, got {got}")]
    VocabMismatch { expected: usize, got: usize },
    #[error("token {token} outside vocabulary of size {vocab_size}")]
    TokenOutOfRange { token: u32, vocab_size: usize },
}

pub type Result<T> = std::result::Result<T, SamplerError>;
