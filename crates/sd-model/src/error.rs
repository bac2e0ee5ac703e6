use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid model spec '{0}': expected 'ngram:<order>' or 'uniform'")]
    InvalidSpec(String),
    #[error("corpus is empty")]
    EmptyCorpus,
    #[error("invalid n-gram order {0}: must be between 1 and 8")]
    InvalidOrder(usize),
    #[error("corpus token {token} outside vocabulary of size {vocab_size}")]
    TokenOutOfRange { token: u32, vocab_size: usize },
}

pub type Result<T> = std::result::Result<T, ModelError>;
