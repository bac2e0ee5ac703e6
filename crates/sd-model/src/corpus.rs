use std::path::Path;

use memmap2::Mmap;
use sd_sampler::Token;
use tracing::debug;

use crate::error::{ModelError, Result};
use crate::tokenizer::Tokenizer;

/// Tokenized training text for the reference scorers.
///
/// Each document ends with the tokenizer's end-of-text token, if it has
/// one, so models learn where text stops.
#[derive(Debug, Clone)]
pub struct Corpus {
    tokens: Vec<Token>,
    vocab_size: usize,
}

impl Corpus {
    /// Memory-map a UTF-8 text file and tokenize it.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn open(path: &Path, tokenizer: &dyn Tokenizer) -> Result<Corpus> {
        let file = std::fs::File::open(path)?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Err(ModelError::EmptyCorpus);
        }

        let mmap = unsafe { Mmap::map(&file)? };
        let text = String::from_utf8_lossy(&mmap);
        let corpus = Self::from_text(&text, tokenizer)?;
        debug!(path = %path.display(), bytes = len, tokens = corpus.len(), "corpus loaded");
        Ok(corpus)
    }

    pub fn from_text(text: &str, tokenizer: &dyn Tokenizer) -> Result<Corpus> {
        let mut tokens = tokenizer.encode(text);
        if tokens.is_empty() {
            return Err(ModelError::EmptyCorpus);
        }
        if let Some(eot) = tokenizer.eot_id() {
            tokens.push(eot);
        }
        Self::from_tokens(tokens, tokenizer.vocab_size())
    }

    /// Wrap an already tokenized sequence.
    pub fn from_tokens(tokens: Vec<Token>, vocab_size: usize) -> Result<Corpus> {
        if tokens.is_empty() {
            return Err(ModelError::EmptyCorpus);
        }
        if let Some(&token) = tokens.iter().find(|&&t| t as usize >= vocab_size) {
            return Err(ModelError::TokenOutOfRange { token, vocab_size });
        }
        Ok(Corpus { tokens, vocab_size })
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
