use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use sd_sampler::ProcessorChain;
use sd_speculative::Scorer;

use crate::architecture::LogitModel;
use crate::corpus::Corpus;
use crate::error::{ModelError, Result};
use crate::ngram::NgramModel;
use crate::scorer::ChainScorer;
use crate::uniform::UniformModel;

/// Identifier of a reference scorer, as given on the command line or over
/// the C ABI.
///
/// - `ngram:<order>`: an [`NgramModel`] of that order
/// - `uniform`: a [`UniformModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSpec {
    Ngram { order: usize },
    Uniform,
}

impl ModelSpec {
    /// Build the logit model over `corpus`.
    pub fn build(&self, corpus: &Corpus) -> Result<Arc<dyn LogitModel>> {
        match *self {
            ModelSpec::Ngram { order } => Ok(Arc::new(NgramModel::train(corpus, order)?)),
            ModelSpec::Uniform => Ok(Arc::new(UniformModel::new(corpus.vocab_size()))),
        }
    }

    /// Build the model and wrap it as a scorer applying `chain`.
    pub fn load(&self, corpus: &Corpus, chain: ProcessorChain) -> Result<Box<dyn Scorer>> {
        Ok(Box::new(ChainScorer::new(self.build(corpus)?, chain)))
    }
}

impl FromStr for ModelSpec {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "uniform" {
            return Ok(ModelSpec::Uniform);
        }
        let order = s
            .strip_prefix("ngram:")
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(|| ModelError::InvalidSpec(s.to_string()))?;
        Ok(ModelSpec::Ngram { order })
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSpec::Ngram { order } => write!(f, "ngram:{}", order),
            ModelSpec::Uniform => write!(f, "uniform"),
        }
    }
}
