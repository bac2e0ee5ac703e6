use std::ops::RangeInclusive;
use std::sync::Arc;

use sd_sampler::{Distribution, ProcessorChain, Token};
use sd_speculative::{Scorer, ScorerError};

use crate::architecture::LogitModel;

/// Adapts a [`LogitModel`] to the [`Scorer`] contract by running its logits
/// through a processor chain.
pub struct ChainScorer {
    model: Arc<dyn LogitModel>,
    chain: ProcessorChain,
}

impl ChainScorer {
    pub fn new(model: Arc<dyn LogitModel>, chain: ProcessorChain) -> Self {
        Self { model, chain }
    }

    pub fn model(&self) -> &Arc<dyn LogitModel> {
        &self.model
    }
}

impl Scorer for ChainScorer {
    fn name(&self) -> &str {
        self.model.name()
    }

    fn vocab_size(&self) -> usize {
        self.model.vocab_size()
    }

    fn score(&self, prefix: &[Token]) -> Result<Distribution, ScorerError> {
        let mut logits = vec![0.0; self.model.vocab_size()];
        self.model.logits(prefix, &mut logits);
        Ok(self.chain.distribution(&logits))
    }

    /// One scorer invocation that reuses a single logits buffer across every
    /// requested context length.
    fn score_batch(
        &self,
        sequence: &[Token],
        context_lens: RangeInclusive<usize>,
    ) -> Result<Vec<Distribution>, ScorerError> {
        if *context_lens.end() > sequence.len() {
            return Err(ScorerError::new(
                self.name(),
                format!(
                    "context length {} exceeds sequence length {}",
                    context_lens.end(),
                    sequence.len()
                ),
            ));
        }
        let mut logits = vec![0.0; self.model.vocab_size()];
        Ok(context_lens
            .map(|len| {
                self.model.logits(&sequence[..len], &mut logits);
                self.chain.distribution(&logits)
            })
            .collect())
    }
}
