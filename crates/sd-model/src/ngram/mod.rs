pub mod counts;

use sd_sampler::Token;
use tracing::debug;

use crate::architecture::LogitModel;
use crate::corpus::Corpus;
use crate::error::{ModelError, Result};
use counts::NgramCounts;

pub use counts::ContextCounts;

/// Largest supported n-gram order.
pub const MAX_ORDER: usize = 8;

/// Default add-alpha smoothing constant.
pub const DEFAULT_ALPHA: f32 = 0.1;

/// Smoothed n-gram language model over a tokenized corpus.
///
/// The next-token logits for a prefix are `ln(count + alpha)` using the
/// counts of the longest suffix of the prefix seen in the corpus (at most
/// `order - 1` tokens). Softmaxed without further processing this is
/// add-alpha smoothing.
pub struct NgramModel {
    name: String,
    order: usize,
    alpha: f32,
    vocab_size: usize,
    counts: NgramCounts,
}

impl NgramModel {
    pub fn train(corpus: &Corpus, order: usize) -> Result<Self> {
        if order == 0 || order > MAX_ORDER {
            return Err(ModelError::InvalidOrder(order));
        }
        if corpus.is_empty() {
            return Err(ModelError::EmptyCorpus);
        }

        let counts = NgramCounts::build(corpus.tokens(), order);
        debug!(
            order,
            tokens = corpus.len(),
            contexts = ?counts.contexts(),
            "n-gram model trained"
        );

        Ok(Self {
            name: format!("ngram:{}", order),
            order,
            alpha: DEFAULT_ALPHA,
            vocab_size: corpus.vocab_size(),
            counts,
        })
    }

    /// Override the smoothing constant. Non-positive values are clamped to
    /// a tiny positive number so every token keeps some mass.
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = if alpha > 0.0 { alpha } else { f32::MIN_POSITIVE };
        self
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

impl LogitModel for NgramModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn logits(&self, prefix: &[Token], out: &mut [f32]) {
        out.fill(self.alpha.ln());
        if let Some(ctx) = self.counts.lookup(prefix) {
            for (&token, &count) in &ctx.next {
                if let Some(slot) = out.get_mut(token as usize) {
                    *slot = (count as f32 + self.alpha).ln();
                }
            }
        }
    }
}
