use crate::distribution::{Distribution, Token};
use crate::temperature::TemperatureProcessor;
use crate::top_k::TopKProcessor;
use crate::top_p::TopPProcessor;

/// A token ID paired with its logit value.
#[derive(Debug, Clone)]
pub struct TokenLogit {
    pub token_id: Token,
    pub logit: f32,
}

/// Order by descending logit. The sort is stable, so equal logits keep
/// ascending token order.
pub(crate) fn sort_descending(logits: &mut [TokenLogit]) {
    logits.sort_by(|a, b| b.logit.total_cmp(&a.logit));
}

/// Trait for processors that scale or filter a set of token logits before
/// they are turned into a [`Distribution`].
pub trait LogitProcessor: Send + Sync {
    /// Returns the name of this processor.
    fn name(&self) -> &str;

    /// Modify logits in-place (filtering, scaling, etc.)
    fn apply(&self, logits: &mut Vec<TokenLogit>);
}

/// Composes multiple logit processors into a pipeline ending in a softmax.
///
/// Scorers own one of these; temperature and truncation are therefore
/// applied before a distribution reaches the speculative core.
#[derive(Default)]
pub struct ProcessorChain {
    processors: Vec<Box<dyn LogitProcessor>>,
}

impl ProcessorChain {
    /// Create a new empty chain (plain softmax).
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    /// Standard chain: temperature, then top-k, then top-p.
    ///
    /// A temperature of exactly 1.0, `top_k == 0` and `top_p >= 1.0` are
    /// skipped.
    pub fn from_params(temperature: f32, top_k: usize, top_p: f32) -> Self {
        let mut chain = Self::new();
        if temperature != 1.0 {
            chain = chain.with(Box::new(TemperatureProcessor::new(temperature)));
        }
        if top_k > 0 {
            chain = chain.with(Box::new(TopKProcessor::new(top_k)));
        }
        if top_p < 1.0 {
            chain = chain.with(Box::new(TopPProcessor::new(top_p)));
        }
        chain
    }

    /// Add a processor to the end of the chain. Returns self for builder-style usage.
    pub fn with(mut self, processor: Box<dyn LogitProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Names of the processors in application order.
    pub fn names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Run all processors on raw logits and return the resulting
    /// vocabulary-sized distribution.
    ///
    /// 1. Converts the `&[f32]` logits into `Vec<TokenLogit>` (token_id = index).
    /// 2. Applies each processor in sequence.
    /// 3. Softmaxes the surviving entries; filtered tokens get probability 0.
    pub fn distribution(&self, logits: &[f32]) -> Distribution {
        let mut token_logits: Vec<TokenLogit> = logits
            .iter()
            .enumerate()
            .map(|(i, &logit)| TokenLogit {
                token_id: i as Token,
                logit,
            })
            .collect();

        for processor in &self.processors {
            processor.apply(&mut token_logits);
        }

        let mut dense = vec![f32::NEG_INFINITY; logits.len()];
        for t in &token_logits {
            if let Some(slot) = dense.get_mut(t.token_id as usize) {
                *slot = t.logit;
            }
        }
        Distribution::from_logits(&dense)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_chain_is_softmax() {
        let logits = [0.5, -1.0, 2.0];
        let chain = ProcessorChain::new();
        assert_eq!(chain.distribution(&logits), Distribution::from_logits(&logits));
    }

    #[test]
    fn test_from_params_skips_identity() {
        let chain = ProcessorChain::from_params(1.0, 0, 1.0);
        assert!(chain.names().is_empty());

        let chain = ProcessorChain::from_params(0.7, 40, 0.9);
        assert_eq!(chain.names(), vec!["temperature", "top_k", "top_p"]);
    }

    #[test]
    fn test_filtered_tokens_have_zero_mass() {
        let chain = ProcessorChain::new().with(Box::new(TopKProcessor::new(2)));
        let d = chain.distribution(&[1.0, 3.0, 2.0, 0.0]);
        assert_eq!(d.vocab_size(), 4);
        assert_eq!(d.prob(0), 0.0);
        assert_eq!(d.prob(3), 0.0);
        assert_relative_eq!(d.prob(1) + d.prob(2), 1.0, epsilon = 1e-6);
        assert!(d.prob(1) > d.prob(2));
    }

    #[test]
    fn test_low_temperature_sharpens() {
        let logits = [1.0, 2.0];
        let base = ProcessorChain::new().distribution(&logits);
        let sharp = ProcessorChain::from_params(0.5, 0, 1.0).distribution(&logits);
        assert!(sharp.prob(1) > base.prob(1));
    }
}
