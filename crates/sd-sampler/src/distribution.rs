use tracing::{debug, warn};

use crate::error::{Result, SamplerError};

/// Token identifier: an index into a fixed vocabulary.
pub type Token = u32;

/// A categorical probability distribution over a vocabulary.
///
/// Probabilities are non-negative and sum to 1. A `Distribution` is never
/// mutated after construction; operations such as [`Distribution::residual`]
/// build a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    probs: Vec<f32>,
}

impl Distribution {
    /// Build a distribution from raw weights, normalizing them to sum to 1.
    ///
    /// # Errors
    /// Returns `InvalidDistribution` if the input is empty, contains a
    /// non-finite or negative weight, or sums to zero.
    pub fn new(weights: Vec<f32>) -> Result<Self> {
        if weights.is_empty() {
            return Err(SamplerError::InvalidDistribution(
                "empty vocabulary".to_string(),
            ));
        }
        if let Some((token, w)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(SamplerError::InvalidDistribution(format!(
                "weight {} for token {} is not a finite non-negative number",
                w, token
            )));
        }
        let sum: f32 = weights.iter().sum();
        if !(sum > 0.0 && sum.is_finite()) {
            return Err(SamplerError::InvalidDistribution(format!(
                "weights sum to {}",
                sum
            )));
        }
        Ok(Self::normalized(weights, sum))
    }

    /// Build a distribution from weights that may be degenerate.
    ///
    /// Non-finite and negative weights are clamped to zero. If nothing is
    /// left, the result is uniform over the vocabulary. An empty input gives
    /// an empty distribution.
    pub fn from_weights(mut weights: Vec<f32>) -> Self {
        let mut clamped = 0usize;
        for w in weights.iter_mut() {
            if !w.is_finite() || *w < 0.0 {
                *w = 0.0;
                clamped += 1;
            }
        }
        if clamped > 0 {
            warn!(clamped, vocab_size = weights.len(), "clamped invalid weights to zero");
        }

        let sum: f32 = weights.iter().sum();
        if sum > 0.0 && sum.is_finite() {
            Self::normalized(weights, sum)
        } else {
            warn!(vocab_size = weights.len(), "degenerate weights, falling back to uniform");
            Self::uniform(weights.len())
        }
    }

    /// Uniform distribution over `vocab_size` tokens.
    pub fn uniform(vocab_size: usize) -> Self {
        let p = if vocab_size == 0 {
            0.0
        } else {
            1.0 / vocab_size as f32
        };
        Distribution {
            probs: vec![p; vocab_size],
        }
    }

    /// Distribution that puts all of its mass on `token`.
    pub fn one_hot(vocab_size: usize, token: Token) -> Result<Self> {
        if token as usize >= vocab_size {
            return Err(SamplerError::TokenOutOfRange { token, vocab_size });
        }
        let mut probs = vec![0.0; vocab_size];
        probs[token as usize] = 1.0;
        Ok(Distribution { probs })
    }

    /// Softmax over raw logits.
    ///
    /// `-inf` logits receive probability 0. If every logit is `-inf` (or
    /// NaN) the result falls back to uniform.
    pub fn from_logits(logits: &[f32]) -> Self {
        let max_logit = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if !max_logit.is_finite() {
            return Self::from_weights(vec![0.0; logits.len()]);
        }
        let exps: Vec<f32> = logits.iter().map(|&l| (l - max_logit).exp()).collect();
        Self::from_weights(exps)
    }

    /// Residual distribution `norm(max(target - draft, 0))`.
    ///
    /// This is what a rejected draft position is resampled from. When the
    /// positive part is zero everywhere (target equals draft) the residual
    /// is uniform.
    ///
    /// # Errors
    /// Returns `VocabMismatch` if the two distributions differ in size.
    pub fn residual(target: &Distribution, draft: &Distribution) -> Result<Self> {
        if target.vocab_size() != draft.vocab_size() {
            return Err(SamplerError::VocabMismatch {
                expected: target.vocab_size(),
                got: draft.vocab_size(),
            });
        }

        let weights: Vec<f32> = target
            .probs
            .iter()
            .zip(draft.probs.iter())
            .map(|(q, p)| (q - p).max(0.0))
            .collect();
        let sum: f32 = weights.iter().sum();
        if sum > 0.0 {
            Ok(Self::normalized(weights, sum))
        } else {
            debug!(
                vocab_size = weights.len(),
                "target equals draft, residual is uniform"
            );
            Ok(Self::uniform(weights.len()))
        }
    }

    /// Probability of `token`, or 0 if it is outside the vocabulary.
    pub fn prob(&self, token: Token) -> f32 {
        self.probs.get(token as usize).copied().unwrap_or(0.0)
    }

    /// The probabilities, indexed by token.
    pub fn probs(&self) -> &[f32] {
        &self.probs
    }

    /// Number of tokens in the vocabulary.
    pub fn vocab_size(&self) -> usize {
        self.probs.len()
    }

    /// Most likely token. Ties resolve to the lowest token id.
    pub fn argmax(&self) -> Token {
        let mut best = 0usize;
        for (i, &p) in self.probs.iter().enumerate() {
            if p > self.probs[best] {
                best = i;
            }
        }
        best as Token
    }

    fn normalized(mut weights: Vec<f32>, sum: f32) -> Self {
        for w in weights.iter_mut() {
            *w /= sum;
        }
        Distribution { probs: weights }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sum(d: &Distribution) -> f32 {
        d.probs().iter().sum()
    }

    #[test]
    fn test_new_normalizes() {
        let d = Distribution::new(vec![1.0, 3.0]).unwrap();
        assert_relative_eq!(d.prob(0), 0.25);
        assert_relative_eq!(d.prob(1), 0.75);
    }

    #[test]
    fn test_new_rejects_invalid() {
        assert!(Distribution::new(vec![]).is_err());
        assert!(Distribution::new(vec![0.0, 0.0]).is_err());
        assert!(Distribution::new(vec![1.0, -0.5]).is_err());
        assert!(Distribution::new(vec![1.0, f32::NAN]).is_err());
        assert!(Distribution::new(vec![f32::INFINITY, 1.0]).is_err());
    }

    #[test]
    fn test_from_weights_all_zero_is_uniform() {
        let d = Distribution::from_weights(vec![0.0; 4]);
        assert_eq!(d, Distribution::uniform(4));
    }

    #[test]
    fn test_from_weights_clamps_negative() {
        let d = Distribution::from_weights(vec![-1.0, 2.0, f32::NAN, 2.0]);
        assert_relative_eq!(d.prob(0), 0.0);
        assert_relative_eq!(d.prob(1), 0.5);
        assert_relative_eq!(d.prob(2), 0.0);
        assert_relative_eq!(d.prob(3), 0.5);
    }

    #[test]
    fn test_from_weights_negative_sum_is_uniform() {
        let d = Distribution::from_weights(vec![-1.0, -2.0]);
        assert_eq!(d, Distribution::uniform(2));
    }

    #[test]
    fn test_one_hot() {
        let d = Distribution::one_hot(5, 3).unwrap();
        assert_eq!(d.prob(3), 1.0);
        assert_relative_eq!(sum(&d), 1.0);
        assert!(Distribution::one_hot(5, 5).is_err());
    }

    #[test]
    fn test_from_logits_softmax() {
        let d = Distribution::from_logits(&[1.0, 2.0, 3.0]);
        assert_relative_eq!(sum(&d), 1.0, epsilon = 1e-6);
        assert!(d.prob(0) < d.prob(1));
        assert!(d.prob(1) < d.prob(2));
    }

    #[test]
    fn test_from_logits_neg_inf() {
        let d = Distribution::from_logits(&[f32::NEG_INFINITY, 0.0, 0.0]);
        assert_eq!(d.prob(0), 0.0);
        assert_relative_eq!(d.prob(1), 0.5);

        let all = Distribution::from_logits(&[f32::NEG_INFINITY; 3]);
        assert_eq!(all, Distribution::uniform(3));
    }

    #[test]
    fn test_residual_positive_part() {
        let q = Distribution::new(vec![0.5, 0.3, 0.2]).unwrap();
        let p = Distribution::new(vec![0.2, 0.6, 0.2]).unwrap();
        let r = Distribution::residual(&q, &p).unwrap();
        // max(q - p, 0) = [0.3, 0, 0]
        assert_relative_eq!(r.prob(0), 1.0, epsilon = 1e-6);
        assert_eq!(r.prob(1), 0.0);
        assert_relative_eq!(r.prob(2), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_residual_non_negative_and_normalized() {
        let q = Distribution::new(vec![0.1, 0.4, 0.3, 0.2]).unwrap();
        let p = Distribution::new(vec![0.3, 0.1, 0.1, 0.5]).unwrap();
        let r = Distribution::residual(&q, &p).unwrap();
        assert!(r.probs().iter().all(|&x| x >= 0.0));
        assert_relative_eq!(sum(&r), 1.0, epsilon = 1e-6);
        // positive part = [0, 0.3, 0.2, 0] -> [0, 0.6, 0.4, 0]
        assert_relative_eq!(r.prob(1), 0.6, epsilon = 1e-6);
        assert_relative_eq!(r.prob(2), 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_residual_identical_is_uniform() {
        let q = Distribution::new(vec![0.25, 0.25, 0.5]).unwrap();
        let r = Distribution::residual(&q, &q.clone()).unwrap();
        assert_eq!(r, Distribution::uniform(3));
    }

    #[test]
    fn test_residual_vocab_mismatch() {
        let q = Distribution::uniform(3);
        let p = Distribution::uniform(4);
        assert!(matches!(
            Distribution::residual(&q, &p),
            Err(SamplerError::VocabMismatch { expected: 3, got: 4 })
        ));
    }

    #[test]
    fn test_prob_out_of_range() {
        let d = Distribution::uniform(2);
        assert_eq!(d.prob(7), 0.0);
    }

    #[test]
    fn test_argmax_ties_lowest() {
        let d = Distribution::new(vec![0.1, 0.45, 0.45]).unwrap();
        assert_eq!(d.argmax(), 1);
    }
}
