use std::any::Any;
use std::fmt;
use std::ops::RangeInclusive;

use sd_sampler::{Distribution, Token};

use crate::error::ScorerError;

/// Opaque state a scorer may hand back from one call to speed up the next
/// call on an extended prefix (for example a KV cache position).
///
/// The core only threads it through; it never inspects it.
pub struct Continuation(Box<dyn Any + Send>);

impl Continuation {
    pub fn new<T: Any + Send>(state: T) -> Self {
        Continuation(Box::new(state))
    }

    /// Recover the scorer's own state, or `None` if it is of another type.
    pub fn downcast<T: Any>(self) -> Option<T> {
        self.0.downcast::<T>().ok().map(|b| *b)
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Continuation(..)")
    }
}

/// Result of an incremental scorer call.
#[derive(Debug)]
pub struct Scored {
    pub distribution: Distribution,
    pub continuation: Option<Continuation>,
}

/// A model that maps a token prefix to a distribution over the next token.
///
/// Calls must behave as pure functions of the prefix: identical prefixes
/// produce identical distributions. Temperature and truncation, when used,
/// are applied by the implementation before the distribution is returned.
pub trait Scorer: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Size of the vocabulary every returned distribution covers.
    fn vocab_size(&self) -> usize;

    /// Distribution over the token that follows `prefix`.
    fn score(&self, prefix: &[Token]) -> Result<Distribution, ScorerError>;

    /// Distributions for several context lengths of one sequence in a single
    /// invocation.
    ///
    /// Entry `i` of the result is conditioned on
    /// `sequence[..context_lens.start() + i]`. The default implementation
    /// scores each prefix separately; model-backed scorers override it with
    /// one batched forward pass.
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
        context_lens.map(|len| self.score(&sequence[..len])).collect()
    }

    /// Score `prefix`, optionally resuming from the continuation returned by
    /// a previous call on a shorter prefix of it.
    ///
    /// The default ignores the continuation and scores from scratch.
    fn score_incremental(
        &self,
        prefix: &[Token],
        _continuation: Option<Continuation>,
    ) -> Result<Scored, ScorerError> {
        Ok(Scored {
            distribution: self.score(prefix)?,
            continuation: None,
        })
    }
}

impl<S: Scorer + ?Sized> Scorer for &S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }

    fn score(&self, prefix: &[Token]) -> Result<Distribution, ScorerError> {
        (**self).score(prefix)
    }

    fn score_batch(
        &self,
        sequence: &[Token],
        context_lens: RangeInclusive<usize>,
    ) -> Result<Vec<Distribution>, ScorerError> {
        (**self).score_batch(sequence, context_lens)
    }

    fn score_incremental(
        &self,
        prefix: &[Token],
        continuation: Option<Continuation>,
    ) -> Result<Scored, ScorerError> {
        (**self).score_incremental(prefix, continuation)
    }
}

impl<S: Scorer + ?Sized> Scorer for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }

    fn score(&self, prefix: &[Token]) -> Result<Distribution, ScorerError> {
        (**self).score(prefix)
    }

    fn score_batch(
        &self,
        sequence: &[Token],
        context_lens: RangeInclusive<usize>,
    ) -> Result<Vec<Distribution>, ScorerError> {
        (**self).score_batch(sequence, context_lens)
    }

    fn score_incremental(
        &self,
        prefix: &[Token],
        continuation: Option<Continuation>,
    ) -> Result<Scored, ScorerError> {
        (**self).score_incremental(prefix, continuation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Puts all mass on `prefix.len() % vocab`.
    struct Position(usize);

    impl Scorer for Position {
        fn name(&self) -> &str {
            "position"
        }

        fn vocab_size(&self) -> usize {
            self.0
        }

        fn score(&self, prefix: &[Token]) -> Result<Distribution, ScorerError> {
            Distribution::one_hot(self.0, (prefix.len() % self.0) as Token)
                .map_err(|e| ScorerError::new("position", e))
        }
    }

    #[test]
    fn test_default_score_batch_aligns_context_lengths() {
        let s = Position(10);
        let seq = [1, 2, 3, 4];
        let dists = s.score_batch(&seq, 2..=4).unwrap();
        assert_eq!(dists.len(), 3);
        assert_eq!(dists[0].argmax(), 2);
        assert_eq!(dists[1].argmax(), 3);
        assert_eq!(dists[2].argmax(), 4);
    }

    #[test]
    fn test_default_score_batch_rejects_out_of_range() {
        let s = Position(10);
        let err = s.score_batch(&[1, 2], 1..=3).unwrap_err();
        assert_eq!(err.scorer, "position");
    }

    #[test]
    fn test_boxed_and_borrowed_forward() {
        let boxed: Box<dyn Scorer> = Box::new(Position(5));
        assert_eq!(boxed.vocab_size(), 5);
        assert_eq!((&boxed).score(&[0, 0]).unwrap().argmax(), 2);
    }

    #[test]
    fn test_continuation_downcast() {
        let c = Continuation::new(42usize);
        assert_eq!(c.downcast::<usize>(), Some(42));
        let c = Continuation::new("state");
        assert_eq!(c.downcast::<usize>(), None);
    }
}
