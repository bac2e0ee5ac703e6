use sd_sampler::{Distribution, Token};

use crate::draft::DraftRun;
use crate::error::{Result, SpecError};
use crate::scorer::Scorer;

/// Target distributions for one cycle: `k` judging distributions followed
/// by the distribution for the position after the last draft token.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationResult {
    distributions: Vec<Distribution>,
}

impl VerificationResult {
    /// # Errors
    /// Returns `VerificationShape` if `distributions` is empty; a result
    /// always carries at least the bonus distribution.
    pub fn new(distributions: Vec<Distribution>) -> Result<Self> {
        if distributions.is_empty() {
            return Err(SpecError::VerificationShape {
                expected: 1,
                got: 0,
            });
        }
        Ok(Self { distributions })
    }

    pub fn distributions(&self) -> &[Distribution] {
        &self.distributions
    }

    /// Distribution judging draft position `i` (or the bonus position when
    /// `i == k`).
    pub fn at(&self, i: usize) -> Option<&Distribution> {
        self.distributions.get(i)
    }

    /// Distribution for the token following every draft token.
    pub fn bonus(&self) -> &Distribution {
        // non-empty by construction
        &self.distributions[self.distributions.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.distributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distributions.is_empty()
    }
}

/// Score `prefix` extended by every draft token with a single target call.
///
/// Requests context lengths `prefix.len() ..= prefix.len() + k`, yielding
/// `k + 1` distributions.
///
/// # Errors
/// Propagates scorer failures, and returns `VerificationShape` or
/// `VocabMismatch` if the target answers with the wrong number of
/// distributions or the wrong vocabulary.
pub fn verify<S: Scorer + ?Sized>(
    prefix: &[Token],
    draft: &DraftRun,
    target: &S,
) -> Result<VerificationResult> {
    let k = draft.len();
    let mut sequence = Vec::with_capacity(prefix.len() + k);
    sequence.extend_from_slice(prefix);
    sequence.extend_from_slice(draft.tokens());

    let start = prefix.len();
    let distributions = target.score_batch(&sequence, start..=start + k)?;

    if distributions.len() != k + 1 {
        return Err(SpecError::VerificationShape {
            expected: k + 1,
            got: distributions.len(),
        });
    }
    let vocab = target.vocab_size();
    let draft_vocab = draft
        .distributions()
        .first()
        .map(|d| d.vocab_size())
        .unwrap_or(vocab);
    if let Some(d) = distributions
        .iter()
        .find(|d| d.vocab_size() != vocab || d.vocab_size() != draft_vocab)
    {
        return Err(SpecError::VocabMismatch {
            draft: draft_vocab,
            target: d.vocab_size(),
        });
    }

    VerificationResult::new(distributions)
}
