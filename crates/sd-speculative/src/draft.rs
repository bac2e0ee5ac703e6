use sd_sampler::{sample, Distribution, RandomSource, Token};
use tracing::debug;

use crate::error::{Result, SpecError};
use crate::scorer::Scorer;

/// The tokens proposed in one cycle together with the draft distributions
/// they were sampled from.
///
/// `distributions[i]` is exactly the distribution that produced `tokens[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftRun {
    tokens: Vec<Token>,
    distributions: Vec<Distribution>,
}

impl DraftRun {
    /// Pair proposed tokens with their source distributions.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the two lists differ in length.
    pub fn new(tokens: Vec<Token>, distributions: Vec<Distribution>) -> Result<Self> {
        if tokens.len() != distributions.len() {
            return Err(SpecError::InvalidArgument(format!(
                "draft run has {} tokens but {} distributions",
                tokens.len(),
                distributions.len()
            )));
        }
        Ok(Self {
            tokens,
            distributions,
        })
    }

    /// A run with no proposals (k = 0).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn distributions(&self) -> &[Distribution] {
        &self.distributions
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Produces the candidate tokens for one speculative cycle.
pub trait DraftProposer {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Vocabulary the proposed distributions range over.
    fn vocab_size(&self) -> usize;

    /// Propose up to `k` tokens continuing `prefix`.
    fn propose(
        &mut self,
        prefix: &[Token],
        k: usize,
        rng: &mut dyn RandomSource,
    ) -> Result<DraftRun>;

    /// Total draft-scorer invocations made so far.
    fn scorer_calls(&self) -> u64 {
        0
    }

    /// Forget per-request state. Called before each generation request.
    fn reset(&mut self) {}
}

/// Autoregressive proposals from a cheap draft scorer, one call per token.
pub struct ModelProposer<S> {
    scorer: S,
    calls: u64,
}

impl<S: Scorer> ModelProposer<S> {
    pub fn new(scorer: S) -> Self {
        Self { scorer, calls: 0 }
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }
}

impl<S: Scorer> DraftProposer for ModelProposer<S> {
    fn name(&self) -> &str {
        self.scorer.name()
    }

    fn vocab_size(&self) -> usize {
        self.scorer.vocab_size()
    }

    fn propose(
        &mut self,
        prefix: &[Token],
        k: usize,
        rng: &mut dyn RandomSource,
    ) -> Result<DraftRun> {
        let mut context = Vec::with_capacity(prefix.len() + k);
        context.extend_from_slice(prefix);

        let mut tokens = Vec::with_capacity(k);
        let mut distributions = Vec::with_capacity(k);
        let mut continuation = None;

        for _ in 0..k {
            let scored = self.scorer.score_incremental(&context, continuation.take())?;
            self.calls += 1;

            let token = sample(&scored.distribution, rng);
            context.push(token);
            tokens.push(token);
            distributions.push(scored.distribution);
            continuation = scored.continuation;
        }

        DraftRun::new(tokens, distributions)
    }

    fn scorer_calls(&self) -> u64 {
        self.calls
    }
}

/// Proposes a fixed instruction as draft tokens, each with probability 1.
///
/// The instruction is anchored at the prefix length seen on the first call.
/// Each cycle proposes up to `k` instruction tokens that the output has not
/// reproduced yet. Once the output diverges from the instruction, or all of
/// it has been emitted, the proposer returns empty runs and cycles fall back
/// to plain target sampling.
pub struct InstructionProposer {
    instruction: Vec<Token>,
    vocab_size: usize,
    anchor: Option<usize>,
    matched: usize,
    diverged: bool,
}

impl InstructionProposer {
    /// # Errors
    /// Returns `InvalidArgument` if an instruction token lies outside the
    /// vocabulary.
    pub fn new(instruction: Vec<Token>, vocab_size: usize) -> Result<Self> {
        if let Some(&token) = instruction.iter().find(|&&t| t as usize >= vocab_size) {
            return Err(SpecError::InvalidArgument(format!(
                "instruction token {} outside vocabulary of size {}",
                token, vocab_size
            )));
        }
        Ok(Self {
            instruction,
            vocab_size,
            anchor: None,
            matched: 0,
            diverged: false,
        })
    }

    /// Instruction tokens still to be proposed.
    pub fn remaining(&self) -> usize {
        if self.diverged {
            0
        } else {
            self.instruction.len() - self.matched
        }
    }
}

impl DraftProposer for InstructionProposer {
    fn name(&self) -> &str {
        "instruction"
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn propose(
        &mut self,
        prefix: &[Token],
        k: usize,
        _rng: &mut dyn RandomSource,
    ) -> Result<DraftRun> {
        if self.diverged {
            return Ok(DraftRun::empty());
        }
        let anchor = *self.anchor.get_or_insert(prefix.len());
        let emitted = prefix.get(anchor..).unwrap_or(&[]);

        self.matched = emitted
            .iter()
            .zip(&self.instruction)
            .take_while(|(a, b)| a == b)
            .count();
        if self.matched < emitted.len() {
            debug!(matched = self.matched, "output diverged from instruction");
            self.diverged = true;
            return Ok(DraftRun::empty());
        }

        let end = (self.matched + k).min(self.instruction.len());
        let tokens = self.instruction[self.matched..end].to_vec();
        let distributions = tokens
            .iter()
            .map(|&t| Distribution::one_hot(self.vocab_size, t))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        DraftRun::new(tokens, distributions)
    }

    fn reset(&mut self) {
        self.anchor = None;
        self.matched = 0;
        self.diverged = false;
    }
}
