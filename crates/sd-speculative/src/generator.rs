use sd_sampler::{sample, RandomSource, Token};
use tracing::{debug, debug_span, info};

use crate::accept::AcceptancePolicy;
use crate::adaptive::WidthController;
use crate::config::{OvershootPolicy, SpeculativeConfig};
use crate::draft::{DraftProposer, ModelProposer};
use crate::error::{Result, SpecError};
use crate::scorer::Scorer;
use crate::stats::GenerationStats;
use crate::verify::verify;

/// Output of one generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    /// Prompt followed by the generated tokens.
    pub tokens: Vec<Token>,
    pub prompt_len: usize,
    pub stats: GenerationStats,
}

impl Generation {
    /// Tokens produced after the prompt.
    pub fn generated(&self) -> &[Token] {
        &self.tokens[self.prompt_len..]
    }
}

/// Drives draft, verify and accept cycles until the requested number of
/// tokens has been produced.
///
/// The generator owns its proposer and target scorer; scorers are `Sync`
/// and can be shared between generators on different threads by reference.
pub struct SpeculativeGenerator<P, T> {
    proposer: P,
    target: T,
    policy: Box<dyn AcceptancePolicy>,
    config: SpeculativeConfig,
}

impl<P: DraftProposer, T: Scorer> SpeculativeGenerator<P, T> {
    /// Build a generator using the acceptance policy named by `config`.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for an invalid configuration and
    /// `VocabMismatch` if proposer and target disagree on the vocabulary.
    pub fn new(proposer: P, target: T, config: SpeculativeConfig) -> Result<Self> {
        config.validate()?;
        let policy = config.policy.build();
        let generator = Self {
            proposer,
            target,
            policy,
            config,
        };
        generator.check_vocab()?;
        Ok(generator)
    }

    /// Replace the acceptance policy.
    ///
    /// `config().policy` keeps naming the policy the generator was built
    /// with, since an arbitrary policy has no `PolicyKind`. Use
    /// [`policy_name`](Self::policy_name) for the one in effect.
    pub fn with_policy(mut self, policy: Box<dyn AcceptancePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &SpeculativeConfig {
        &self.config
    }

    pub fn proposer(&self) -> &P {
        &self.proposer
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    fn check_vocab(&self) -> Result<()> {
        let draft = self.proposer.vocab_size();
        let target = self.target.vocab_size();
        if draft != target {
            return Err(SpecError::VocabMismatch { draft, target });
        }
        if target == 0 {
            return Err(SpecError::InvalidArgument("vocabulary is empty".into()));
        }
        Ok(())
    }

    /// Extend `prompt` by `n_tokens` tokens.
    ///
    /// All contract checks run before the first scorer call. A scorer
    /// failure aborts the request.
    pub fn generate(
        &mut self,
        prompt: &[Token],
        n_tokens: usize,
        rng: &mut dyn RandomSource,
    ) -> Result<Generation> {
        self.check_vocab()?;
        check_prompt(prompt, self.target.vocab_size())?;
        self.proposer.reset();

        let span = debug_span!(
            "speculative_generate",
            draft = self.proposer.name(),
            target = self.target.name(),
            policy = self.policy.name(),
            n_tokens,
        );
        let _enter = span.enter();

        let prompt_len = prompt.len();
        let limit = prompt_len + n_tokens;
        let mut sequence = Vec::with_capacity(limit + self.config.max_speculation_width + 1);
        sequence.extend_from_slice(prompt);

        let mut stats = GenerationStats::default();
        let draft_calls_before = self.proposer.scorer_calls();
        let mut width = match &self.config.adaptive {
            Some(adaptive) => {
                WidthController::adaptive(self.config.speculation_width, adaptive.clone())
            }
            None => WidthController::fixed(self.config.speculation_width),
        };

        let mut stopped = false;
        while sequence.len() < limit && !stopped {
            let k = width.width();
            let draft = self.proposer.propose(&sequence, k, rng)?;
            let verification = verify(&sequence, &draft, &self.target)?;
            let outcome = self.policy.accept(&draft, &verification, rng)?;

            stats.record_cycle(draft.len(), &outcome);
            width.record(draft.len(), outcome.all_accepted);
            debug!(
                cycle = stats.cycles,
                k = draft.len(),
                accepted = outcome.accepted,
                all_accepted = outcome.all_accepted,
                "cycle complete"
            );

            let mut emitted = outcome.tokens;
            if let Some(stop) = self.config.stop_token {
                if let Some(pos) = emitted.iter().position(|&t| t == stop) {
                    stats.trimmed += (emitted.len() - pos - 1) as u64;
                    emitted.truncate(pos + 1);
                    stopped = true;
                }
            }
            sequence.extend_from_slice(&emitted);
        }

        stats.draft_calls = self.proposer.scorer_calls() - draft_calls_before;
        if self.config.overshoot == OvershootPolicy::Truncate && sequence.len() > limit {
            stats.trimmed += (sequence.len() - limit) as u64;
            sequence.truncate(limit);
        }

        info!(
            generated = sequence.len() - prompt_len,
            cycles = stats.cycles,
            target_calls = stats.target_calls,
            draft_calls = stats.draft_calls,
            acceptance_rate = stats.acceptance_rate(),
            tokens_per_target_call = stats.tokens_per_target_call(),
            "speculative generation finished"
        );

        Ok(Generation {
            tokens: sequence,
            prompt_len,
            stats,
        })
    }
}

fn check_prompt(prompt: &[Token], vocab_size: usize) -> Result<()> {
    if let Some(&token) = prompt.iter().find(|&&t| t as usize >= vocab_size) {
        return Err(SpecError::InvalidArgument(format!(
            "prompt token {} outside vocabulary of size {}",
            token, vocab_size
        )));
    }
    Ok(())
}

/// Speculative generation with a draft model, canonical rejection sampling
/// and default settings otherwise.
///
/// Overshoot is truncated, so the result holds exactly
/// `prompt.len() + n_tokens` tokens.
pub fn generate<D: Scorer, T: Scorer>(
    prompt: &[Token],
    n_tokens: usize,
    draft: D,
    target: T,
    k: usize,
    rng: &mut dyn RandomSource,
) -> Result<Vec<Token>> {
    let defaults = SpeculativeConfig::default();
    let config = SpeculativeConfig {
        speculation_width: k,
        max_speculation_width: defaults.max_speculation_width.max(k),
        ..defaults
    };
    let mut generator = SpeculativeGenerator::new(ModelProposer::new(draft), target, config)?;
    Ok(generator.generate(prompt, n_tokens, rng)?.tokens)
}

/// Plain sampling baseline: one scorer call per generated token.
pub fn auto_regressive<S: Scorer>(
    prompt: &[Token],
    n_tokens: usize,
    scorer: S,
    rng: &mut dyn RandomSource,
) -> Result<Vec<Token>> {
    Ok(auto_regressive_with(prompt, n_tokens, scorer, None, rng)?.tokens)
}

/// Baseline generation that also stops after `stop_token` and reports
/// call statistics.
pub fn auto_regressive_with<S: Scorer>(
    prompt: &[Token],
    n_tokens: usize,
    scorer: S,
    stop_token: Option<Token>,
    rng: &mut dyn RandomSource,
) -> Result<Generation> {
    if scorer.vocab_size() == 0 {
        return Err(SpecError::InvalidArgument("vocabulary is empty".into()));
    }
    check_prompt(prompt, scorer.vocab_size())?;

    let span = debug_span!("auto_regressive", scorer = scorer.name(), n_tokens);
    let _enter = span.enter();

    let mut sequence = Vec::with_capacity(prompt.len() + n_tokens);
    sequence.extend_from_slice(prompt);
    let mut stats = GenerationStats::default();
    let mut continuation = None;

    for _ in 0..n_tokens {
        let scored = scorer.score_incremental(&sequence, continuation.take())?;
        stats.target_calls += 1;
        continuation = scored.continuation;

        let token = sample(&scored.distribution, rng);
        sequence.push(token);
        if stop_token == Some(token) {
            break;
        }
    }

    info!(
        generated = sequence.len() - prompt.len(),
        target_calls = stats.target_calls,
        "auto-regressive generation finished"
    );

    Ok(Generation {
        tokens: sequence,
        prompt_len: prompt.len(),
        stats,
    })
}
