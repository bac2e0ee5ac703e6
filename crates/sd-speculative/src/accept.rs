//! Accept/reject policies applied to a verified draft run.
//!
//! [`RejectionSampling`] is the exact policy: every emitted token is
//! distributed as the target scorer's distribution at its position, however
//! the draft was produced. [`ThresholdAcceptance`] and [`GreedyAcceptance`]
//! are cheaper deterministic approximations that give up that guarantee.

use std::fmt;
use std::str::FromStr;

use sd_sampler::{greedy, sample, Distribution, RandomSource, Token};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::draft::DraftRun;
use crate::error::{Result, SpecError};
use crate::verify::VerificationResult;

/// Tokens appended by one cycle.
///
/// `tokens` holds the accepted prefix of the draft run followed by exactly
/// one trailing token: a resampled replacement when a draft token was
/// rejected, or a bonus token when every draft token was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptanceOutcome {
    pub tokens: Vec<Token>,
    pub accepted: usize,
    pub all_accepted: bool,
}

impl AcceptanceOutcome {
    /// Replacement token for the first rejected position, if any.
    pub fn resampled(&self) -> Option<Token> {
        if self.all_accepted {
            None
        } else {
            self.tokens.last().copied()
        }
    }

    /// Bonus token sampled after a fully accepted run, if any.
    pub fn bonus(&self) -> Option<Token> {
        if self.all_accepted {
            self.tokens.last().copied()
        } else {
            None
        }
    }
}

/// Decides which draft tokens survive verification.
pub trait AcceptancePolicy: Send + Sync {
    /// Returns the name of this policy.
    fn name(&self) -> &str;

    /// Walk the draft run against the verification distributions.
    fn accept(
        &self,
        draft: &DraftRun,
        verification: &VerificationResult,
        rng: &mut dyn RandomSource,
    ) -> Result<AcceptanceOutcome>;
}

fn check_alignment(draft: &DraftRun, verification: &VerificationResult) -> Result<()> {
    if verification.len() != draft.len() + 1 {
        return Err(SpecError::VerificationShape {
            expected: draft.len() + 1,
            got: verification.len(),
        });
    }
    Ok(())
}

/// Speculative rejection sampling.
///
/// Draft token `x` at position `i` is accepted with probability
/// `min(1, q_i(x) / p_i(x))`. The first rejection is replaced by a sample
/// from `norm(max(q_i - p_i, 0))` and ends the cycle. A fully accepted run
/// earns a bonus token from `q_k`. A draft token with `p_i(x) == 0` is
/// always rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectionSampling;

impl AcceptancePolicy for RejectionSampling {
    fn name(&self) -> &str {
        "rejection"
    }

    fn accept(
        &self,
        draft: &DraftRun,
        verification: &VerificationResult,
        rng: &mut dyn RandomSource,
    ) -> Result<AcceptanceOutcome> {
        check_alignment(draft, verification)?;
        let target = verification.distributions();
        let mut tokens = Vec::with_capacity(draft.len() + 1);

        for (i, (&token, p_dist)) in draft.tokens().iter().zip(draft.distributions()).enumerate() {
            let q_dist = &target[i];
            let p = p_dist.prob(token);
            let q = q_dist.prob(token);
            let u = rng.next_uniform();

            if p > 0.0 && u < (q / p).min(1.0) {
                tokens.push(token);
                continue;
            }

            if p <= 0.0 {
                trace!(position = i, token, "zero draft probability, forcing rejection");
            }
            let residual = Distribution::residual(q_dist, p_dist)?;
            let replacement = sample(&residual, rng);
            trace!(position = i, token, replacement, p, q, u, "draft token rejected");
            tokens.push(replacement);
            return Ok(AcceptanceOutcome {
                tokens,
                accepted: i,
                all_accepted: false,
            });
        }

        tokens.push(sample(verification.bonus(), rng));
        Ok(AcceptanceOutcome {
            tokens,
            accepted: draft.len(),
            all_accepted: true,
        })
    }
}

/// Accepts a draft token while the target gives it more than `cutoff`
/// probability; the first failing position and the bonus position are
/// sampled from the target distribution.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdAcceptance {
    cutoff: f32,
}

impl ThresholdAcceptance {
    pub fn new(cutoff: f32) -> Self {
        Self { cutoff }
    }
}

impl Default for ThresholdAcceptance {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl AcceptancePolicy for ThresholdAcceptance {
    fn name(&self) -> &str {
        "threshold"
    }

    fn accept(
        &self,
        draft: &DraftRun,
        verification: &VerificationResult,
        rng: &mut dyn RandomSource,
    ) -> Result<AcceptanceOutcome> {
        check_alignment(draft, verification)?;
        let target = verification.distributions();
        let mut tokens = Vec::with_capacity(draft.len() + 1);

        for (i, &token) in draft.tokens().iter().enumerate() {
            if target[i].prob(token) > self.cutoff {
                tokens.push(token);
                continue;
            }
            tokens.push(sample(&target[i], rng));
            return Ok(AcceptanceOutcome {
                tokens,
                accepted: i,
                all_accepted: false,
            });
        }

        tokens.push(sample(verification.bonus(), rng));
        Ok(AcceptanceOutcome {
            tokens,
            accepted: draft.len(),
            all_accepted: true,
        })
    }
}

/// Accepts a draft token only if it is the target's most likely token.
/// Replacement and bonus tokens are the target argmax as well, so the
/// policy never consumes randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyAcceptance;

impl AcceptancePolicy for GreedyAcceptance {
    fn name(&self) -> &str {
        "greedy"
    }

    fn accept(
        &self,
        draft: &DraftRun,
        verification: &VerificationResult,
        _rng: &mut dyn RandomSource,
    ) -> Result<AcceptanceOutcome> {
        check_alignment(draft, verification)?;
        let target = verification.distributions();
        let mut tokens = Vec::with_capacity(draft.len() + 1);

        for (i, &token) in draft.tokens().iter().enumerate() {
            let best = greedy(&target[i]);
            if token == best {
                tokens.push(token);
                continue;
            }
            tokens.push(best);
            return Ok(AcceptanceOutcome {
                tokens,
                accepted: i,
                all_accepted: false,
            });
        }

        tokens.push(greedy(verification.bonus()));
        Ok(AcceptanceOutcome {
            tokens,
            accepted: draft.len(),
            all_accepted: true,
        })
    }
}

/// Default cutoff of the threshold policy.
pub const DEFAULT_THRESHOLD: f32 = 0.01;

fn default_cutoff() -> f32 {
    DEFAULT_THRESHOLD
}

/// Serializable selector for the acceptance policies.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Rejection,
    Threshold {
        #[serde(default = "default_cutoff")]
        cutoff: f32,
    },
    Greedy,
}

impl PolicyKind {
    pub fn build(&self) -> Box<dyn AcceptancePolicy> {
        match *self {
            PolicyKind::Rejection => Box::new(RejectionSampling),
            PolicyKind::Threshold { cutoff } => Box::new(ThresholdAcceptance::new(cutoff)),
            PolicyKind::Greedy => Box::new(GreedyAcceptance),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Rejection => write!(f, "rejection"),
            PolicyKind::Threshold { cutoff } => write!(f, "threshold:{}", cutoff),
            PolicyKind::Greedy => write!(f, "greedy"),
        }
    }
}

/// Parses `rejection`, `greedy`, `threshold` or `threshold:<cutoff>`.
impl FromStr for PolicyKind {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };
        match (name.trim(), arg) {
            ("rejection", None) => Ok(PolicyKind::Rejection),
            ("greedy", None) => Ok(PolicyKind::Greedy),
            ("threshold", None) => Ok(PolicyKind::Threshold {
                cutoff: DEFAULT_THRESHOLD,
            }),
            ("threshold", Some(arg)) => {
                let cutoff: f32 = arg.trim().parse().map_err(|_| {
                    SpecError::InvalidArgument(format!("invalid threshold cutoff: {:?}", arg))
                })?;
                Ok(PolicyKind::Threshold { cutoff })
            }
            _ => Err(SpecError::InvalidArgument(format!(
                "unknown acceptance policy: {:?}",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::VecDeque;

    /// Replays scripted uniform draws.
    struct Script(VecDeque<f32>);

    impl Script {
        fn new(draws: &[f32]) -> Self {
            Script(draws.iter().copied().collect())
        }
    }

    impl RandomSource for Script {
        fn next_uniform(&mut self) -> f32 {
            self.0.pop_front().expect("script exhausted")
        }
    }

    fn dist(probs: &[f32]) -> Distribution {
        Distribution::new(probs.to_vec()).unwrap()
    }

    fn draft(tokens: &[Token], dists: Vec<Distribution>) -> DraftRun {
        DraftRun::new(tokens.to_vec(), dists).unwrap()
    }

    fn verification(dists: Vec<Distribution>) -> VerificationResult {
        VerificationResult::new(dists).unwrap()
    }

    #[test]
    fn test_full_acceptance_when_target_dominates() {
        // q(token) >= p(token) at every position -> ratio 1, always accepted
        let d = draft(
            &[0, 2],
            vec![dist(&[0.5, 0.3, 0.2]), dist(&[0.4, 0.4, 0.2])],
        );
        let v = verification(vec![
            dist(&[0.6, 0.2, 0.2]),
            dist(&[0.1, 0.4, 0.5]),
            dist(&[0.0, 1.0, 0.0]),
        ]);
        // draws near 1 still accept; last draw feeds the bonus sample
        let out = RejectionSampling
            .accept(&d, &v, &mut Script::new(&[0.999, 0.999, 0.5]))
            .unwrap();
        assert_eq!(out.tokens, vec![0, 2, 1]);
        assert_eq!(out.accepted, 2);
        assert!(out.all_accepted);
        assert_eq!(out.bonus(), Some(1));
        assert_eq!(out.resampled(), None);
    }

    #[test]
    fn test_rejection_resamples_from_residual_and_stops() {
        let d = draft(
            &[1, 0, 2],
            vec![
                dist(&[0.2, 0.6, 0.2]),
                dist(&[0.5, 0.5, 0.0]),
                dist(&[0.0, 0.0, 1.0]),
            ],
        );
        // position 0: ratio 0.3/0.6 = 0.5; draw 0.7 rejects
        // residual = max([0.5,0.3,0.2] - [0.2,0.6,0.2], 0) = [0.3, 0, 0] -> token 0
        let v = verification(vec![
            dist(&[0.5, 0.3, 0.2]),
            dist(&[1.0, 0.0, 0.0]),
            dist(&[0.0, 0.0, 1.0]),
            dist(&[1.0, 0.0, 0.0]),
        ]);
        let out = RejectionSampling
            .accept(&d, &v, &mut Script::new(&[0.7, 0.99]))
            .unwrap();
        assert_eq!(out.tokens, vec![0]);
        assert_eq!(out.accepted, 0);
        assert!(!out.all_accepted);
        assert_eq!(out.resampled(), Some(0));
    }

    #[test]
    fn test_accept_below_ratio() {
        let d = draft(&[1], vec![dist(&[0.2, 0.6, 0.2])]);
        let v = verification(vec![dist(&[0.5, 0.3, 0.2]), dist(&[0.0, 0.0, 1.0])]);
        // ratio 0.5, draw 0.4 accepts, bonus is token 2
        let out = RejectionSampling
            .accept(&d, &v, &mut Script::new(&[0.4, 0.1]))
            .unwrap();
        assert_eq!(out.tokens, vec![1, 2]);
        assert!(out.all_accepted);
    }

    #[test]
    fn test_zero_draft_probability_forces_rejection() {
        // token 2 has p = 0 under its own draft distribution
        let d = draft(&[2], vec![dist(&[0.5, 0.5, 0.0])]);
        let v = verification(vec![dist(&[0.0, 0.0, 1.0]), dist(&[1.0, 0.0, 0.0])]);
        let out = RejectionSampling
            .accept(&d, &v, &mut Script::new(&[0.0, 0.5]))
            .unwrap();
        assert!(!out.all_accepted);
        // residual = [0, 0, 1]
        assert_eq!(out.tokens, vec![2]);
    }

    #[test]
    fn test_empty_draft_samples_bonus_from_first_distribution() {
        let v = verification(vec![dist(&[0.0, 1.0])]);
        let out = RejectionSampling
            .accept(&DraftRun::empty(), &v, &mut Script::new(&[0.3]))
            .unwrap();
        assert_eq!(out.tokens, vec![1]);
        assert_eq!(out.accepted, 0);
        assert!(out.all_accepted);
    }

    #[test]
    fn test_threshold_full_acceptance_draws_bonus() {
        let d = draft(
            &[1, 0],
            vec![dist(&[0.0, 1.0, 0.0]), dist(&[1.0, 0.0, 0.0])],
        );
        let v = verification(vec![
            dist(&[0.1, 0.8, 0.1]),
            dist(&[0.3, 0.3, 0.4]),
            dist(&[0.0, 0.0, 1.0]),
        ]);
        // acceptance consumes no draws; the single draw samples the bonus
        let mut rng = Script::new(&[0.5]);
        let out = ThresholdAcceptance::new(0.1).accept(&d, &v, &mut rng).unwrap();
        assert_eq!(out.tokens, vec![1, 0, 2]);
        assert_eq!(out.accepted, 2);
        assert!(out.all_accepted);
        assert_eq!(out.bonus(), Some(2));
        assert!(rng.0.is_empty());
    }

    #[test]
    fn test_misaligned_verification() {
        let d = draft(&[0], vec![dist(&[1.0, 0.0])]);
        let v = verification(vec![dist(&[1.0, 0.0])]);
        let err = RejectionSampling
            .accept(&d, &v, &mut Script::new(&[]))
            .unwrap_err();
        assert!(matches!(err, SpecError::VerificationShape { expected: 2, got: 1 }));
    }

    #[test]
    fn test_threshold_policy() {
        let d = draft(
            &[0, 1],
            vec![Distribution::uniform(3), Distribution::uniform(3)],
        );
        let v = verification(vec![
            dist(&[0.5, 0.25, 0.25]),
            dist(&[0.0, 0.005, 0.995]),
            dist(&[1.0, 0.0, 0.0]),
        ]);
        let out = ThresholdAcceptance::default()
            .accept(&d, &v, &mut Script::new(&[0.5]))
            .unwrap();
        // token 1 at position 1 has 0.005 <= 0.01, replaced by a target sample
        assert_eq!(out.tokens, vec![0, 2]);
        assert_eq!(out.accepted, 1);
        assert!(!out.all_accepted);
    }

    #[test]
    fn test_greedy_policy() {
        let d = draft(
            &[2, 1, 0],
            vec![
                Distribution::uniform(3),
                Distribution::uniform(3),
                Distribution::uniform(3),
            ],
        );
        let v = verification(vec![
            dist(&[0.1, 0.2, 0.7]),
            dist(&[0.2, 0.5, 0.3]),
            dist(&[0.2, 0.5, 0.3]),
            dist(&[1.0, 0.0, 0.0]),
        ]);
        let out = GreedyAcceptance
            .accept(&d, &v, &mut Script::new(&[]))
            .unwrap();
        assert_eq!(out.tokens, vec![2, 1, 1]);
        assert_eq!(out.accepted, 2);
        assert_eq!(out.resampled(), Some(1));
    }

    #[test]
    fn test_policy_kind_parse_and_build() {
        assert_eq!("rejection".parse::<PolicyKind>().unwrap(), PolicyKind::Rejection);
        assert_eq!("greedy".parse::<PolicyKind>().unwrap(), PolicyKind::Greedy);
        match "threshold:0.05".parse::<PolicyKind>().unwrap() {
            PolicyKind::Threshold { cutoff } => assert_relative_eq!(cutoff, 0.05),
            other => panic!("unexpected {:?}", other),
        }
        assert!("threshold:abc".parse::<PolicyKind>().is_err());
        assert!("beam".parse::<PolicyKind>().is_err());

        assert_eq!(PolicyKind::Greedy.build().name(), "greedy");
        assert_eq!(PolicyKind::default().build().name(), "rejection");
        assert_eq!(PolicyKind::Threshold { cutoff: 0.2 }.to_string(), "threshold:0.2");
    }
}
