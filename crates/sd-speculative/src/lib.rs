//! `sd-speculative` - Draft-verify speculative sampling.
//!
//! A cheap draft scorer proposes `k` tokens autoregressively, the expensive
//! target scorer judges all of them in one batched call, and an acceptance
//! policy keeps a prefix of the proposals plus one extra token. With the
//! canonical [`RejectionSampling`] policy the output is distributed exactly
//! as if every token had been sampled from the target scorer.
//!
//! This crate provides:
//! - The [`Scorer`] contract consumed by the core
//! - [`DraftProposer`] implementations: [`ModelProposer`] and [`InstructionProposer`]
//! - [`verify`], the single batched target call per cycle
//! - [`AcceptancePolicy`] implementations
//! - [`SpeculativeGenerator`] plus the [`generate`] and [`auto_regressive`] entry points

pub mod accept;
pub mod adaptive;
pub mod config;
pub mod draft;
pub mod error;
pub mod generator;
pub mod scorer;
pub mod stats;
pub mod verify;

pub use accept::{
    AcceptanceOutcome, AcceptancePolicy, GreedyAcceptance, PolicyKind, RejectionSampling,
    ThresholdAcceptance, DEFAULT_THRESHOLD,
};
pub use adaptive::WidthController;
pub use config::{AdaptiveConfig, OvershootPolicy, SpeculativeConfig};
pub use draft::{DraftProposer, DraftRun, InstructionProposer, ModelProposer};
pub use error::{Result, ScorerError, SpecError};
pub use generator::{auto_regressive, auto_regressive_with, generate, Generation, SpeculativeGenerator};
pub use scorer::{Continuation, Scored, Scorer};
pub use stats::GenerationStats;
pub use verify::{verify, VerificationResult};
