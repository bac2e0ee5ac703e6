use sd_speculative::PolicyKind;

/// Status codes returned by all FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SdStatus {
    Ok = 0,
    ErrorInvalidArgument = 1,
    ErrorModelLoad = 2,
    ErrorGenerate = 3,
    ErrorInternal = 4,
}

/// Acceptance policy selector.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SdPolicy {
    Rejection = 0,
    Threshold = 1,
    Greedy = 2,
}

/// Parameters controlling generation.
///
/// Counts are signed so that negative values coming from C callers can be
/// rejected instead of wrapping.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct SdGenerateParams {
    pub max_tokens: i32,
    pub speculation_width: i32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub seed: u64,
    pub policy: SdPolicy,
    /// Cutoff used by `SdPolicy::Threshold`.
    pub threshold: f32,
}

impl Default for SdGenerateParams {
    fn default() -> Self {
        Self {
            max_tokens: 128,
            speculation_width: 4,
            temperature: 0.7,
            top_k: 0,
            top_p: 1.0,
            seed: 0,
            policy: SdPolicy::Rejection,
            threshold: sd_speculative::DEFAULT_THRESHOLD,
        }
    }
}

impl SdGenerateParams {
    /// `(max_tokens, speculation_width)` as unsigned counts.
    pub fn counts(&self) -> Result<(usize, usize), String> {
        let max_tokens = usize::try_from(self.max_tokens)
            .map_err(|_| format!("max_tokens must be non-negative, got {}", self.max_tokens))?;
        let width = usize::try_from(self.speculation_width).map_err(|_| {
            format!(
                "speculation_width must be non-negative, got {}",
                self.speculation_width
            )
        })?;
        Ok((max_tokens, width))
    }

    pub fn policy_kind(&self) -> PolicyKind {
        match self.policy {
            SdPolicy::Rejection => PolicyKind::Rejection,
            SdPolicy::Threshold => PolicyKind::Threshold {
                cutoff: self.threshold,
            },
            SdPolicy::Greedy => PolicyKind::Greedy,
        }
    }
}

/// Counters from the most recent generation on a context.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SdStats {
    pub cycles: u64,
    pub proposed: u64,
    pub accepted: u64,
    pub draft_calls: u64,
    pub target_calls: u64,
    pub acceptance_rate: f64,
}

impl From<&sd_speculative::GenerationStats> for SdStats {
    fn from(stats: &sd_speculative::GenerationStats) -> Self {
        Self {
            cycles: stats.cycles,
            proposed: stats.proposed,
            accepted: stats.accepted,
            draft_calls: stats.draft_calls,
            target_calls: stats.target_calls,
            acceptance_rate: stats.acceptance_rate(),
        }
    }
}
