use serde::Serialize;

use crate::accept::AcceptanceOutcome;

/// Counters for one generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationStats {
    /// Draft/verify/accept cycles run.
    pub cycles: u64,
    /// Draft tokens proposed across all cycles.
    pub proposed: u64,
    /// Draft tokens accepted.
    pub accepted: u64,
    /// Draft tokens rejected (at most one per cycle).
    pub rejected: u64,
    /// Replacement tokens drawn after a rejection.
    pub resampled: u64,
    /// Bonus tokens drawn after a fully accepted run.
    pub bonus: u64,
    pub draft_calls: u64,
    pub target_calls: u64,
    /// Tokens dropped by overshoot truncation or a stop token.
    pub trimmed: u64,
}

impl GenerationStats {
    pub(crate) fn record_cycle(&mut self, proposed: usize, outcome: &AcceptanceOutcome) {
        self.cycles += 1;
        self.target_calls += 1;
        self.proposed += proposed as u64;
        self.accepted += outcome.accepted as u64;
        if outcome.all_accepted {
            self.bonus += 1;
        } else {
            self.rejected += 1;
            self.resampled += 1;
        }
    }

    /// Accepted draft tokens over proposed draft tokens.
    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            return 0.0;
        }
        self.accepted as f64 / self.proposed as f64
    }

    /// Tokens appended per expensive target call, before trimming.
    pub fn tokens_per_target_call(&self) -> f64 {
        if self.target_calls == 0 {
            return 0.0;
        }
        (self.accepted + self.resampled + self.bonus) as f64 / self.target_calls as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_rates() {
        let stats = GenerationStats::default();
        assert_eq!(stats.acceptance_rate(), 0.0);
        assert_eq!(stats.tokens_per_target_call(), 0.0);
    }

    #[test]
    fn test_record_cycles() {
        let mut stats = GenerationStats::default();
        stats.record_cycle(
            3,
            &AcceptanceOutcome {
                tokens: vec![1, 2, 3, 4],
                accepted: 3,
                all_accepted: true,
            },
        );
        stats.record_cycle(
            3,
            &AcceptanceOutcome {
                tokens: vec![5],
                accepted: 0,
                all_accepted: false,
            },
        );
        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.target_calls, 2);
        assert_eq!(stats.bonus, 1);
        assert_eq!(stats.rejected, 1);
        assert_relative_eq!(stats.acceptance_rate(), 0.5);
        assert_relative_eq!(stats.tokens_per_target_call(), 2.5);
    }
}
