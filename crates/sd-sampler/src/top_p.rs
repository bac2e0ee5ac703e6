use crate::processor::{sort_descending, LogitProcessor, TokenLogit};

/// Nucleus filtering: the smallest high-probability set whose mass exceeds
/// `p`. At least one token always survives; `p >= 1` keeps everything.
pub struct TopPProcessor {
    p: f32,
}

impl TopPProcessor {
    pub fn new(p: f32) -> Self {
        Self { p }
    }
}

impl LogitProcessor for TopPProcessor {
    fn name(&self) -> &str {
        "top_p"
    }

    fn apply(&self, logits: &mut Vec<TokenLogit>) {
        if logits.is_empty() || self.p >= 1.0 {
            return;
        }
        sort_descending(logits);

        let max = logits[0].logit;
        if !max.is_finite() {
            return;
        }
        let weights: Vec<f32> = logits.iter().map(|t| (t.logit - max).exp()).collect();
        let total: f32 = weights.iter().sum();
        let target = self.p * total;

        let mut mass = 0.0f32;
        let keep = weights
            .iter()
            .position(|&w| {
                mass += w;
                mass > target
            })
            .map_or(logits.len(), |i| i + 1);
        logits.truncate(keep.max(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(probs: &[f32], p: f32) -> Vec<u32> {
        let mut l: Vec<TokenLogit> = probs
            .iter()
            .enumerate()
            .map(|(i, &q)| TokenLogit {
                token_id: i as u32,
                logit: q.ln(),
            })
            .collect();
        TopPProcessor::new(p).apply(&mut l);
        l.iter().map(|t| t.token_id).collect()
    }

    #[test]
    fn test_nucleus_cutoff() {
        assert_eq!(ids(&[0.1, 0.6, 0.3], 0.8), vec![1, 2]);
        assert_eq!(ids(&[0.1, 0.6, 0.3], 0.5), vec![1]);
    }

    #[test]
    fn test_keeps_at_least_one() {
        assert_eq!(ids(&[0.9, 0.1], 0.0), vec![0]);
    }

    #[test]
    fn test_full_mass_keeps_order() {
        assert_eq!(ids(&[0.2, 0.5, 0.3], 1.0), vec![0, 1, 2]);
    }
}
