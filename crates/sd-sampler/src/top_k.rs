use crate::processor::{sort_descending, LogitProcessor, TokenLogit};

/// Drops everything outside the `k` highest logits. `k = 0` disables it.
pub struct TopKProcessor {
    k: usize,
}

impl TopKProcessor {
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl LogitProcessor for TopKProcessor {
    fn name(&self) -> &str {
        "top_k"
    }

    fn apply(&self, logits: &mut Vec<TokenLogit>) {
        if self.k == 0 || self.k >= logits.len() {
            return;
        }
        sort_descending(logits);
        logits.truncate(self.k);
    }
}
