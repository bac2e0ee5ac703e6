use std::collections::HashMap;

use sd_sampler::Token;

/// Next-token counts observed after one context.
#[derive(Debug, Clone, Default)]
pub struct ContextCounts {
    pub total: u32,
    pub next: HashMap<Token, u32>,
}

impl ContextCounts {
    fn observe(&mut self, token: Token) {
        self.total += 1;
        *self.next.entry(token).or_insert(0) += 1;
    }

    pub fn count(&self, token: Token) -> u32 {
        self.next.get(&token).copied().unwrap_or(0)
    }
}

/// Count tables for context lengths `0..order`.
///
/// `tables[n]` maps every length-`n` context seen in the corpus to the
/// tokens that followed it.
#[derive(Debug, Clone)]
pub struct NgramCounts {
    tables: Vec<HashMap<Vec<Token>, ContextCounts>>,
}

impl NgramCounts {
    pub fn build(tokens: &[Token], order: usize) -> Self {
        let mut tables: Vec<HashMap<Vec<Token>, ContextCounts>> =
            (0..order).map(|_| HashMap::new()).collect();

        for (i, &token) in tokens.iter().enumerate() {
            for (n, table) in tables.iter_mut().enumerate() {
                if n > i {
                    break;
                }
                table
                    .entry(tokens[i - n..i].to_vec())
                    .or_default()
                    .observe(token);
            }
        }

        NgramCounts { tables }
    }

    /// Counts for the longest suffix of `prefix` that was seen in the
    /// corpus, backing off down to the unigram table.
    pub fn lookup(&self, prefix: &[Token]) -> Option<&ContextCounts> {
        let longest = prefix.len().min(self.tables.len().saturating_sub(1));
        (0..=longest).rev().find_map(|n| {
            let context = &prefix[prefix.len() - n..];
            self.tables.get(n).and_then(|t| t.get(context))
        })
    }

    /// Number of distinct contexts per length.
    pub fn contexts(&self) -> Vec<usize> {
        self.tables.iter().map(|t| t.len()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_context_length() {
        let counts = NgramCounts::build(&[1, 2, 1, 3], 3);
        // unigram: one empty context
        assert_eq!(counts.contexts(), vec![1, 2, 2]);

        let unigram = counts.lookup(&[]).unwrap();
        assert_eq!(unigram.total, 4);
        assert_eq!(unigram.count(1), 2);

        let after_one = counts.lookup(&[1]).unwrap();
        assert_eq!(after_one.total, 2);
        assert_eq!(after_one.count(2), 1);
        assert_eq!(after_one.count(3), 1);
    }

    #[test]
    fn test_backoff_to_shorter_context() {
        let counts = NgramCounts::build(&[1, 2, 1, 3], 3);
        // [3, 1] never seen, [1] has been
        let c = counts.lookup(&[3, 1]).unwrap();
        assert_eq!(c.total, 2);
        // [2, 1] seen once, followed by 3
        let c = counts.lookup(&[2, 1]).unwrap();
        assert_eq!(c.total, 1);
        assert_eq!(c.count(3), 1);
        // unknown token falls all the way back
        let c = counts.lookup(&[9]).unwrap();
        assert_eq!(c.total, 4);
    }
}
