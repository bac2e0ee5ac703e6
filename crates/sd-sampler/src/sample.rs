use crate::distribution::{Distribution, Token};
use crate::random::RandomSource;

/// Draw one token from `dist` using a single uniform variate.
///
/// Walks the cumulative distribution; rounding slack at the top of the CDF
/// resolves to the last token with non-zero probability. An empty
/// distribution yields token 0.
pub fn sample(dist: &Distribution, rng: &mut dyn RandomSource) -> Token {
    let probs = dist.probs();
    let total: f32 = probs.iter().sum();
    let r = rng.next_uniform() * total;

    let mut cumulative = 0.0f32;
    let mut last_nonzero = 0usize;
    for (i, &p) in probs.iter().enumerate() {
        if p <= 0.0 {
            continue;
        }
        cumulative += p;
        last_nonzero = i;
        if r < cumulative {
            return i as Token;
        }
    }
    last_nonzero as Token
}

/// Deterministic selection of the most likely token.
pub fn greedy(dist: &Distribution) -> Token {
    dist.argmax()
}
