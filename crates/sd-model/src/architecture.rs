use sd_sampler::Token;

/// A model that produces raw next-token logits.
///
/// Logit processing and normalization are left to a
/// [`ChainScorer`](crate::ChainScorer), so one loaded model can serve
/// requests with different sampling parameters.
pub trait LogitModel: Send + Sync {
    /// Identifier such as `ngram:3`.
    fn name(&self) -> &str;

    /// Number of logits written by [`logits`](LogitModel::logits).
    fn vocab_size(&self) -> usize;

    /// Write the logits for the token following `prefix` into `out`, which
    /// holds exactly `vocab_size()` entries.
    fn logits(&self, prefix: &[Token], out: &mut [f32]);
}
