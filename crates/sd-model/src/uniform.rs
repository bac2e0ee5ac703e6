use sd_sampler::Token;

use crate::architecture::LogitModel;

/// Flat logits regardless of input. Useful as a worst-case draft model.
#[derive(Debug, Clone)]
pub struct UniformModel {
    vocab_size: usize,
}

impl UniformModel {
    pub fn new(vocab_size: usize) -> Self {
        Self { vocab_size }
    }
}

impl LogitModel for UniformModel {
    fn name(&self) -> &str {
        "uniform"
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn logits(&self, _prefix: &[Token], out: &mut [f32]) {
        out.fill(0.0);
    }
}
