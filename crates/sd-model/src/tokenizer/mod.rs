pub mod byte;

pub use byte::ByteTokenizer;

use sd_sampler::Token;

/// Converts between text and token sequences.
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Vec<Token>;

    /// Decode tokens back to text. Special tokens are skipped.
    fn decode(&self, tokens: &[Token]) -> String;

    fn vocab_size(&self) -> usize;

    /// End-of-text token, if the vocabulary has one.
    fn eot_id(&self) -> Option<Token> {
        None
    }
}
