use sd_sampler::Token;

use super::Tokenizer;

/// Number of byte-level tokens.
pub const BYTE_TOKENS: usize = 256;

/// Token ID of the end-of-text marker, placed after the byte tokens.
pub const EOT_ID: Token = BYTE_TOKENS as Token;

/// Byte-level tokenizer: every UTF-8 byte is its own token, plus one
/// end-of-text token.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteTokenizer;

impl ByteTokenizer {
    pub fn new() -> Self {
        ByteTokenizer
    }
}

impl Tokenizer for ByteTokenizer {
    fn encode(&self, text: &str) -> Vec<Token> {
        text.bytes().map(Token::from).collect()
    }

    /// Decode tokens to text, replacing invalid UTF-8 sequences with U+FFFD.
    /// The end-of-text token and anything outside the vocabulary is skipped.
    fn decode(&self, tokens: &[Token]) -> String {
        let bytes: Vec<u8> = tokens
            .iter()
            .filter_map(|&t| u8::try_from(t).ok())
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn vocab_size(&self) -> usize {
        BYTE_TOKENS + 1
    }

    fn eot_id(&self) -> Option<Token> {
        Some(EOT_ID)
    }
}
