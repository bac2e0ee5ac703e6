use std::sync::Arc;

use sd_model::{ByteTokenizer, LogitModel};

use crate::types::SdStats;

/// Draft and target models loaded from one corpus.
pub struct LoadedModels {
    pub draft: Arc<dyn LogitModel>,
    pub target: Arc<dyn LogitModel>,
}

/// Opaque context handle that owns the tokenizer and loaded models.
pub struct SdContext {
    pub tokenizer: ByteTokenizer,
    pub models: Option<LoadedModels>,
    pub last_stats: SdStats,
}

impl Default for SdContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SdContext {
    pub fn new() -> Self {
        Self {
            tokenizer: ByteTokenizer::new(),
            models: None,
            last_stats: SdStats::default(),
        }
    }
}
