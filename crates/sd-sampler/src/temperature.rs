use crate::processor::{LogitProcessor, TokenLogit};

/// Temperatures at or below zero are clamped to this, which is effectively
/// greedy.
const MIN_TEMPERATURE: f32 = 1e-7;

/// Divides every logit by the temperature. Below 1 sharpens, above 1 flattens.
pub struct TemperatureProcessor {
    temperature: f32,
}

impl TemperatureProcessor {
    pub fn new(temperature: f32) -> Self {
        Self {
            temperature: if temperature > 0.0 {
                temperature
            } else {
                MIN_TEMPERATURE
            },
        }
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

impl LogitProcessor for TemperatureProcessor {
    fn name(&self) -> &str {
        "temperature"
    }

    fn apply(&self, logits: &mut Vec<TokenLogit>) {
        let scale = self.temperature.recip();
        logits.iter_mut().for_each(|t| t.logit *= scale);
    }
}
