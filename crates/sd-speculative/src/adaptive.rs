use std::collections::VecDeque;

use tracing::debug;

use crate::config::AdaptiveConfig;

/// Chooses the speculation width for each cycle.
///
/// A fixed controller always returns the configured width. An adaptive one
/// tracks whether each of the last `window` cycles accepted its whole draft
/// run and steps the width by one toward the observed regime.
#[derive(Debug, Clone)]
pub struct WidthController {
    width: usize,
    adaptive: Option<AdaptiveConfig>,
    recent: VecDeque<bool>,
}

impl WidthController {
    pub fn fixed(width: usize) -> Self {
        Self {
            width,
            adaptive: None,
            recent: VecDeque::new(),
        }
    }

    /// Start at `initial`, clamped into the adaptive bounds.
    pub fn adaptive(initial: usize, config: AdaptiveConfig) -> Self {
        let width = initial.clamp(config.min_width, config.max_width);
        Self {
            width,
            recent: VecDeque::with_capacity(config.window),
            adaptive: Some(config),
        }
    }

    /// Width to use for the next cycle.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Fraction of recorded cycles that accepted every draft token.
    pub fn recent_rate(&self) -> Option<f64> {
        if self.recent.is_empty() {
            return None;
        }
        let full = self.recent.iter().filter(|&&x| x).count();
        Some(full as f64 / self.recent.len() as f64)
    }

    /// Record one cycle's result and update the width.
    ///
    /// Cycles that proposed nothing carry no signal and are ignored.
    pub fn record(&mut self, proposed: usize, all_accepted: bool) {
        let Some(config) = &self.adaptive else {
            return;
        };
        if proposed == 0 {
            return;
        }
        if self.recent.len() == config.window {
            self.recent.pop_front();
        }
        self.recent.push_back(all_accepted);

        let Some(rate) = self.recent_rate() else {
            return;
        };
        let previous = self.width;
        if rate < config.shrink_below {
            self.width = self.width.saturating_sub(1).max(config.min_width);
        } else if rate > config.grow_above {
            self.width = (self.width + 1).min(config.max_width);
        }
        if self.width != previous {
            debug!(from = previous, to = self.width, rate, "speculation width adjusted");
        }
    }
}
