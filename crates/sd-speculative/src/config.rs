use sd_sampler::Token;
use serde::{Deserialize, Serialize};

use crate::accept::PolicyKind;
use crate::error::{Result, SpecError};

/// What to do with tokens the final cycle produces past the requested count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OvershootPolicy {
    /// Cut the output to exactly the requested number of generated tokens.
    #[default]
    Truncate,
    /// Keep whatever the last cycle appended.
    Allow,
}

/// Width adaptation driven by the recent full-acceptance rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Smallest width the controller will shrink to.
    pub min_width: usize,
    /// Largest width the controller will grow to.
    pub max_width: usize,
    /// Number of recent cycles the rate is computed over.
    pub window: usize,
    /// Shrink by one when the rate falls below this.
    pub shrink_below: f64,
    /// Grow by one when the rate rises above this.
    pub grow_above: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            min_width: 1,
            max_width: 8,
            window: 16,
            shrink_below: 0.3,
            grow_above: 0.8,
        }
    }
}

/// Configuration for a speculative generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeculativeConfig {
    /// Draft tokens proposed per cycle (k).
    pub speculation_width: usize,
    /// Upper bound accepted for any width, fixed or adaptive.
    pub max_speculation_width: usize,
    /// Acceptance policy applied to each verified draft run.
    pub policy: PolicyKind,
    pub overshoot: OvershootPolicy,
    /// Generation ends once this token is emitted.
    pub stop_token: Option<Token>,
    /// Vary the width between cycles; `None` keeps it fixed.
    pub adaptive: Option<AdaptiveConfig>,
}

impl Default for SpeculativeConfig {
    fn default() -> Self {
        Self {
            speculation_width: 4,
            max_speculation_width: 16,
            policy: PolicyKind::default(),
            overshoot: OvershootPolicy::default(),
            stop_token: None,
            adaptive: None,
        }
    }
}

impl SpeculativeConfig {
    pub fn with_width(mut self, width: usize) -> Self {
        self.speculation_width = width;
        self
    }

    pub fn with_policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_stop_token(mut self, token: Token) -> Self {
        self.stop_token = Some(token);
        self
    }

    /// Check width bounds and adaptive settings.
    ///
    /// # Errors
    /// Returns `InvalidArgument` describing the first violated bound.
    pub fn validate(&self) -> Result<()> {
        if self.speculation_width > self.max_speculation_width {
            return Err(SpecError::InvalidArgument(format!(
                "speculation width {} exceeds maximum {}",
                self.speculation_width, self.max_speculation_width
            )));
        }
        if let PolicyKind::Threshold { cutoff } = self.policy {
            if !(0.0..=1.0).contains(&cutoff) {
                return Err(SpecError::InvalidArgument(format!(
                    "threshold cutoff {} outside [0, 1]",
                    cutoff
                )));
            }
        }
        if let Some(adaptive) = &self.adaptive {
            if adaptive.min_width > adaptive.max_width {
                return Err(SpecError::InvalidArgument(format!(
                    "adaptive min_width {} exceeds max_width {}",
                    adaptive.min_width, adaptive.max_width
                )));
            }
            if adaptive.max_width > self.max_speculation_width {
                return Err(SpecError::InvalidArgument(format!(
                    "adaptive max_width {} exceeds maximum {}",
                    adaptive.max_width, self.max_speculation_width
                )));
            }
            if adaptive.window == 0 {
                return Err(SpecError::InvalidArgument(
                    "adaptive window must be non-zero".into(),
                ));
            }
            if adaptive.shrink_below > adaptive.grow_above {
                return Err(SpecError::InvalidArgument(format!(
                    "adaptive shrink_below {} exceeds grow_above {}",
                    adaptive.shrink_below, adaptive.grow_above
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SpeculativeConfig::default();
        assert_eq!(config.speculation_width, 4);
        assert_eq!(config.max_speculation_width, 16);
        assert_eq!(config.policy, PolicyKind::Rejection);
        assert_eq!(config.overshoot, OvershootPolicy::Truncate);
        assert!(config.stop_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_width_above_maximum() {
        let config = SpeculativeConfig::default().with_width(17);
        assert!(matches!(config.validate(), Err(SpecError::InvalidArgument(_))));
        assert!(SpeculativeConfig::default().with_width(0).validate().is_ok());
    }

    #[test]
    fn test_adaptive_bounds() {
        let mut config = SpeculativeConfig {
            adaptive: Some(AdaptiveConfig {
                min_width: 6,
                max_width: 2,
                ..AdaptiveConfig::default()
            }),
            ..SpeculativeConfig::default()
        };
        assert!(config.validate().is_err());

        config.adaptive = Some(AdaptiveConfig {
            window: 0,
            ..AdaptiveConfig::default()
        });
        assert!(config.validate().is_err());

        config.adaptive = Some(AdaptiveConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_threshold() {
        let config = SpeculativeConfig::default().with_policy(PolicyKind::Threshold { cutoff: 1.5 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let config: SpeculativeConfig = toml::from_str(
            r#"
            speculation_width = 6
            overshoot = "allow"
            stop_token = 256

            [policy]
            kind = "threshold"
            cutoff = 0.05

            [adaptive]
            max_width = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.speculation_width, 6);
        assert_eq!(config.max_speculation_width, 16);
        assert_eq!(config.overshoot, OvershootPolicy::Allow);
        assert_eq!(config.stop_token, Some(256));
        assert_eq!(config.policy, PolicyKind::Threshold { cutoff: 0.05 });
        let adaptive = config.adaptive.unwrap();
        assert_eq!(adaptive.max_width, 10);
        assert_eq!(adaptive.min_width, 1);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: SpeculativeConfig = toml::from_str("").unwrap();
        assert_eq!(config, SpeculativeConfig::default());
    }
}
