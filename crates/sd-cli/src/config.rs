//! File configuration for `specdec`.
//!
//! Every key is optional. Command-line flags override file values.
//!
//! ```toml
//! corpus = "data/corpus.txt"
//! draft = "ngram:2"
//! target = "ngram:5"
//! max_tokens = 64
//!
//! [speculative]
//! speculation_width = 6
//! policy = { kind = "threshold", cutoff = 0.05 }
//!
//! [logging]
//! format = "json"
//! level = "sd_speculative=debug"
//! ```

use std::path::{Path, PathBuf};

use sd_speculative::SpeculativeConfig;
use serde::Deserialize;

use crate::error::{CliError, Result};
use crate::logging::LogConfig;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Text file both models are trained on.
    pub corpus: Option<PathBuf>,
    /// Draft model spec, `ngram:<order>` or `uniform`.
    pub draft: String,
    /// Target model spec.
    pub target: String,
    pub max_tokens: usize,
    pub temperature: f32,
    /// 0 disables top-k filtering.
    pub top_k: usize,
    pub top_p: f32,
    pub seed: u64,
    /// Propose this text instead of running the draft model.
    pub instruction: Option<String>,
    pub speculative: SpeculativeConfig,
    pub logging: LogConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            corpus: None,
            draft: "ngram:2".to_string(),
            target: "ngram:4".to_string(),
            max_tokens: 64,
            temperature: 0.7,
            top_k: 0,
            top_p: 1.0,
            seed: 0,
            instruction: None,
            speculative: SpeculativeConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl RunConfig {
    /// Read `path`, or fall back to defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<RunConfig> {
        let Some(path) = path else {
            return Ok(RunConfig::default());
        };
        let content = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| CliError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use sd_speculative::PolicyKind;

    use super::*;
    use crate::logging::LogFormat;

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = RunConfig::load(None).unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.speculative.speculation_width, 4);
    }

    #[test]
    fn test_load_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
corpus = "corpus.txt"
target = "ngram:6"
max_tokens = 12
seed = 9

[speculative]
speculation_width = 6
policy = {{ kind = "threshold", cutoff = 0.05 }}

[logging]
format = "json"
level = "debug"
"#
        )
        .unwrap();

        let config = RunConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.corpus, Some(PathBuf::from("corpus.txt")));
        assert_eq!(config.draft, "ngram:2");
        assert_eq!(config.target, "ngram:6");
        assert_eq!(config.max_tokens, 12);
        assert_eq!(config.seed, 9);
        assert_eq!(config.speculative.speculation_width, 6);
        assert_eq!(
            config.speculative.policy,
            PolicyKind::Threshold { cutoff: 0.05 }
        );
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_missing_file() {
        let err = RunConfig::load(Some(Path::new("/nonexistent/specdec.toml"))).unwrap_err();
        assert!(matches!(err, CliError::ConfigRead { .. }));
    }

    #[test]
    fn test_load_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "max_tokens = \"many\"").unwrap();
        let err = RunConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, CliError::ConfigParse { .. }));
    }
}
