use std::time::{Duration, Instant};

use sd_model::{ByteTokenizer, ChainScorer, Corpus, ModelSpec, Tokenizer};
use sd_sampler::{ProcessorChain, RngSource, Token};
use sd_speculative::{
    auto_regressive_with, DraftProposer, Generation, InstructionProposer, ModelProposer, Scorer,
    SpeculativeConfig, SpeculativeGenerator,
};
use tracing::info;

use crate::config::RunConfig;
use crate::error::{CliError, Result};

/// One timed generation.
pub struct Timed {
    pub generation: Generation,
    pub elapsed: Duration,
}

/// Baseline and speculative runs over the same prompt and seed.
pub struct Report {
    pub baseline: Timed,
    pub speculative: Timed,
    pub policy: String,
}

impl Report {
    pub fn speedup(&self) -> f64 {
        let fast = self.speculative.elapsed.as_secs_f64();
        if fast == 0.0 {
            return 0.0;
        }
        self.baseline.elapsed.as_secs_f64() / fast
    }
}

pub fn run(config: &RunConfig, prompt: &str) -> Result<Report> {
    let corpus_path = config.corpus.as_deref().ok_or(CliError::Missing("corpus"))?;
    let draft_spec: ModelSpec = config
        .draft
        .parse()
        .map_err(CliError::model("parsing draft model"))?;
    let target_spec: ModelSpec = config
        .target
        .parse()
        .map_err(CliError::model("parsing target model"))?;

    let tokenizer = ByteTokenizer::new();
    let corpus = Corpus::open(corpus_path, &tokenizer).map_err(CliError::model("loading corpus"))?;
    info!(
        path = %corpus_path.display(),
        tokens = corpus.len(),
        draft = %draft_spec,
        target = %target_spec,
        "corpus loaded"
    );

    let chain = || ProcessorChain::from_params(config.temperature, config.top_k, config.top_p);
    let target = ChainScorer::new(
        target_spec
            .build(&corpus)
            .map_err(CliError::model("building target model"))?,
        chain(),
    );

    let mut spec_config = config.speculative.clone();
    if spec_config.stop_token.is_none() {
        spec_config.stop_token = tokenizer.eot_id();
    }
    let prompt = tokenizer.encode(prompt);

    let start = Instant::now();
    let generation = auto_regressive_with(
        &prompt,
        config.max_tokens,
        &target,
        spec_config.stop_token,
        &mut RngSource::seeded(config.seed),
    )?;
    let baseline = Timed {
        generation,
        elapsed: start.elapsed(),
    };

    let policy = spec_config.policy.to_string();
    let speculative = match &config.instruction {
        Some(text) => {
            let proposer = InstructionProposer::new(tokenizer.encode(text), tokenizer.vocab_size())?;
            speculate(proposer, &target, spec_config, &prompt, config)?
        }
        None => {
            let draft = ChainScorer::new(
                draft_spec
                    .build(&corpus)
                    .map_err(CliError::model("building draft model"))?,
                chain(),
            );
            speculate(ModelProposer::new(draft), &target, spec_config, &prompt, config)?
        }
    };

    Ok(Report {
        baseline,
        speculative,
        policy,
    })
}

fn speculate<P: DraftProposer>(
    proposer: P,
    target: &dyn Scorer,
    spec_config: SpeculativeConfig,
    prompt: &[Token],
    config: &RunConfig,
) -> Result<Timed> {
    let mut generator = SpeculativeGenerator::new(proposer, target, spec_config)?;
    let start = Instant::now();
    let generation = generator.generate(
        prompt,
        config.max_tokens,
        &mut RngSource::seeded(config.seed),
    )?;
    Ok(Timed {
        generation,
        elapsed: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use sd_speculative::PolicyKind;

    use super::*;

    const TEXT: &str = "the cat sat on the mat. the dog sat on the log. ";

    fn config_for(file: &tempfile::NamedTempFile) -> RunConfig {
        RunConfig {
            corpus: Some(file.path().to_path_buf()),
            ..RunConfig::default()
        }
    }

    fn corpus_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEXT.repeat(10).as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_run_requires_corpus() {
        let err = run(&RunConfig::default(), "the").err().unwrap();
        assert!(matches!(err, CliError::Missing("corpus")));
    }

    #[test]
    fn test_run_rejects_bad_model_spec() {
        let file = corpus_file();
        let config = RunConfig {
            target: "transformer".to_string(),
            ..config_for(&file)
        };
        let err = run(&config, "the").err().unwrap();
        assert!(matches!(err, CliError::Model { .. }));
    }

    #[test]
    fn test_greedy_target_runs_agree() {
        let file = corpus_file();
        let config = RunConfig {
            top_k: 1,
            max_tokens: 20,
            ..config_for(&file)
        };
        let report = run(&config, "the dog").unwrap();
        assert_eq!(report.baseline.generation.tokens, report.speculative.generation.tokens);
        assert_eq!(report.policy, "rejection");
        assert!(
            report.speculative.generation.stats.target_calls
                <= report.baseline.generation.stats.target_calls
        );
    }

    #[test]
    fn test_instruction_replaces_draft_model() {
        let file = corpus_file();
        let mut config = RunConfig {
            target: "ngram:8".to_string(),
            top_k: 1,
            max_tokens: 8,
            instruction: Some(" sat on".to_string()),
            ..config_for(&file)
        };
        config.speculative.speculation_width = 8;
        config.speculative.policy = PolicyKind::Greedy;
        let report = run(&config, "the cat").unwrap();
        let stats = &report.speculative.generation.stats;
        assert_eq!(stats.draft_calls, 0);
        assert_eq!(stats.accepted, 7);
    }
}
