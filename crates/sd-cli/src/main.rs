//! `specdec` - run speculative and plain autoregressive generation side by
//! side over n-gram models trained on a text corpus.

mod config;
mod error;
mod logging;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sd_model::{ByteTokenizer, Tokenizer};
use sd_speculative::PolicyKind;

use crate::config::RunConfig;
use crate::error::Result;
use crate::logging::LogFormat;
use crate::run::{Report, Timed};

#[derive(Parser, Debug)]
#[command(name = "specdec")]
#[command(version, about = "Speculative sampling with a draft and a target model")]
struct Cli {
    /// Prompt text to continue
    #[arg(short, long)]
    prompt: String,

    /// Corpus the models are trained on
    #[arg(short, long)]
    corpus: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Draft model (`ngram:<order>` or `uniform`)
    #[arg(long)]
    draft: Option<String>,

    /// Target model (`ngram:<order>` or `uniform`)
    #[arg(long)]
    target: Option<String>,

    /// Tokens to generate
    #[arg(short = 'n', long)]
    max_tokens: Option<usize>,

    /// Draft tokens proposed per cycle
    #[arg(short = 'k', long)]
    speculation_width: Option<usize>,

    /// Acceptance policy: rejection, greedy, threshold[:<cutoff>]
    #[arg(long)]
    policy: Option<PolicyKind>,

    /// Propose this text instead of running the draft model
    #[arg(long)]
    instruction: Option<String>,

    #[arg(long)]
    temperature: Option<f32>,

    #[arg(long)]
    top_k: Option<usize>,

    #[arg(long)]
    top_p: Option<f32>,

    #[arg(long)]
    seed: Option<u64>,

    /// Log format: json or pretty
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Log filter directive
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Overlay flags that were given on top of `config`.
    fn apply(self, config: &mut RunConfig) {
        if let Some(corpus) = self.corpus {
            config.corpus = Some(corpus);
        }
        if let Some(draft) = self.draft {
            config.draft = draft;
        }
        if let Some(target) = self.target {
            config.target = target;
        }
        if let Some(n) = self.max_tokens {
            config.max_tokens = n;
        }
        if let Some(k) = self.speculation_width {
            config.speculative.speculation_width = k;
        }
        if let Some(policy) = self.policy {
            config.speculative.policy = policy;
        }
        if let Some(instruction) = self.instruction {
            config.instruction = Some(instruction);
        }
        if let Some(t) = self.temperature {
            config.temperature = t;
        }
        if let Some(k) = self.top_k {
            config.top_k = k;
        }
        if let Some(p) = self.top_p {
            config.top_p = p;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let mut config = RunConfig::load(cli.config.as_deref())?;
    let prompt = cli.prompt.clone();
    cli.apply(&mut config);
    logging::init_logging(&config.logging)?;

    let report = run::run(&config, &prompt)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &Report) {
    let tokenizer = ByteTokenizer::new();
    let show = |label: &str, timed: &Timed| {
        let generated = timed.generation.generated();
        let stats = &timed.generation.stats;
        println!("[{}] {:?}", label, tokenizer.decode(generated));
        println!(
            "  {} tokens, {} target calls, {:.2} ms",
            generated.len(),
            stats.target_calls,
            timed.elapsed.as_secs_f64() * 1000.0
        );
    };

    show("autoregressive", &report.baseline);
    show("speculative", &report.speculative);
    let stats = &report.speculative.generation.stats;
    println!(
        "  policy {}, {} cycles, acceptance {:.1}%, {:.2} tokens per target call, speedup {:.2}x",
        report.policy,
        stats.cycles,
        stats.acceptance_rate() * 100.0,
        stats.tokens_per_target_call(),
        report.speedup()
    );
}
