//! `sd-sampler` - Categorical distributions and token sampling for specdec.
//!
//! This crate provides:
//! - `Distribution`, an immutable categorical distribution over a vocabulary
//! - `RandomSource`, the single injectable source of uniform variates
//! - `sample` / `greedy` token selection
//! - A `ProcessorChain` of logit processors (temperature, top-k, top-p)
//!   used by scorers to turn logits into distributions

pub mod distribution;
pub mod error;
pub mod processor;
pub mod random;
pub mod sample;
pub mod temperature;
pub mod top_k;
pub mod top_p;

pub use distribution::{Distribution, Token};
pub use error::{Result, SamplerError};
pub use processor::{LogitProcessor, ProcessorChain, TokenLogit};
pub use random::{RandomSource, RngSource};
pub use sample::{greedy, sample};
pub use temperature::TemperatureProcessor;
pub use top_k::TopKProcessor;
pub use top_p::TopPProcessor;
