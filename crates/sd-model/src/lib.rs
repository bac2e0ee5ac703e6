pub mod architecture;
pub mod corpus;
pub mod error;
pub mod model_spec;
pub mod ngram;
pub mod scorer;
pub mod tokenizer;
pub mod uniform;

pub use architecture::LogitModel;
pub use corpus::Corpus;
pub use error::{ModelError, Result};
pub use model_spec::ModelSpec;
pub use ngram::NgramModel;
pub use scorer::ChainScorer;
pub use tokenizer::{ByteTokenizer, Tokenizer};
pub use uniform::UniformModel;
