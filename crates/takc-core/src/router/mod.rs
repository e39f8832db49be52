//! Query routing: pick a compression rate, fetch its entry, synthesize an answer

mod answer;
mod classifier;

pub use answer::{AnswerMetadata, Query, QueryAnswer, QueryRouter};
pub use classifier::{select_rate, Complexity, ComplexityClassifier, KeywordClassifier};
