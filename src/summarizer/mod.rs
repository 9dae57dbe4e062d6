//! Keyword summaries for clusters.

mod keywords;
mod tokenizer;

#[cfg(test)]
mod tests;

pub use keywords::{df_bounds, KeywordSummarizer};
pub(crate) use tokenizer::is_cjk;
pub use tokenizer::{tokenize, STOP_WORDS};
