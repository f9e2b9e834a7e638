//! Answer generation with LLM and citation handling

pub mod answerer;
pub mod citation;
pub mod prompt;

pub use answerer::{RagAnswerer, EMPTY_QUESTION_REPLY};
pub use citation::{build_citations, render_citation_block, web_citations};
pub use prompt::{PromptBuilder, NO_CONTEXT};
