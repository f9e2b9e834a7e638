//! Retrieval-augmented answering

use std::sync::Arc;

use crate::config::{AnswerConfig, RagConfig};
use crate::error::Result;
use crate::providers::{LlmProvider, VectorStoreProvider, WebResult, WebSearchProvider};
use crate::types::{Answer, Citation, ContextOrigin, ConversationTurn, RetrievedChunk};

use super::citation::{build_citations, render_citation_block, web_citations};
use super::prompt::{PromptBuilder, NO_CONTEXT};

/// Reply to an empty question; no retrieval or completion happens
pub const EMPTY_QUESTION_REPLY: &str =
    "Please ask a question about drinks, ingredients or technique and I'll search the library.";

/// Answers questions from the vector index, falling back to web search
pub struct RagAnswerer {
    index: Arc<dyn VectorStoreProvider>,
    llm: Arc<dyn LlmProvider>,
    web: Option<Arc<dyn WebSearchProvider>>,
    config: AnswerConfig,
    temperature: f32,
    web_results: usize,
}

impl RagAnswerer {
    pub fn new(
        index: Arc<dyn VectorStoreProvider>,
        llm: Arc<dyn LlmProvider>,
        config: &RagConfig,
    ) -> Self {
        Self {
            index,
            llm,
            web: None,
            config: config.answer.clone(),
            temperature: config.llm.temperature,
            web_results: config.web_search.num_results,
        }
    }

    /// Enable the web fallback
    pub fn with_web_search(mut self, web: Option<Arc<dyn WebSearchProvider>>) -> Self {
        self.web = web;
        self
    }

    /// Answer `question` given the client's conversation history
    pub async fn answer(&self, question: &str, history: &[ConversationTurn]) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(Answer {
                text: EMPTY_QUESTION_REPLY.to_string(),
                citations: Vec::new(),
                context: ContextOrigin::Skipped,
            });
        }

        let chunks = self.retrieve(question).await;
        let corpus_context = PromptBuilder::build_context(&chunks);

        let (context, citations, origin) =
            if corpus_context.chars().count() >= self.config.min_context_chars {
                let citations = build_citations(&chunks, self.config.max_citations);
                (corpus_context, citations, ContextOrigin::Corpus)
            } else {
                self.fallback(question, &chunks, corpus_context).await
            };

        tracing::info!(
            chunks = chunks.len(),
            citations = citations.len(),
            context = ?origin,
            "Answering question"
        );

        let messages = PromptBuilder::build_messages(
            &self.config.system_prompt,
            history,
            self.config.history_turns,
            &context,
            question,
        );
        let reply = self.llm.complete(&messages, self.temperature).await?;

        Ok(Answer {
            text: format!("{}{}", reply.trim(), render_citation_block(&citations)),
            citations,
            context: origin,
        })
    }

    /// Short or empty corpus context: try the web, keep whatever corpus
    /// context exists if that yields nothing
    async fn fallback(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
        corpus_context: String,
    ) -> (String, Vec<Citation>, ContextOrigin) {
        let web = self.search_web(question).await;
        if !web.is_empty() {
            return (
                PromptBuilder::build_web_context(&web),
                web_citations(&web, self.config.max_citations),
                ContextOrigin::Web,
            );
        }

        if !corpus_context.is_empty() {
            let citations = build_citations(chunks, self.config.max_citations);
            return (corpus_context, citations, ContextOrigin::Corpus);
        }

        (NO_CONTEXT.to_string(), Vec::new(), ContextOrigin::Empty)
    }

    async fn retrieve(&self, question: &str) -> Vec<RetrievedChunk> {
        match self.index.query(question, self.config.top_k).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(error = %e, "Index query failed; continuing without corpus context");
                Vec::new()
            }
        }
    }

    async fn search_web(&self, question: &str) -> Vec<WebResult> {
        let Some(web) = &self.web else {
            return Vec::new();
        };

        match web.search(question, self.web_results).await {
            Ok(results) => {
                tracing::debug!(provider = web.name(), results = results.len(), "Web search fallback");
                results
            }
            Err(e) => {
                tracing::warn!(provider = web.name(), error = %e, "Web search failed");
                Vec::new()
            }
        }
    }
}
