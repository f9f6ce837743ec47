//! Retrieval-augmented answering over a [`VectorIndex`].

use tracing::{info, instrument};

use rivalscope_providers::{Embedder, TextGenerator};
use rivalscope_shared::{Result, RivalscopeError};

use crate::index::{SearchHit, VectorIndex};

/// What the generator is told to say when the context has no answer.
pub const NOT_FOUND_ANSWER: &str =
    "I could not find any information about this in the provided documents.";

/// A generated answer and the files its context came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    /// Source file names of the retrieved chunks, in retrieval order.
    pub sources: Vec<String>,
}

/// Embed `question`, retrieve the `k` closest chunks, and ask the generator.
#[instrument(skip_all, fields(k = k, question_chars = question.len()))]
pub async fn answer(
    question: &str,
    index: &VectorIndex,
    embedder: &dyn Embedder,
    generator: &dyn TextGenerator,
    k: usize,
) -> Result<Answer> {
    let question = question.trim();
    if question.is_empty() {
        return Err(RivalscopeError::validation("question must not be empty"));
    }

    let query = embedder
        .embed(&[question.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| RivalscopeError::provider(embedder.model(), "no embedding for question"))?;

    let hits = index.search(&query, k)?;
    let text = generator.generate(&render_prompt(question, &hits)).await?;

    let sources = hits.iter().map(|h| h.chunk.source_name()).collect();
    info!(retrieved = hits.len(), "question answered");
    Ok(Answer {
        text: text.trim().to_string(),
        sources,
    })
}

/// The QA prompt with retrieved chunks stuffed into the context.
pub fn render_prompt(question: &str, hits: &[SearchHit<'_>]) -> String {
    let context = hits
        .iter()
        .map(|h| h.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"Use the following information to answer the user's question.
If you don't know the answer, just say "{NOT_FOUND_ANSWER}", don't try to make up an answer.
Be as concise and precise as possible.

Context: {context}
Question: {question}

Helpful answer:"#
    )
}
