//! Hosted provider clients for rivalscope.
//!
//! Every external collaborator sits behind a narrow async trait so the
//! workflow and document QA can be driven by mocks in tests:
//! - [`TextGenerator`]: prompt in, free text out ([`GeminiGenerator`])
//! - [`SearchProvider`]: query in, `(url, content)` hits out ([`TavilySearch`])
//! - [`Embedder`]: texts in, vectors out ([`GeminiEmbedder`])
//!
//! Clients are built explicitly from config and injected; nothing here is global.

mod embedding;
mod generator;
mod http;
mod search;

pub use embedding::{Embedder, GeminiEmbedder};
pub use generator::{GeminiGenerator, TextGenerator};
pub use search::{SearchProvider, TavilySearch};
