//! Question answering over local report files.
//!
//! Flow: [`load_documents`] → [`chunk_documents`] → [`VectorIndex::build`] →
//! [`VectorIndex::save`]; later [`VectorIndex::load`] → [`answer`].

pub mod chunker;
pub mod index;
pub mod loader;
pub mod qa;

pub use chunker::{Chunk, chunk_documents};
pub use index::{INDEX_FILE, IndexMeta, SearchHit, VectorIndex, corpus_hash};
pub use loader::{Document, load_documents};
pub use qa::{Answer, NOT_FOUND_ANSWER, answer};
