//! Text front end: cleaning, codepoint indexing and sentence chunking.

pub mod chunker;
pub mod indexer;
pub mod normalizer;

pub use chunker::chunk;
pub use indexer::{CodepointIndexer, SENTINEL_ID};
pub use normalizer::{NormalizedText, TextNormalizer};
