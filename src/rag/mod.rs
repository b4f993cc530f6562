//! Course index: embedders plus the SQLite-backed vector store.

pub mod embedding;
pub mod sqlite;
pub mod store;

pub use embedding::{build_embedder, cosine_similarity, Embedder, HashEmbedder, OpenAiEmbedder};
pub use sqlite::SqliteVectorStore;
pub use store::{SearchFilter, SearchHit, VectorStore};
