pub mod citations;
pub mod embedding;
pub mod linker;
pub mod vector_store;

pub use embedding::HashingEmbedder;
pub use vector_store::{StoreManifest, VectorStore};
