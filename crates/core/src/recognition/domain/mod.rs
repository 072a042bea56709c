pub mod embedding;
pub mod embedding_cache;
pub mod embedding_extractor;
pub mod embedding_store;
pub mod matcher;
