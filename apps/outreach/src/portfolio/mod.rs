// Portfolio catalog: CSV loading, embedding, and the persistent similarity index.

pub mod catalog;
pub mod embedder;
pub mod index;
