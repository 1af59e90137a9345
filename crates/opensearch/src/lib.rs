//! OpenSearch/Elasticsearch backend for the alert engine.

pub mod client;
pub mod dsl;

pub use client::OpenSearchClient;
pub use dsl::search_body;
