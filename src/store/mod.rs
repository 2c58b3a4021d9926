//! Exchange storage: SQLite + USearch hybrid
//!
//! SQLite is the source of truth for exchange records; USearch provides
//! fast vector similarity search via an HNSW index keyed by SQLite rowid.
//! The retrieval engine only ever reads from this store.

mod exchanges;
pub mod types;

pub use exchanges::{ExchangeStore, VectorHit};
pub use types::{DateRange, Exchange, ToolCall};
