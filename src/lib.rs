pub mod assemble;
pub mod config;
pub mod embeddings;
pub mod search;
pub mod store;

// Re-export commonly used types
pub use search::{RecallEngine, SearchMode, SearchOptions};
pub use store::{Exchange, ExchangeStore};
