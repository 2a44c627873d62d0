//! Inventory retriever implementations

mod in_memory;
mod postgres;

pub use in_memory::InMemoryInventoryRetriever;
pub use postgres::{build_search_query, escape_like, InventorySearchQuery, PostgresInventoryRetriever};
