//! Catalog persistence for the library service.
//!
//! Books and their reviews live in a transactional store behind the
//! [`CatalogStore`] trait. Only the in-memory backend ships with this crate.

use std::sync::Arc;

pub mod error;
pub mod memory;
pub mod record;
pub mod seed;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use record::{
    BookId, BookRecord, CatalogEntry, Loan, NewReview, RatingAggregate, ReviewId, ReviewRecord,
};
pub use store::{CatalogStore, WriteResult};

const MEMORY_SCHEME: &str = "memory://";

/// Open the store named by `endpoint`.
pub fn connect(endpoint: &str) -> Result<Arc<dyn CatalogStore>> {
    if endpoint.starts_with(MEMORY_SCHEME) {
        tracing::info!(target: "biblio-db", %endpoint, "using in-memory catalog store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    Err(StoreError::UnsupportedEndpoint {
        endpoint: endpoint.to_string(),
    })
}
