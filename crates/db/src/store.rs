//! Persistence contract for books and their reviews.
//!
//! Lending and catalog changes to a book row are conditional writes against
//! the row's `version`. Backends must apply the check and the write as one
//! atomic unit, so two writers that read the same version can never both
//! succeed. Losing the race is reported as [`WriteResult::PreconditionFailed`],
//! never as an error.
//!
//! The rating aggregate is not covered by `version`. Review appends increment
//! it in place on the stored row, so they never race each other or a pending
//! lending transition.

use async_trait::async_trait;

use crate::error::Result;
use crate::record::{BookId, BookRecord, CatalogEntry, NewReview, ReviewRecord};

/// Outcome of a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteResult<T> {
    /// The write was applied.
    Success(T),
    /// The row changed since it was read. `current_version` is `None` when
    /// the row no longer exists.
    PreconditionFailed { current_version: Option<u64> },
}

impl<T> WriteResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, WriteResult::Success(_))
    }
}

/// Transactional store for book rows and the review ledger.
///
/// Shared by every request, and possibly by several service instances, so
/// implementations must not rely on the caller holding any in-process lock.
#[async_trait]
pub trait CatalogStore: Send + Sync + 'static {
    /// Reads a book row.
    async fn get_book(&self, id: BookId) -> Result<Option<BookRecord>>;

    /// Reads all book rows ordered by id.
    async fn list_books(&self) -> Result<Vec<BookRecord>>;

    /// Inserts a new book. It starts available, unrated, at version 1.
    async fn insert_book(&self, catalog: CatalogEntry) -> Result<BookRecord>;

    /// Replaces a book row if its stored version equals `expected_version`.
    ///
    /// Only catalog and loan fields are written; the stored rating aggregate
    /// is kept whatever `record.rating` holds. On success the returned row
    /// carries the bumped version.
    async fn update_book(
        &self,
        record: BookRecord,
        expected_version: u64,
    ) -> Result<WriteResult<BookRecord>>;

    /// Deletes a book and every review that references it.
    ///
    /// Returns `false` when the book did not exist.
    async fn delete_book(&self, id: BookId) -> Result<bool>;

    /// Appends a review and adds its rating to the book's stored aggregate in
    /// one transaction.
    ///
    /// Returns `None` when the book does not exist. The book's `version` is
    /// left unchanged.
    async fn append_review(&self, review: NewReview) -> Result<Option<ReviewRecord>>;

    /// Reads every review of a book in insertion order.
    async fn list_reviews(&self, book_id: BookId) -> Result<Vec<ReviewRecord>>;
}
