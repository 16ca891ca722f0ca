//! In-memory transactional backend.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::record::{
    BookId, BookRecord, CatalogEntry, NewReview, RatingAggregate, ReviewId, ReviewRecord,
};
use crate::store::{CatalogStore, WriteResult};

/// Both tables live behind one lock so a review append and its aggregate
/// update commit together.
#[derive(Debug, Default)]
struct Tables {
    books: BTreeMap<BookId, BookRecord>,
    reviews: BTreeMap<ReviewId, ReviewRecord>,
    next_book_id: BookId,
    next_review_id: ReviewId,
}

/// In-memory catalog store.
///
/// Thread-safe via `RwLock`; data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_book(&self, id: BookId) -> Result<Option<BookRecord>> {
        Ok(self.tables.read().books.get(&id).cloned())
    }

    async fn list_books(&self) -> Result<Vec<BookRecord>> {
        Ok(self.tables.read().books.values().cloned().collect())
    }

    async fn insert_book(&self, catalog: CatalogEntry) -> Result<BookRecord> {
        let mut tables = self.tables.write();
        tables.next_book_id += 1;
        let record = BookRecord {
            id: tables.next_book_id,
            catalog,
            loan: None,
            rating: RatingAggregate::default(),
            version: 1,
        };
        tables.books.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_book(
        &self,
        mut record: BookRecord,
        expected_version: u64,
    ) -> Result<WriteResult<BookRecord>> {
        let mut tables = self.tables.write();
        let Some(current) = tables.books.get_mut(&record.id) else {
            return Ok(WriteResult::PreconditionFailed {
                current_version: None,
            });
        };

        if current.version != expected_version {
            return Ok(WriteResult::PreconditionFailed {
                current_version: Some(current.version),
            });
        }

        record.rating = current.rating;
        record.version = current.version + 1;
        *current = record.clone();
        Ok(WriteResult::Success(record))
    }

    async fn delete_book(&self, id: BookId) -> Result<bool> {
        let mut tables = self.tables.write();
        if tables.books.remove(&id).is_none() {
            return Ok(false);
        }
        tables.reviews.retain(|_, review| review.book_id != id);
        Ok(true)
    }

    async fn append_review(&self, review: NewReview) -> Result<Option<ReviewRecord>> {
        let mut tables = self.tables.write();
        let Some(book) = tables.books.get_mut(&review.book_id) else {
            return Ok(None);
        };
        book.rating = book.rating.with_rating(review.rating);

        tables.next_review_id += 1;
        let record = review.into_record(tables.next_review_id);
        tables.reviews.insert(record.id, record.clone());
        Ok(Some(record))
    }

    async fn list_reviews(&self, book_id: BookId) -> Result<Vec<ReviewRecord>> {
        Ok(self
            .tables
            .read()
            .reviews
            .values()
            .filter(|review| review.book_id == book_id)
            .cloned()
            .collect())
    }
}
