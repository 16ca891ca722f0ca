//! Row shapes persisted by the catalog store.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Primary key of a book row.
pub type BookId = u64;

/// Primary key of a review row.
pub type ReviewId = u64;

/// Catalog metadata of a book. Lending never touches these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub publication_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub page_count: u32,
}

/// An active loan. Present on a book row exactly while the book is checked out,
/// so the borrower and the checkout timestamp can never drift from the flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub user_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub checked_out_at: OffsetDateTime,
}

/// Running rating totals for a book.
///
/// The mean is derived on read so repeated appends never accumulate
/// floating-point drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingAggregate {
    pub sum: u64,
    pub count: u64,
}

impl RatingAggregate {
    /// Aggregate with one more rating folded in.
    pub fn with_rating(self, rating: u8) -> Self {
        Self {
            sum: self.sum + u64::from(rating),
            count: self.count + 1,
        }
    }

    /// Arithmetic mean of all folded ratings, `0.0` when there are none.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

/// A persisted book row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: BookId,
    pub catalog: CatalogEntry,
    pub loan: Option<Loan>,
    pub rating: RatingAggregate,
    /// Row version used for conditional writes. Bumped by every successful write.
    pub version: u64,
}

impl BookRecord {
    pub fn is_checked_out(&self) -> bool {
        self.loan.is_some()
    }
}

/// A persisted review row. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: ReviewId,
    pub book_id: BookId,
    pub author_user_id: String,
    pub rating: u8,
    pub comment: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A review about to be appended; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub book_id: BookId,
    pub author_user_id: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: OffsetDateTime,
}

impl NewReview {
    pub(crate) fn into_record(self, id: ReviewId) -> ReviewRecord {
        ReviewRecord {
            id,
            book_id: self.book_id,
            author_user_id: self.author_user_id,
            rating: self.rating,
            comment: self.comment,
            created_at: self.created_at,
        }
    }
}
