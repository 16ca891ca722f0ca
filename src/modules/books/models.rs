use biblio_db::{BookId, BookRecord, CatalogEntry, ReviewId, ReviewRecord};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::lending::{due_date, Availability};

/// A book as returned to clients: catalog fields, lending state, and the
/// values derived from them at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    #[serde(flatten)]
    pub catalog: CatalogEntry,
    pub is_checked_out: bool,
    pub checked_out_by_user_id: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub checked_out_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    /// Mean of all review ratings, `0.0` for unreviewed books
    pub average_rating: f64,
    pub review_count: u64,
    /// "Available", "Overdue", or "Not Available (Due in N days)"
    pub availability: String,
}

impl Book {
    pub fn from_record(record: BookRecord, now: OffsetDateTime, loan_period_days: i64) -> Self {
        let loan = record.loan.as_ref();
        let availability = Availability::at(loan, now, loan_period_days).to_string();
        let due_date = due_date(loan, loan_period_days);

        Self {
            id: record.id,
            is_checked_out: record.is_checked_out(),
            checked_out_by_user_id: loan.map(|loan| loan.user_id.clone()),
            checked_out_date: loan.map(|loan| loan.checked_out_at),
            due_date,
            average_rating: record.rating.average(),
            review_count: record.rating.count,
            availability,
            catalog: record.catalog,
        }
    }
}

/// A review as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub book_id: BookId,
    pub user_id: String,
    pub rating: u8,
    pub comment: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<ReviewRecord> for Review {
    fn from(record: ReviewRecord) -> Self {
        Self {
            id: record.id,
            book_id: record.book_id,
            user_id: record.author_user_id,
            rating: record.rating,
            comment: record.comment,
            created_at: record.created_at,
        }
    }
}

/// Request body for posting a review.
///
/// Only rating and comment are read; book, author, and timestamp are set by
/// the server and any client-supplied values are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddReview {
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}
