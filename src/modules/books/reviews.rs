//! Review ledger rules and the rating aggregate.
//!
//! Reviews are append-only. Each append folds its rating into the book's
//! `(sum, count)` aggregate in the same conditional write, so the derived
//! mean always matches the set of committed reviews.

use biblio_db::ReviewRecord;

use super::error::LendingError;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// Check a client-supplied rating and narrow it to the stored width.
pub fn validate_rating(rating: i64) -> Result<u8, LendingError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(LendingError::invalid(
            "rating",
            format!("must be between {MIN_RATING} and {MAX_RATING}, got {rating}"),
        ));
    }
    u8::try_from(rating).map_err(|_| LendingError::invalid("rating", "out of range"))
}

/// Reject comments longer than `max_chars` characters. Oversized comments
/// are never truncated.
pub fn validate_comment(comment: &str, max_chars: usize) -> Result<(), LendingError> {
    let length = comment.chars().count();
    if length > max_chars {
        return Err(LendingError::invalid(
            "comment",
            format!("must be at most {max_chars} characters, got {length}"),
        ));
    }
    Ok(())
}

/// Latest first; ties broken by id so equal timestamps still order stably.
pub fn latest_first(mut reviews: Vec<ReviewRecord>) -> Vec<ReviewRecord> {
    reviews.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    reviews
}
