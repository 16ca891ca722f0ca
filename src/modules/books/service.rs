//! Lending service: authorizes, validates, and applies lending, review, and
//! catalog operations against the shared store.
//!
//! Lending and catalog changes are read-modify-writes guarded by the book
//! row's version. A writer that loses the race re-reads and re-applies its transition, so
//! the loser of two concurrent checkouts sees `AlreadyCheckedOut` rather than
//! overwriting the winner. Retries are bounded by
//! `lending.transition_attempts`; running out yields `Conflict`. Reviews
//! bypass the version: the store increments the rating aggregate in place.

use std::future::Future;
use std::sync::Arc;

use biblio_authz::{authorize, Caller, Operation};
use biblio_db::{BookId, BookRecord, CatalogEntry, CatalogStore, NewReview, StoreError, WriteResult};
use biblio_kernel::settings::LendingSettings;
use time::OffsetDateTime;

use super::clock::{Clock, SystemClock};
use super::error::LendingError;
use super::lending::{self, TransitionError};
use super::models::{Book, Review};
use super::reviews;

pub struct LendingService {
    store: Arc<dyn CatalogStore>,
    clock: Arc<dyn Clock>,
    policy: LendingSettings,
}

impl LendingService {
    pub fn new(store: Arc<dyn CatalogStore>, policy: LendingSettings) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), policy)
    }

    pub fn with_clock(
        store: Arc<dyn CatalogStore>,
        clock: Arc<dyn Clock>,
        policy: LendingSettings,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    // ==================== Reads ====================

    pub async fn get_book(&self, book_id: BookId, caller: &Caller) -> Result<Book, LendingError> {
        authorize(Operation::ReadBook, caller)?;
        let record = self.load(book_id).await?;
        Ok(self.present(record))
    }

    pub async fn list_books(&self, caller: &Caller) -> Result<Vec<Book>, LendingError> {
        authorize(Operation::ListBooks, caller)?;
        let records = self
            .call_store("list_books", || self.store.list_books())
            .await?;
        let now = self.clock.now();
        Ok(records
            .into_iter()
            .map(|record| Book::from_record(record, now, self.policy.loan_period_days))
            .collect())
    }

    /// Reviews of a book, latest first.
    pub async fn list_reviews(
        &self,
        book_id: BookId,
        caller: &Caller,
    ) -> Result<Vec<Review>, LendingError> {
        authorize(Operation::ReadReviews, caller)?;
        self.load(book_id).await?;

        let rows = self
            .call_store("list_reviews", || self.store.list_reviews(book_id))
            .await?;
        Ok(reviews::latest_first(rows)
            .into_iter()
            .map(Review::from)
            .collect())
    }

    // ==================== Lending ====================

    pub async fn checkout(&self, book_id: BookId, caller: &Caller) -> Result<Book, LendingError> {
        authorize(Operation::Checkout, caller)?;
        let user_id = caller.user_id().ok_or(LendingError::Unauthenticated {
            operation: Operation::Checkout,
        })?;

        let record = self
            .transition(book_id, Operation::Checkout, |current, now| {
                lending::checkout(current, user_id, now).map_err(|err| match err {
                    TransitionError::AlreadyCheckedOut | TransitionError::NotCheckedOut => {
                        LendingError::AlreadyCheckedOut { book_id }
                    }
                })
            })
            .await?;

        tracing::info!(book_id, user_id, "book checked out");
        Ok(self.present(record))
    }

    pub async fn return_book(&self, book_id: BookId, caller: &Caller) -> Result<Book, LendingError> {
        authorize(Operation::Return, caller)?;

        let record = self
            .transition(book_id, Operation::Return, |current, _now| {
                lending::return_book(current).map_err(|_| LendingError::BadState { book_id })
            })
            .await?;

        tracing::info!(book_id, librarian = caller.user_id(), "book returned");
        Ok(self.present(record))
    }

    // ==================== Reviews ====================

    /// Append a review. The store folds its rating into the book's aggregate
    /// in the same transaction, so concurrent reviews serialize there rather
    /// than competing for the row version.
    pub async fn add_review(
        &self,
        book_id: BookId,
        caller: &Caller,
        rating: i64,
        comment: String,
    ) -> Result<Review, LendingError> {
        authorize(Operation::AddReview, caller)?;
        let user_id = caller.user_id().ok_or(LendingError::Unauthenticated {
            operation: Operation::AddReview,
        })?;
        let rating = reviews::validate_rating(rating)?;
        reviews::validate_comment(&comment, self.policy.max_comment_length)?;

        let review = NewReview {
            book_id,
            author_user_id: user_id.to_string(),
            rating,
            comment,
            created_at: self.clock.now(),
        };

        // Appends are not idempotent, so they get no retry.
        let row = self
            .store
            .append_review(review)
            .await
            .map_err(LendingError::StoreUnavailable)?
            .ok_or(LendingError::NotFound { book_id })?;

        tracing::info!(book_id, user_id, rating, review_id = row.id, "review added");
        Ok(Review::from(row))
    }

    // ==================== Catalog ====================

    pub async fn add_book(&self, caller: &Caller, catalog: CatalogEntry) -> Result<Book, LendingError> {
        authorize(Operation::AddBook, caller)?;
        validate_catalog(&catalog)?;

        // Inserts are not idempotent, so they get no retry.
        let record = self
            .store
            .insert_book(catalog)
            .await
            .map_err(LendingError::StoreUnavailable)?;

        tracing::info!(book_id = record.id, title = %record.catalog.title, "book added");
        Ok(self.present(record))
    }

    /// Replace a book's catalog fields. Lending state and ratings are kept.
    pub async fn edit_book(
        &self,
        book_id: BookId,
        caller: &Caller,
        catalog: CatalogEntry,
    ) -> Result<Book, LendingError> {
        authorize(Operation::EditBook, caller)?;
        validate_catalog(&catalog)?;

        let record = self
            .transition(book_id, Operation::EditBook, |current, _now| {
                let mut next = current.clone();
                next.catalog = catalog.clone();
                Ok(next)
            })
            .await?;

        tracing::info!(book_id, "book edited");
        Ok(self.present(record))
    }

    /// Delete a book together with its reviews.
    pub async fn delete_book(&self, book_id: BookId, caller: &Caller) -> Result<(), LendingError> {
        authorize(Operation::DeleteBook, caller)?;

        let existed = self
            .call_store("delete_book", || self.store.delete_book(book_id))
            .await?;
        if !existed {
            return Err(LendingError::NotFound { book_id });
        }

        tracing::info!(book_id, "book deleted with its reviews");
        Ok(())
    }

    // ==================== Internals ====================

    fn present(&self, record: BookRecord) -> Book {
        Book::from_record(record, self.clock.now(), self.policy.loan_period_days)
    }

    async fn load(&self, book_id: BookId) -> Result<BookRecord, LendingError> {
        self.call_store("get_book", || self.store.get_book(book_id))
            .await?
            .ok_or(LendingError::NotFound { book_id })
    }

    /// Apply `apply` to the current row and write the result conditionally,
    /// re-reading after every lost race.
    async fn transition<F>(
        &self,
        book_id: BookId,
        operation: Operation,
        apply: F,
    ) -> Result<BookRecord, LendingError>
    where
        F: Fn(&BookRecord, OffsetDateTime) -> Result<BookRecord, LendingError>,
    {
        let attempts = self.policy.transition_attempts;
        for attempt in 1..=attempts {
            let current = self.load(book_id).await?;
            let expected = current.version;
            let next = apply(&current, self.clock.now())?;

            let outcome = self
                .call_store("update_book", || self.store.update_book(next.clone(), expected))
                .await?;

            match outcome {
                WriteResult::Success(written) => return Ok(written),
                WriteResult::PreconditionFailed {
                    current_version: None,
                } => return Err(LendingError::NotFound { book_id }),
                WriteResult::PreconditionFailed {
                    current_version: Some(found),
                } => {
                    tracing::debug!(
                        book_id,
                        %operation,
                        attempt,
                        expected,
                        found,
                        "conditional write lost a race; retrying"
                    );
                }
            }
        }

        tracing::warn!(book_id, %operation, attempts, "transition exhausted its attempts");
        Err(LendingError::Conflict { book_id, attempts })
    }

    /// Run one store call, retrying transient unavailability within the
    /// attempt budget.
    async fn call_store<T, F, Fut>(&self, call_name: &'static str, mut call: F) -> Result<T, LendingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = biblio_db::Result<T>>,
    {
        let attempts = self.policy.transition_attempts;
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err @ StoreError::Unavailable { .. }) if attempt < attempts => {
                    tracing::warn!(call = call_name, attempt, error = %err, "store unavailable; retrying");
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(call = call_name, attempt, error = %err, "store call failed");
                    return Err(LendingError::StoreUnavailable(err));
                }
            }
        }
    }
}

fn validate_catalog(catalog: &CatalogEntry) -> Result<(), LendingError> {
    if catalog.title.trim().is_empty() {
        return Err(LendingError::invalid("title", "must not be empty"));
    }
    if catalog.author.trim().is_empty() {
        return Err(LendingError::invalid("author", "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::clock::FixedClock;
    use async_trait::async_trait;
    use biblio_db::{MemoryStore, ReviewRecord};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use time::macros::datetime;
    use time::Duration;

    const START: OffsetDateTime = datetime!(2024-08-12 09:30 UTC);

    fn entry(title: &str) -> CatalogEntry {
        CatalogEntry {
            title: title.to_string(),
            author: "Octavia E. Butler".to_string(),
            description: String::new(),
            cover_image: String::new(),
            publisher: String::new(),
            publication_date: None,
            category: "Science Fiction".to_string(),
            isbn: String::new(),
            page_count: 0,
        }
    }

    fn librarian() -> Caller {
        Caller::librarian("admin")
    }

    fn patron(id: &str) -> Caller {
        Caller::patron(id)
    }

    async fn service_over(
        store: Arc<dyn CatalogStore>,
        policy: LendingSettings,
    ) -> (LendingService, Arc<FixedClock>, BookId) {
        let book = store.insert_book(entry("Kindred")).await.unwrap();
        let clock = Arc::new(FixedClock::new(START));
        let service = LendingService::with_clock(store, clock.clone(), policy);
        (service, clock, book.id)
    }

    async fn fixture() -> (LendingService, Arc<FixedClock>, BookId) {
        service_over(Arc::new(MemoryStore::new()), LendingSettings::default()).await
    }

    fn assert_lending_fields_consistent(book: &Book) {
        assert_eq!(book.is_checked_out, book.checked_out_by_user_id.is_some());
        assert_eq!(book.is_checked_out, book.checked_out_date.is_some());
    }

    // ==================== Lending ====================

    #[tokio::test]
    async fn test_checkout_marks_book_unavailable() {
        let (service, _clock, id) = fixture().await;

        let book = service.checkout(id, &patron("p-1")).await.unwrap();
        assert!(book.is_checked_out);
        assert_eq!(book.checked_out_by_user_id.as_deref(), Some("p-1"));
        assert_eq!(book.checked_out_date, Some(START));
        assert_eq!(book.availability, "Not Available (Due in 5 days)");
        assert_lending_fields_consistent(&book);
    }

    #[tokio::test]
    async fn test_second_checkout_fails() {
        let (service, _clock, id) = fixture().await;

        service.checkout(id, &patron("p-1")).await.unwrap();
        let err = service.checkout(id, &patron("p-2")).await.unwrap_err();
        assert!(matches!(err, LendingError::AlreadyCheckedOut { book_id } if book_id == id));

        let book = service.get_book(id, &Caller::Anonymous).await.unwrap();
        assert_eq!(book.checked_out_by_user_id.as_deref(), Some("p-1"));
    }

    #[tokio::test]
    async fn test_checkout_return_checkout_cycles() {
        let (service, _clock, id) = fixture().await;

        let out = service.checkout(id, &patron("p-1")).await.unwrap();
        assert_lending_fields_consistent(&out);
        let back = service.return_book(id, &librarian()).await.unwrap();
        assert!(!back.is_checked_out);
        assert_eq!(back.availability, "Available");
        assert_lending_fields_consistent(&back);
        let again = service.checkout(id, &patron("p-2")).await.unwrap();
        assert_eq!(again.checked_out_by_user_id.as_deref(), Some("p-2"));
    }

    #[tokio::test]
    async fn test_return_of_available_book_is_bad_state() {
        let (service, _clock, id) = fixture().await;
        let err = service.return_book(id, &librarian()).await.unwrap_err();
        assert!(matches!(err, LendingError::BadState { .. }));
    }

    #[tokio::test]
    async fn test_patron_cannot_return() {
        let (service, _clock, id) = fixture().await;
        service.checkout(id, &patron("p-1")).await.unwrap();

        let err = service.return_book(id, &patron("p-1")).await.unwrap_err();
        assert!(matches!(err, LendingError::Forbidden { .. }));
        assert!(service.get_book(id, &Caller::Anonymous).await.unwrap().is_checked_out);
    }

    #[tokio::test]
    async fn test_checkout_of_unknown_book_is_not_found_for_any_role() {
        let (service, _clock, _id) = fixture().await;
        for caller in [patron("p-1"), librarian()] {
            let err = service.checkout(404, &caller).await.unwrap_err();
            assert!(matches!(err, LendingError::NotFound { book_id: 404 }));
        }
    }

    #[tokio::test]
    async fn test_anonymous_checkout_is_unauthenticated() {
        let (service, _clock, id) = fixture().await;
        let err = service.checkout(id, &Caller::Anonymous).await.unwrap_err();
        assert!(matches!(err, LendingError::Unauthenticated { .. }));
        assert!(!service.get_book(id, &Caller::Anonymous).await.unwrap().is_checked_out);
    }

    #[tokio::test]
    async fn test_availability_follows_clock_without_mutating() {
        let (service, clock, id) = fixture().await;
        service.checkout(id, &patron("p-1")).await.unwrap();

        clock.advance(Duration::days(5));
        let book = service.get_book(id, &Caller::Anonymous).await.unwrap();
        assert_eq!(book.availability, "Overdue");
        assert!(book.is_checked_out);

        clock.advance(Duration::days(1));
        assert_eq!(service.get_book(id, &Caller::Anonymous).await.unwrap().availability, "Overdue");

        // Overdue books still need an explicit return.
        let err = service.checkout(id, &patron("p-2")).await.unwrap_err();
        assert!(matches!(err, LendingError::AlreadyCheckedOut { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_have_one_winner() {
        let (service, _clock, id) = fixture().await;
        let service = Arc::new(service);

        let handles: Vec<_> = (0..16)
            .map(|n| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.checkout(id, &patron(&format!("p-{n}"))).await })
            })
            .collect();

        let mut winners = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(book) => winners.push(book),
                Err(LendingError::AlreadyCheckedOut { .. } | LendingError::Conflict { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(winners.len(), 1);
        let stored = service.get_book(id, &Caller::Anonymous).await.unwrap();
        assert_eq!(stored.checked_out_by_user_id, winners[0].checked_out_by_user_id);
    }

    /// Lets a rival checkout commit between our read and our write.
    struct RacingStore {
        inner: MemoryStore,
        raced: AtomicBool,
    }

    #[async_trait]
    impl CatalogStore for RacingStore {
        async fn get_book(&self, id: BookId) -> biblio_db::Result<Option<BookRecord>> {
            self.inner.get_book(id).await
        }

        async fn list_books(&self) -> biblio_db::Result<Vec<BookRecord>> {
            self.inner.list_books().await
        }

        async fn insert_book(&self, catalog: CatalogEntry) -> biblio_db::Result<BookRecord> {
            self.inner.insert_book(catalog).await
        }

        async fn update_book(
            &self,
            record: BookRecord,
            expected_version: u64,
        ) -> biblio_db::Result<WriteResult<BookRecord>> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let current = self.inner.get_book(record.id).await?.unwrap();
                let rival = lending::checkout(&current, "rival", START).unwrap();
                self.inner.update_book(rival, current.version).await?;
            }
            self.inner.update_book(record, expected_version).await
        }

        async fn delete_book(&self, id: BookId) -> biblio_db::Result<bool> {
            self.inner.delete_book(id).await
        }

        async fn append_review(&self, review: NewReview) -> biblio_db::Result<Option<ReviewRecord>> {
            self.inner.append_review(review).await
        }

        async fn list_reviews(&self, book_id: BookId) -> biblio_db::Result<Vec<ReviewRecord>> {
            self.inner.list_reviews(book_id).await
        }
    }

    #[tokio::test]
    async fn test_race_loser_sees_already_checked_out() {
        let store = Arc::new(RacingStore {
            inner: MemoryStore::new(),
            raced: AtomicBool::new(false),
        });
        let (service, _clock, id) = service_over(store, LendingSettings::default()).await;

        let err = service.checkout(id, &patron("p-1")).await.unwrap_err();
        assert!(matches!(err, LendingError::AlreadyCheckedOut { .. }));

        let book = service.get_book(id, &Caller::Anonymous).await.unwrap();
        assert_eq!(book.checked_out_by_user_id.as_deref(), Some("rival"));
    }

    /// Every conditional write loses; reads fail while `outages` lasts.
    struct HostileStore {
        inner: MemoryStore,
        outages: AtomicU32,
        always_stale: bool,
    }

    impl HostileStore {
        fn new(outages: u32, always_stale: bool) -> Self {
            Self {
                inner: MemoryStore::new(),
                outages: AtomicU32::new(outages),
                always_stale,
            }
        }
    }

    #[async_trait]
    impl CatalogStore for HostileStore {
        async fn get_book(&self, id: BookId) -> biblio_db::Result<Option<BookRecord>> {
            let remaining = self.outages.load(Ordering::SeqCst);
            if remaining > 0 {
                self.outages.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::unavailable("connection reset"));
            }
            self.inner.get_book(id).await
        }

        async fn list_books(&self) -> biblio_db::Result<Vec<BookRecord>> {
            self.inner.list_books().await
        }

        async fn insert_book(&self, catalog: CatalogEntry) -> biblio_db::Result<BookRecord> {
            self.inner.insert_book(catalog).await
        }

        async fn update_book(
            &self,
            record: BookRecord,
            expected_version: u64,
        ) -> biblio_db::Result<WriteResult<BookRecord>> {
            if self.always_stale {
                return Ok(WriteResult::PreconditionFailed {
                    current_version: Some(expected_version + 1),
                });
            }
            self.inner.update_book(record, expected_version).await
        }

        async fn delete_book(&self, id: BookId) -> biblio_db::Result<bool> {
            self.inner.delete_book(id).await
        }

        async fn append_review(&self, review: NewReview) -> biblio_db::Result<Option<ReviewRecord>> {
            self.inner.append_review(review).await
        }

        async fn list_reviews(&self, book_id: BookId) -> biblio_db::Result<Vec<ReviewRecord>> {
            self.inner.list_reviews(book_id).await
        }
    }

    #[tokio::test]
    async fn test_persistent_contention_surfaces_conflict() {
        let store = Arc::new(HostileStore::new(0, true));
        let (service, _clock, id) = service_over(store, LendingSettings::default()).await;

        let err = service.checkout(id, &patron("p-1")).await.unwrap_err();
        assert!(matches!(err, LendingError::Conflict { attempts: 3, .. }));

        // Reviews do not compete for the row version.
        let review = service
            .add_review(id, &patron("p-1"), 4, String::new())
            .await
            .unwrap();
        assert_eq!(review.rating, 4);
    }

    #[tokio::test]
    async fn test_transient_outage_is_retried() {
        let store = Arc::new(HostileStore::new(2, false));
        let (service, _clock, id) = service_over(store, LendingSettings::default()).await;

        let book = service.checkout(id, &patron("p-1")).await.unwrap();
        assert!(book.is_checked_out);
    }

    #[tokio::test]
    async fn test_long_outage_surfaces_store_unavailable() {
        let store = Arc::new(HostileStore::new(10, false));
        let (service, _clock, id) = service_over(store, LendingSettings::default()).await;

        let err = service.checkout(id, &patron("p-1")).await.unwrap_err();
        assert!(matches!(err, LendingError::StoreUnavailable(_)));
    }

    // ==================== Reviews ====================

    #[tokio::test]
    async fn test_average_rating_tracks_reviews() {
        let (service, _clock, id) = fixture().await;
        let reader = patron("p-1");

        for rating in [5, 3, 4] {
            service
                .add_review(id, &reader, rating, "ok".to_string())
                .await
                .unwrap();
        }
        let book = service.get_book(id, &Caller::Anonymous).await.unwrap();
        assert!((book.average_rating - 4.0).abs() < 1e-9);

        service
            .add_review(id, &reader, 2, String::new())
            .await
            .unwrap();
        let book = service.get_book(id, &Caller::Anonymous).await.unwrap();
        assert!((book.average_rating - 3.5).abs() < 1e-9);
        assert_eq!(book.review_count, 4);
    }

    #[tokio::test]
    async fn test_rating_bounds_are_enforced() {
        let (service, _clock, id) = fixture().await;
        let reader = patron("p-1");

        for rating in [0, 6] {
            let err = service
                .add_review(id, &reader, rating, String::new())
                .await
                .unwrap_err();
            assert!(matches!(err, LendingError::InvalidArgument { field: "rating", .. }));
        }
        for rating in [1, 5] {
            service
                .add_review(id, &reader, rating, String::new())
                .await
                .unwrap();
        }
        assert_eq!(service.get_book(id, &Caller::Anonymous).await.unwrap().review_count, 2);
    }

    #[tokio::test]
    async fn test_oversized_comment_is_rejected() {
        let (service, _clock, id) = fixture().await;
        let err = service
            .add_review(id, &patron("p-1"), 3, "x".repeat(257))
            .await
            .unwrap_err();
        assert!(matches!(err, LendingError::InvalidArgument { field: "comment", .. }));
        assert!(service
            .list_reviews(id, &patron("p-1"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_review_fields_are_set_server_side() {
        let (service, clock, id) = fixture().await;
        clock.set(datetime!(2024-09-01 18:00 UTC));

        let review = service
            .add_review(id, &patron("p-9"), 4, "Great".to_string())
            .await
            .unwrap();
        assert_eq!(review.book_id, id);
        assert_eq!(review.user_id, "p-9");
        assert_eq!(review.created_at, datetime!(2024-09-01 18:00 UTC));
    }

    #[tokio::test]
    async fn test_reviews_listed_latest_first() {
        let (service, clock, id) = fixture().await;
        let reader = patron("p-1");

        for (rating, comment) in [(5, "first"), (3, "second"), (4, "third")] {
            service
                .add_review(id, &reader, rating, comment.to_string())
                .await
                .unwrap();
            clock.advance(Duration::minutes(1));
        }

        let comments: Vec<String> = service
            .list_reviews(id, &reader)
            .await
            .unwrap()
            .into_iter()
            .map(|review| review.comment)
            .collect();
        assert_eq!(comments, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_review_requires_existing_book_and_identity() {
        let (service, _clock, id) = fixture().await;

        let err = service
            .add_review(404, &patron("p-1"), 3, String::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LendingError::NotFound { .. }));

        let err = service
            .add_review(id, &Caller::Anonymous, 3, String::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LendingError::Unauthenticated { .. }));

        let err = service.list_reviews(404, &patron("p-1")).await.unwrap_err();
        assert!(matches!(err, LendingError::NotFound { .. }));
    }

    /// Sleeps around every read and write so concurrent callers interleave
    /// between reading a book and committing to it.
    struct SlowStore {
        inner: MemoryStore,
    }

    impl SlowStore {
        async fn pause() {
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
    }

    #[async_trait]
    impl CatalogStore for SlowStore {
        async fn get_book(&self, id: BookId) -> biblio_db::Result<Option<BookRecord>> {
            let book = self.inner.get_book(id).await;
            Self::pause().await;
            book
        }

        async fn list_books(&self) -> biblio_db::Result<Vec<BookRecord>> {
            self.inner.list_books().await
        }

        async fn insert_book(&self, catalog: CatalogEntry) -> biblio_db::Result<BookRecord> {
            self.inner.insert_book(catalog).await
        }

        async fn update_book(
            &self,
            record: BookRecord,
            expected_version: u64,
        ) -> biblio_db::Result<WriteResult<BookRecord>> {
            Self::pause().await;
            self.inner.update_book(record, expected_version).await
        }

        async fn delete_book(&self, id: BookId) -> biblio_db::Result<bool> {
            self.inner.delete_book(id).await
        }

        async fn append_review(&self, review: NewReview) -> biblio_db::Result<Option<ReviewRecord>> {
            Self::pause().await;
            self.inner.append_review(review).await
        }

        async fn list_reviews(&self, book_id: BookId) -> biblio_db::Result<Vec<ReviewRecord>> {
            self.inner.list_reviews(book_id).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reviews_all_commit() {
        let store = Arc::new(SlowStore {
            inner: MemoryStore::new(),
        });
        let (service, _clock, id) = service_over(store, LendingSettings::default()).await;
        let service = Arc::new(service);

        let reviewers: Vec<_> = (0..24i64)
            .map(|n| {
                let service = Arc::clone(&service);
                let rating = (n % 5) + 1;
                tokio::spawn(async move {
                    service
                        .add_review(id, &patron(&format!("p-{n}")), rating, String::new())
                        .await
                })
            })
            .collect();
        let borrower = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.checkout(id, &patron("borrower")).await })
        };

        let mut committed = Vec::new();
        for handle in reviewers {
            let review = handle.await.unwrap().unwrap();
            committed.push(f64::from(review.rating));
        }
        let checked_out = borrower.await.unwrap().unwrap();
        assert_eq!(checked_out.checked_out_by_user_id.as_deref(), Some("borrower"));

        let book = service.get_book(id, &Caller::Anonymous).await.unwrap();
        let ledger = service.list_reviews(id, &patron("p-0")).await.unwrap();
        assert_eq!(committed.len(), 24);
        assert_eq!(book.review_count, 24);
        assert_eq!(ledger.len(), 24);
        assert!(book.is_checked_out);

        let mean = committed.iter().sum::<f64>() / committed.len() as f64;
        assert!((book.average_rating - mean).abs() < 1e-9);
    }

    // ==================== Catalog ====================

    #[tokio::test]
    async fn test_catalog_changes_require_librarian() {
        let (service, _clock, id) = fixture().await;
        let reader = patron("p-1");

        let err = service.add_book(&reader, entry("Dawn")).await.unwrap_err();
        assert!(matches!(err, LendingError::Forbidden { .. }));
        let err = service.edit_book(id, &reader, entry("Dawn")).await.unwrap_err();
        assert!(matches!(err, LendingError::Forbidden { .. }));
        let err = service.delete_book(id, &reader).await.unwrap_err();
        assert!(matches!(err, LendingError::Forbidden { .. }));
        let err = service
            .add_book(&Caller::Anonymous, entry("Dawn"))
            .await
            .unwrap_err();
        assert!(matches!(err, LendingError::Unauthenticated { .. }));
    }

    #[tokio::test]
    async fn test_edit_keeps_lending_state_and_rating() {
        let (service, _clock, id) = fixture().await;
        service.checkout(id, &patron("p-1")).await.unwrap();
        service
            .add_review(id, &patron("p-1"), 5, String::new())
            .await
            .unwrap();

        let edited = service
            .edit_book(id, &librarian(), entry("Kindred (Anniversary Edition)"))
            .await
            .unwrap();
        assert_eq!(edited.catalog.title, "Kindred (Anniversary Edition)");
        assert!(edited.is_checked_out);
        assert_eq!(edited.checked_out_by_user_id.as_deref(), Some("p-1"));
        assert!((edited.average_rating - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_add_book_validates_fields() {
        let (service, _clock, _id) = fixture().await;

        let mut blank = entry("  ");
        let err = service.add_book(&librarian(), blank.clone()).await.unwrap_err();
        assert!(matches!(err, LendingError::InvalidArgument { field: "title", .. }));

        blank.title = "Fledgling".to_string();
        let book = service.add_book(&librarian(), blank).await.unwrap();
        assert_eq!(book.availability, "Available");
        assert_eq!(book.average_rating, 0.0);
        assert_eq!(service.list_books(&Caller::Anonymous).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_cascades_reviews() {
        let (service, _clock, id) = fixture().await;
        service
            .add_review(id, &patron("p-1"), 4, String::new())
            .await
            .unwrap();

        service.delete_book(id, &librarian()).await.unwrap();

        assert!(matches!(
            service.get_book(id, &Caller::Anonymous).await.unwrap_err(),
            LendingError::NotFound { .. }
        ));
        assert!(matches!(
            service.list_reviews(id, &patron("p-1")).await.unwrap_err(),
            LendingError::NotFound { .. }
        ));
        assert!(matches!(
            service.delete_book(id, &librarian()).await.unwrap_err(),
            LendingError::NotFound { .. }
        ));
    }
}
