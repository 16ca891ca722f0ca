//! Lending state machine.
//!
//! A book is either `Available` or `CheckedOut`; the machine cycles between
//! the two. Transitions are pure functions over a [`BookRecord`] so the
//! service can apply them inside a conditional write. Availability is
//! derived on read and never written back.

use std::fmt;

use biblio_db::{BookRecord, Loan};
use time::{Duration, OffsetDateTime};

/// Lifecycle state of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LendingState {
    Available,
    CheckedOut,
}

impl LendingState {
    pub fn of(record: &BookRecord) -> Self {
        if record.is_checked_out() {
            LendingState::CheckedOut
        } else {
            LendingState::Available
        }
    }
}

impl fmt::Display for LendingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LendingState::Available => write!(f, "available"),
            LendingState::CheckedOut => write!(f, "checked_out"),
        }
    }
}

/// A transition that the current state does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    AlreadyCheckedOut,
    NotCheckedOut,
}

/// `Available → CheckedOut`, binding the book to `user_id` from `now`.
pub fn checkout(
    record: &BookRecord,
    user_id: &str,
    now: OffsetDateTime,
) -> Result<BookRecord, TransitionError> {
    match LendingState::of(record) {
        LendingState::CheckedOut => Err(TransitionError::AlreadyCheckedOut),
        LendingState::Available => {
            let mut next = record.clone();
            next.loan = Some(Loan {
                user_id: user_id.to_string(),
                checked_out_at: now,
            });
            Ok(next)
        }
    }
}

/// `CheckedOut → Available`, clearing the loan.
pub fn return_book(record: &BookRecord) -> Result<BookRecord, TransitionError> {
    match LendingState::of(record) {
        LendingState::Available => Err(TransitionError::NotCheckedOut),
        LendingState::CheckedOut => {
            let mut next = record.clone();
            next.loan = None;
            Ok(next)
        }
    }
}

/// Derived availability of a book at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    DueIn { days: i64 },
    Overdue,
}

impl Availability {
    /// Status of `loan` at `now` under a loan period of `loan_period_days`.
    ///
    /// Elapsed time counts whole days only; a checkout stamped in the future
    /// (clock skew between instances) counts as zero days elapsed.
    pub fn at(loan: Option<&Loan>, now: OffsetDateTime, loan_period_days: i64) -> Self {
        let Some(loan) = loan else {
            return Availability::Available;
        };

        let days_elapsed = (now - loan.checked_out_at).whole_days().max(0);
        let days_remaining = (loan_period_days - days_elapsed).max(0);

        if days_remaining == 0 {
            Availability::Overdue
        } else {
            Availability::DueIn {
                days: days_remaining,
            }
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Available => write!(f, "Available"),
            Availability::Overdue => write!(f, "Overdue"),
            Availability::DueIn { days } => write!(f, "Not Available (Due in {days} days)"),
        }
    }
}

/// When the current loan falls due.
pub fn due_date(loan: Option<&Loan>, loan_period_days: i64) -> Option<OffsetDateTime> {
    loan.map(|loan| loan.checked_out_at + Duration::days(loan_period_days))
}
