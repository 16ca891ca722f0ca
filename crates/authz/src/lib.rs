//! Access gate for catalog operations.
//!
//! Identity is resolved upstream; this crate only decides whether an already
//! resolved [`Caller`] may perform an [`Operation`]. The decision is a pure
//! function and must run before any state is touched.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Roles a resolved caller may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Library staff: manages the catalogue and accepts returns.
    Librarian,
    /// Authenticated borrower.
    Patron,
}

impl Role {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "librarian" => Some(Role::Librarian),
            "patron" | "customer" => Some(Role::Patron),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Librarian => write!(f, "librarian"),
            Role::Patron => write!(f, "patron"),
        }
    }
}

/// Identity supplied with a request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Caller {
    #[default]
    Anonymous,
    Authenticated { user_id: String, role: Role },
}

impl Caller {
    pub fn librarian(user_id: impl Into<String>) -> Self {
        Caller::Authenticated {
            user_id: user_id.into(),
            role: Role::Librarian,
        }
    }

    pub fn patron(user_id: impl Into<String>) -> Self {
        Caller::Authenticated {
            user_id: user_id.into(),
            role: Role::Patron,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Caller::Anonymous => None,
            Caller::Authenticated { user_id, .. } => Some(user_id),
        }
    }
}

/// Gated operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListBooks,
    ReadBook,
    Checkout,
    Return,
    AddBook,
    EditBook,
    DeleteBook,
    AddReview,
    ReadReviews,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::ListBooks => "list_books",
            Operation::ReadBook => "read_book",
            Operation::Checkout => "checkout",
            Operation::Return => "return",
            Operation::AddBook => "add_book",
            Operation::EditBook => "edit_book",
            Operation::DeleteBook => "delete_book",
            Operation::AddReview => "add_review",
            Operation::ReadReviews => "read_reviews",
        };
        f.write_str(name)
    }
}

/// What an operation demands of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Public,
    Authenticated,
    Role(Role),
}

impl Operation {
    pub fn requirement(self) -> Requirement {
        match self {
            Operation::ListBooks | Operation::ReadBook => Requirement::Public,
            Operation::Checkout | Operation::AddReview | Operation::ReadReviews => {
                Requirement::Authenticated
            }
            Operation::Return
            | Operation::AddBook
            | Operation::EditBook
            | Operation::DeleteBook => Requirement::Role(Role::Librarian),
        }
    }
}

/// Authorization failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// The operation needs an identity and none was supplied.
    #[error("authentication required for {operation}")]
    Unauthenticated { operation: Operation },

    /// The caller is known but lacks the required role.
    #[error("role {role} may not perform {operation}")]
    Forbidden { operation: Operation, role: Role },
}

/// Decide whether `caller` may perform `operation`.
pub fn authorize(operation: Operation, caller: &Caller) -> Result<(), AuthzError> {
    let decision = match (operation.requirement(), caller) {
        (Requirement::Public, _) => Ok(()),
        (_, Caller::Anonymous) => Err(AuthzError::Unauthenticated { operation }),
        (Requirement::Authenticated, Caller::Authenticated { .. }) => Ok(()),
        (Requirement::Role(required), Caller::Authenticated { role, .. }) => {
            if *role == required {
                Ok(())
            } else {
                Err(AuthzError::Forbidden {
                    operation,
                    role: *role,
                })
            }
        }
    };

    if let Err(err) = &decision {
        tracing::debug!(target: "biblio-authz", %operation, error = %err, "access denied");
    }
    decision
}
