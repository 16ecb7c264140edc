//! Core identifier types for LockWatch.
//!
//! These types provide type-safe wrappers around the string identifiers
//! handed to the engine by the instrumentation layer, preventing a
//! connection id from being passed where a transaction id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from anything string-like.
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the inner string.
            #[inline]
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            #[inline]
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Transaction identifier - names one logical unit of work.
    ///
    /// Unique for the lifetime of the transaction. Ordering is lexicographic
    /// and is used to break ties deterministically during victim selection.
    ///
    /// # Example
    ///
    /// ```rust
    /// use lockwatch_common::types::TransactionId;
    ///
    /// let a = TransactionId::new("txn-a");
    /// let b = TransactionId::from("txn-b");
    /// assert!(a < b);
    /// ```
    TransactionId
}

string_id! {
    /// Physical connection identifier.
    ///
    /// A connection serves at most one transaction at a time.
    ConnectionId
}

string_id! {
    /// Lockable resource identifier.
    ///
    /// Granularity is defined by the caller (a row, a page, a table); the
    /// engine assigns it no meaning beyond identity.
    ResourceId
}
