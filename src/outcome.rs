//! Result signal for relation protocol operations.

use std::fmt;

/// Outcome of an operation that may be refused because of a world invariant.
///
/// Refusals are ordinary values, not errors: callers branch on them.
///
/// # Examples
///
/// ```
/// use kyroworld::Outcome;
///
/// let added: Outcome<u32> = Outcome::Success(7);
/// assert_eq!(added.success(), Some(7));
/// assert!(Outcome::<()>::AlreadyExists.is_already_exists());
/// ```
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome<T = ()> {
    /// The operation was applied.
    Success(T),
    /// The relation (or edge) is already present in a conflicting tier.
    AlreadyExists,
    /// Invalid argument: unknown node, wrong class, would create a loop, or
    /// nothing to act on.
    Fail,
}

impl<T> Outcome<T> {
    /// Whether the operation took effect.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Whether the operation was refused because the key exists.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists)
    }

    /// Whether the operation was refused as invalid.
    #[must_use]
    pub const fn is_fail(&self) -> bool {
        matches!(self, Self::Fail)
    }

    /// The success payload, if any.
    #[must_use]
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(v) => Some(v),
            _ => None,
        }
    }

    /// Maps the success payload.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(v) => Outcome::Success(f(v)),
            Self::AlreadyExists => Outcome::AlreadyExists,
            Self::Fail => Outcome::Fail,
        }
    }

    /// Drops the success payload.
    pub fn discard(self) -> Outcome {
        self.map(|_| ())
    }
}

impl<T> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(_) => f.write_str("success"),
            Self::AlreadyExists => f.write_str("already exists"),
            Self::Fail => f.write_str("fail"),
        }
    }
}
