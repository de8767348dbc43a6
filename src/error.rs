//! Error type for captured computation failures.

use std::any::Any;

use thiserror::Error;

/// Boxed error produced by a wrapped computation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    /// The computation returned an error. The original error is kept as the source.
    #[error("computation failed: {0}")]
    Failed(#[source] BoxError),

    /// The computation panicked while it was being resumed.
    #[error("computation panicked: {0}")]
    Panicked(String),

    /// A result slot was written a second time.
    #[error("result slot already written")]
    SlotOccupied,

    /// The outcome of a continuation was already taken.
    #[error("continuation result already taken")]
    ResultTaken,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap any error (or message) raised by a computation.
    ///
    /// ```rust
    /// use cont_bridge::Error;
    ///
    /// let err = Error::failed("disk on fire");
    /// assert_eq!(err.to_string(), "computation failed: disk on fire");
    /// ```
    pub fn failed(error: impl Into<BoxError>) -> Self {
        Error::Failed(error.into())
    }

    pub(crate) fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Error::Panicked(message)
    }

    /// Borrow the original error if it is of type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Error::Failed(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Error::Panicked(_))
    }
}
