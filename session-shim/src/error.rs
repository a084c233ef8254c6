use std::fmt::Display;

use thiserror::Error;

/// An error that can occur while using the session adapter.
#[derive(Debug)]
pub struct Error {
    pub(crate) inner: ErrorRepr,
}

impl Error {
    #[must_use]
    pub(crate) fn new(inner: ErrorRepr) -> Self {
        Self { inner }
    }

    /// Create a new error with a custom error message or error type.
    ///
    /// # Examples
    ///
    /// ```
    /// use session_shim::Error;
    ///
    /// let error = Error::custom("An error occurred");
    /// let error = Error::custom(std::io::Error::other("An error occurred"));
    /// ```
    #[must_use]
    pub fn custom<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self::new(ErrorRepr::Custom(error.into()))
    }

    /// Create a new session store error.
    ///
    /// This is the constructor [`SessionManager`](crate::SessionManager)
    /// implementations are expected to use to surface failures from their
    /// backing store (load, commit, destroy, and token renewal operations).
    ///
    /// # Examples
    ///
    /// ```
    /// use session_shim::Error;
    ///
    /// let error = Error::store(std::io::Error::other("connection reset"));
    /// ```
    #[must_use]
    pub fn store<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self::new(ErrorRepr::Store(error.into()))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<ErrorRepr> for Error {
    fn from(value: ErrorRepr) -> Self {
        Self::new(value)
    }
}

macro_rules! impl_error_from_repr {
    ($ty:ty) => {
        impl From<$ty> for Error {
            fn from(value: $ty) -> Self {
                Error::from(ErrorRepr::from(value))
            }
        }
    };
}

impl_error_from_repr!(serde_json::Error);

#[derive(Debug, Error)]
#[non_exhaustive]
pub(crate) enum ErrorRepr {
    /// A custom user error occurred.
    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),
    /// An error occurred while communicating with the session store.
    #[error("Session store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// An error occurred while serializing or deserializing a session value.
    #[error("Invalid session value: {0}")]
    Value(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_error_display() {
        let error = Error::store(io::Error::other("connection reset"));

        assert_eq!(format!("{error}"), "Session store error: connection reset");
    }

    #[test]
    fn test_error_source() {
        let error = Error::store(io::Error::other("connection reset"));

        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_error =
            serde_json::from_str::<i64>("not a number").expect_err("parsing should fail");

        let error: Error = json_error.into();

        assert!(format!("{error}").starts_with("Invalid session value"));
    }
}
