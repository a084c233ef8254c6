//! Server-side sessions for HTTP frameworks that flush response headers
//! before middleware resumes.
//!
//! Most session middleware follows a two-phase pattern: load the session
//! before the handler runs, then persist it and emit the `Set-Cookie` header
//! after the handler returns. That pattern breaks on frameworks that commit
//! and flush the response as soon as the handler function returns — by the
//! time trailing middleware runs, the headers are already on the wire.
//!
//! This crate collapses the two phases into one. [`SessionAdapter`] loads the
//! session once per request from the incoming cookie, and every
//! session-mutating accessor ([`put`](SessionAdapter::put),
//! [`remove`](SessionAdapter::remove),
//! [`renew_token`](SessionAdapter::renew_token), ...) immediately commits the
//! session to the store and refreshes the `Set-Cookie` header, while the
//! handler still owns the response. No trailing phase is needed, so the
//! ordering is correct regardless of how many mutations a handler performs.
//!
//! The storage side is abstracted behind the [`SessionManager`] trait and the
//! framework side behind the [`Exchange`] trait; the adapter only sequences
//! calls into those two collaborators.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use session_shim::SessionAdapter;
//! use session_shim::test::{TestExchange, TestSessionManager};
//!
//! # #[tokio::main]
//! # async fn main() -> session_shim::Result<()> {
//! let adapter = SessionAdapter::new(Arc::new(TestSessionManager::new()));
//!
//! let mut exchange = TestExchange::new();
//! adapter.load_and_save(&mut exchange).await?;
//!
//! // Inside the handler: the mutation is committed and the session cookie
//! // is written before `put` returns.
//! adapter.put(&mut exchange, "user_name", "world").await?;
//! let name: Option<String> = adapter.get(&mut exchange, "user_name").await?;
//!
//! assert_eq!(name.as_deref(), Some("world"));
//! assert!(exchange.set_cookie_header().is_some());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

mod adapter;
pub mod config;
mod error;
pub mod exchange;
pub mod manager;

pub use http;

pub use crate::adapter::SessionAdapter;
pub use crate::error::Error;
pub use crate::exchange::{Exchange, ResponseHead};
pub use crate::manager::SessionManager;

/// A type alias for a result that can return a [`session_shim::Error`](Error).
pub type Result<T> = std::result::Result<T, Error>;

/// A type alias for an HTTP status code.
pub type StatusCode = http::StatusCode;
