//! The framework-facing side of the adapter.
//!
//! The adapter does not depend on any particular web framework. Instead, it
//! talks to the framework through the [`Exchange`] trait, which models the
//! per-request exchange object frameworks hand to their middleware: the
//! incoming request headers, a response header sink that stays writable
//! while the handler runs, a request-scoped context slot, and a way to yield
//! control to the next phase of the pipeline.
//!
//! Implementing [`Exchange`] for a framework's context type is all that is
//! needed to use [`SessionAdapter`](crate::SessionAdapter) with it. A
//! ready-made implementation for tests is available as
//! [`test::TestExchange`](crate::test::TestExchange).

use async_trait::async_trait;
use cookie::Cookie;
use http::{Extensions, HeaderMap, StatusCode, header};

use crate::Result;

/// The response side of an exchange.
///
/// This is the part of the exchange that session cookie writes and the
/// session manager's load-error handler operate on. It is split out from
/// [`Exchange`] so that error handlers can be passed the response without
/// also being handed the ability to advance the pipeline.
pub trait ResponseHead {
    /// Returns a mutable reference to the response headers.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Sets the response status code.
    fn set_status(&mut self, status: StatusCode);
}

/// A per-request exchange object, as provided by the web framework.
///
/// # Examples
///
/// ```
/// use session_shim::exchange::Exchange;
/// use session_shim::test::TestExchange;
///
/// # #[tokio::main]
/// # async fn main() -> session_shim::Result<()> {
/// let mut exchange = TestExchange::new();
/// exchange.proceed().await?;
/// assert!(exchange.proceeded());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Exchange: ResponseHead + Send {
    /// Returns the headers of the incoming request.
    fn request_headers(&self) -> &HeaderMap;

    /// Returns the request-scoped context values.
    fn extensions(&self) -> &Extensions;

    /// Returns a mutable reference to the request-scoped context values.
    ///
    /// The adapter uses this to attach the loaded session context to the
    /// request, replacing it for all downstream consumers within the
    /// request's lifecycle.
    fn extensions_mut(&mut self) -> &mut Extensions;

    /// Yields control to the next phase of the pipeline.
    ///
    /// Any error produced by the downstream phases is propagated to the
    /// caller.
    async fn proceed(&mut self) -> Result<()>;
}

/// Extracts the value of the cookie with the given name from the request
/// headers.
///
/// Returns `None` if no `Cookie` header names it; malformed cookie pairs are
/// skipped rather than treated as errors.
pub(crate) fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse_encoded)
        .filter_map(std::result::Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}
