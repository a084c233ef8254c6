//! The session-manager contract consumed by the adapter.
//!
//! A session manager owns everything the adapter treats as a collaborator:
//! the backing store, token generation, expiry computation, and the
//! per-request session state. The adapter never inspects session data
//! itself; it only sequences calls into a [`SessionManager`] and forwards
//! the resulting token and expiry into the session cookie.
//!
//! The mechanical parts of the contract — the remember-me flag, building
//! the `Set-Cookie` header, and the load-error response — ship as provided
//! methods, so a manager implementation only has to supply the store-facing
//! operations. An in-memory implementation for tests is available as
//! [`test::TestSessionManager`](crate::test::TestSessionManager).

use async_trait::async_trait;
use cookie::Cookie;
use http::{HeaderMap, HeaderValue, StatusCode, header};
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use tracing::{error, warn};

use crate::config::CookieConfig;
use crate::exchange::ResponseHead;
use crate::{Error, Result};

/// The session data key under which the per-session remember-me flag is
/// stored.
///
/// [`SessionManager::remember_me`] writes this key; the default
/// [`SessionManager::write_session_cookie`] reads it back when deciding
/// whether to emit a persistent cookie. The leading underscores keep it out
/// of the way of application keys.
pub const REMEMBER_ME_KEY: &str = "__remember_me";

/// A session manager, as consumed by
/// [`SessionAdapter`](crate::SessionAdapter).
///
/// One instance is shared across all concurrent requests (typically behind
/// an [`Arc`](std::sync::Arc)); all per-request state lives in the
/// [`Context`](Self::Context) values it hands out, so implementations must
/// be safe to call from multiple requests at once.
#[async_trait]
pub trait SessionManager: Send + Sync + 'static {
    /// The per-request session context.
    ///
    /// Produced by [`load`](Self::load) and attached to the request by the
    /// load phase; every subsequent operation on that request receives it
    /// back. It carries the loaded token and the dirty/clean status of the
    /// session data. The `Clone` bound exists because the context is stored
    /// in the request's [`http::Extensions`]; implementations are expected
    /// to make cloning cheap (e.g. an `Arc` around the actual state) so
    /// that all clones observe the same session.
    type Context: Clone + Send + Sync + 'static;

    /// Loads the session for the given token and returns the per-request
    /// context carrying it.
    ///
    /// An empty or unknown token is not an error: it yields a fresh, empty
    /// session. Errors are reserved for store failures and corrupt data.
    async fn load(&self, token: &str) -> Result<Self::Context>;

    /// Persists the session data to the store and returns the session token
    /// together with its expiry time.
    ///
    /// A session that has no token yet (a fresh session, or one revived
    /// after [`destroy`](Self::destroy)) is assigned a new one here.
    async fn commit(&self, context: &Self::Context) -> Result<(String, OffsetDateTime)>;

    /// Adds a key and corresponding value to the session data, replacing
    /// any existing value, and marks the session data as modified.
    fn put(&self, context: &Self::Context, key: &str, value: Value);

    /// Returns the value for the given key from the session data.
    fn get(&self, context: &Self::Context, key: &str) -> Option<Value>;

    /// Deletes the given key and corresponding value from the session data.
    /// If the key is not present this is a no-op.
    fn remove(&self, context: &Self::Context, key: &str);

    /// Deletes the session from the store and marks the context destroyed.
    ///
    /// Any further mutation on the same context starts a new session with a
    /// new token.
    async fn destroy(&self, context: &Self::Context) -> Result<()>;

    /// Assigns the session a new token while retaining the current session
    /// data, and deletes the old token's record from the store.
    async fn renew_token(&self, context: &Self::Context) -> Result<()>;

    /// Returns the session cookie configuration.
    fn cookie(&self) -> &CookieConfig;

    /// Controls whether this particular session's cookie is persistent,
    /// overriding [`CookieConfig::persist`] for subsequent cookie writes.
    ///
    /// The flag is stored in the session data itself under
    /// [`REMEMBER_ME_KEY`], so it survives commits and reloads like any
    /// other value.
    fn remember_me(&self, context: &Self::Context, remember: bool) {
        self.put(context, REMEMBER_ME_KEY, Value::Bool(remember));
    }

    /// Writes the `Set-Cookie` header for the session to the given response
    /// headers.
    ///
    /// An empty token produces a clearing directive (empty value, zero
    /// `Max-Age`, epoch `Expires`) so the client drops the cookie. Any
    /// previously written `Set-Cookie` for the same cookie name is replaced,
    /// so a request ends with exactly one session cookie reflecting the
    /// last commit.
    fn write_session_cookie(
        &self,
        context: &Self::Context,
        headers: &mut HeaderMap,
        token: &str,
        expiry: OffsetDateTime,
    ) {
        let config = self.cookie();

        let mut session_cookie = Cookie::new(config.name.clone(), token.to_owned());
        session_cookie.set_path(config.path.clone());
        if let Some(domain) = &config.domain {
            session_cookie.set_domain(domain.clone());
        }
        session_cookie.set_secure(config.secure);
        session_cookie.set_http_only(config.http_only);
        session_cookie.set_same_site(cookie::SameSite::from(config.same_site));

        if token.is_empty() {
            session_cookie.set_max_age(Duration::ZERO);
            session_cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
        } else if config.persist || self.remembered(context) {
            session_cookie.set_expires(expiry);
            session_cookie.set_max_age((expiry - OffsetDateTime::now_utc()).max(Duration::ZERO));
        }
        // Otherwise the cookie carries no expiry attributes and lives only
        // for the browser session.

        match HeaderValue::from_str(&session_cookie.encoded().to_string()) {
            Ok(value) => replace_session_cookie(headers, &config.name, value),
            Err(_) => warn!(
                cookie_name = %config.name,
                "session cookie is not a valid header value; not written"
            ),
        }
    }

    /// Returns whether this session has been marked persistent with
    /// [`remember_me`](Self::remember_me).
    fn remembered(&self, context: &Self::Context) -> bool {
        self.get(context, REMEMBER_ME_KEY)
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }

    /// Handles a session load failure.
    ///
    /// Invoked by the load phase when [`load`](Self::load) fails; the
    /// request does not proceed to the handler afterwards, so whatever this
    /// writes is the response. The default implementation logs the error
    /// and responds with `500 Internal Server Error`.
    fn on_load_error(&self, response: &mut dyn ResponseHead, error: &Error) {
        error!("failed to load session: {error}");
        response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
    }
}

/// Replaces the `Set-Cookie` entry for the given cookie name, leaving
/// cookies written by other parts of the application untouched.
fn replace_session_cookie(headers: &mut HeaderMap, name: &str, value: HeaderValue) {
    let prefix = format!("{name}=");
    let retained: Vec<HeaderValue> = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter(|existing| !matches!(existing.to_str(), Ok(existing) if existing.starts_with(&prefix)))
        .cloned()
        .collect();

    headers.remove(header::SET_COOKIE);
    for existing in retained {
        headers.append(header::SET_COOKIE, existing);
    }
    headers.append(header::SET_COOKIE, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SameSite;
    use crate::test::TestSessionManager;

    fn set_cookie_values(headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|value| value.to_str().expect("header is valid UTF-8").to_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_write_session_cookie_attributes() {
        let manager = TestSessionManager::new();
        let context = manager.load("").await.expect("load succeeds");
        let mut headers = HeaderMap::new();
        let expiry = OffsetDateTime::now_utc() + Duration::hours(1);

        manager.write_session_cookie(&context, &mut headers, "abc123", expiry);

        let values = set_cookie_values(&headers);
        assert_eq!(values.len(), 1);
        assert!(values[0].starts_with("session=abc123"));
        assert!(values[0].contains("Path=/"));
        assert!(values[0].contains("HttpOnly"));
        assert!(values[0].contains("Secure"));
        assert!(values[0].contains("SameSite=Lax"));
        assert!(values[0].contains("Expires="));
    }

    #[tokio::test]
    async fn test_write_session_cookie_clearing_directive() {
        let manager = TestSessionManager::new();
        let context = manager.load("").await.expect("load succeeds");
        let mut headers = HeaderMap::new();

        manager.write_session_cookie(&context, &mut headers, "", OffsetDateTime::UNIX_EPOCH);

        let values = set_cookie_values(&headers);
        assert_eq!(values.len(), 1);
        assert!(values[0].starts_with("session=;"));
        assert!(values[0].contains("Max-Age=0"));
        assert!(values[0].contains("Expires=Thu, 01 Jan 1970"));
    }

    #[tokio::test]
    async fn test_write_session_cookie_replaces_previous() {
        let manager = TestSessionManager::new();
        let context = manager.load("").await.expect("load succeeds");
        let mut headers = HeaderMap::new();
        headers.append(
            header::SET_COOKIE,
            HeaderValue::from_static("theme=dark; Path=/"),
        );
        let expiry = OffsetDateTime::now_utc() + Duration::hours(1);

        manager.write_session_cookie(&context, &mut headers, "first", expiry);
        manager.write_session_cookie(&context, &mut headers, "second", expiry);

        let values = set_cookie_values(&headers);
        assert_eq!(values.len(), 2);
        assert!(values.iter().any(|value| value.starts_with("theme=dark")));
        assert!(values.iter().any(|value| value.starts_with("session=second")));
    }

    #[tokio::test]
    async fn test_session_cookie_without_persist() {
        let manager = TestSessionManager::new()
            .with_cookie(CookieConfig::builder().persist(false).build());
        let context = manager.load("").await.expect("load succeeds");
        let mut headers = HeaderMap::new();
        let expiry = OffsetDateTime::now_utc() + Duration::hours(1);

        manager.write_session_cookie(&context, &mut headers, "abc123", expiry);

        let values = set_cookie_values(&headers);
        assert!(!values[0].contains("Expires="));
        assert!(!values[0].contains("Max-Age="));
    }

    #[tokio::test]
    async fn test_remember_me_overrides_persist() {
        let manager = TestSessionManager::new()
            .with_cookie(CookieConfig::builder().persist(false).build());
        let context = manager.load("").await.expect("load succeeds");
        manager.remember_me(&context, true);
        let mut headers = HeaderMap::new();
        let expiry = OffsetDateTime::now_utc() + Duration::hours(1);

        manager.write_session_cookie(&context, &mut headers, "abc123", expiry);

        let values = set_cookie_values(&headers);
        assert!(values[0].contains("Expires="));
    }

    #[tokio::test]
    async fn test_same_site_strict() {
        let manager = TestSessionManager::new()
            .with_cookie(CookieConfig::builder().same_site(SameSite::Strict).build());
        let context = manager.load("").await.expect("load succeeds");
        let mut headers = HeaderMap::new();
        let expiry = OffsetDateTime::now_utc() + Duration::hours(1);

        manager.write_session_cookie(&context, &mut headers, "abc123", expiry);

        assert!(set_cookie_values(&headers)[0].contains("SameSite=Strict"));
    }
}
