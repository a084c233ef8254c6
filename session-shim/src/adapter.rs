//! The session adapter and its commit ordering.

use std::sync::Arc;

use http::HeaderValue;
use http::header::VARY;
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use tracing::warn;

use crate::exchange::{Exchange, session_cookie};
use crate::manager::SessionManager;
use crate::{Error, Result};

/// A session adapter for frameworks that flush response headers as soon as
/// the handler returns.
///
/// The adapter wraps a shared [`SessionManager`] handle and exposes two
/// things: the [`load_and_save`](Self::load_and_save) middleware entry
/// point, which hydrates the session from the incoming cookie once per
/// request, and a set of accessors for use inside handlers. Because no
/// middleware phase after the handler gets a chance to write headers, every
/// accessor commits the session and refreshes the `Set-Cookie` header
/// immediately, back-to-back with the operation itself.
///
/// The adapter holds no per-request state and no locks; it is cheap to
/// clone and safe to share across concurrent requests.
///
/// # Commit failures
///
/// [`destroy`](Self::destroy) and [`renew_token`](Self::renew_token) return
/// store failures to the caller and leave the cookie untouched, since
/// advertising a token that no longer matches the store would be worse than
/// failing loudly. On all other paths the commit is best-effort: a commit
/// failure is logged at `warn` level, the cookie write is skipped so the
/// client keeps the token from the last successful commit, and the
/// operation's primary result is still returned.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use session_shim::SessionAdapter;
/// use session_shim::test::{TestExchange, TestSessionManager};
///
/// # #[tokio::main]
/// # async fn main() -> session_shim::Result<()> {
/// let adapter = SessionAdapter::new(Arc::new(TestSessionManager::new()));
///
/// let mut exchange = TestExchange::new();
/// adapter.load_and_save(&mut exchange).await?;
/// adapter.put(&mut exchange, "user_id", 42).await?;
///
/// assert!(exchange.set_cookie_header().is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionAdapter<M> {
    manager: Arc<M>,
}

impl<M> Clone for SessionAdapter<M> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

/// The session context attached to the request by the load phase.
#[derive(Clone)]
struct Loaded<C>(C);

impl<M: SessionManager> SessionAdapter<M> {
    /// Creates a new adapter wrapping the given session manager.
    ///
    /// The manager is shared, not owned: the same handle can back any
    /// number of adapters and outlives every request.
    #[must_use]
    pub fn new(manager: Arc<M>) -> Self {
        Self { manager }
    }

    /// The middleware entry point: loads the session for this request and
    /// yields to the rest of the pipeline.
    ///
    /// The session token is taken from the request cookie named by the
    /// manager's [`CookieConfig`](crate::config::CookieConfig); a missing
    /// cookie simply starts a fresh session. The loaded context is attached
    /// to the request's extensions for the accessors to pick up, and
    /// `Vary: Cookie` is added to the response since its content depends on
    /// the session cookie.
    ///
    /// If loading fails, the manager's
    /// [`on_load_error`](SessionManager::on_load_error) handler writes the
    /// response and the pipeline does **not** proceed: the failure is
    /// terminal for the request.
    ///
    /// Must run before any accessor, and at most once per request.
    ///
    /// # Errors
    ///
    /// Propagates any error returned by the downstream pipeline phases.
    /// Load failures are not returned here; they are delegated to the
    /// manager's error handler.
    pub async fn load_and_save<E: Exchange>(&self, exchange: &mut E) -> Result<()> {
        let cookie_name = &self.manager.cookie().name;
        let token = session_cookie(exchange.request_headers(), cookie_name).unwrap_or_default();

        let context = match self.manager.load(&token).await {
            Ok(context) => context,
            Err(error) => {
                self.manager.on_load_error(exchange, &error);
                return Ok(());
            }
        };

        exchange.extensions_mut().insert(Loaded(context));
        exchange
            .headers_mut()
            .append(VARY, HeaderValue::from_static("Cookie"));

        exchange.proceed().await
    }

    /// Adds a key and corresponding value to the session data, replacing
    /// any existing value for the key, then commits the session and
    /// refreshes the session cookie.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized. Commit failures
    /// are best-effort (see the type-level docs).
    pub async fn put<E, T>(&self, exchange: &mut E, key: &str, value: T) -> Result<()>
    where
        E: Exchange,
        T: Serialize,
    {
        let context = self.context(exchange);
        self.manager.put(&context, key, serde_json::to_value(value)?);
        self.commit_and_write(exchange, &context).await;
        Ok(())
    }

    /// Returns the value for the given key from the session data.
    ///
    /// Reads go through the same commit-and-write step as mutations; this
    /// is an accepted cost of keeping a single code path rather than a
    /// behavioral necessity.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use session_shim::SessionAdapter;
    /// use session_shim::test::{TestExchange, TestSessionManager};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> session_shim::Result<()> {
    /// let adapter = SessionAdapter::new(Arc::new(TestSessionManager::new()));
    /// let mut exchange = TestExchange::new();
    /// adapter.load_and_save(&mut exchange).await?;
    ///
    /// adapter.put(&mut exchange, "count", 3).await?;
    /// let count: Option<u32> = adapter.get(&mut exchange, "count").await?;
    /// assert_eq!(count, Some(3));
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value cannot be deserialized as `T`.
    pub async fn get<E, T>(&self, exchange: &mut E, key: &str) -> Result<Option<T>>
    where
        E: Exchange,
        T: DeserializeOwned,
    {
        let context = self.context(exchange);
        let value = self.manager.get(&context, key);
        self.commit_and_write(exchange, &context).await;

        value
            .map(serde_json::from_value)
            .transpose()
            .map_err(Error::from)
    }

    /// Returns the string value for the given key, or `None` if the key
    /// does not exist or holds a value of another type.
    pub async fn get_string<E: Exchange>(&self, exchange: &mut E, key: &str) -> Option<String> {
        self.get(exchange, key).await.ok().flatten()
    }

    /// Returns the integer value for the given key, or `None` if the key
    /// does not exist or holds a value of another type.
    pub async fn get_i64<E: Exchange>(&self, exchange: &mut E, key: &str) -> Option<i64> {
        self.get(exchange, key).await.ok().flatten()
    }

    /// Returns the boolean value for the given key, or `None` if the key
    /// does not exist or holds a value of another type.
    pub async fn get_bool<E: Exchange>(&self, exchange: &mut E, key: &str) -> Option<bool> {
        self.get(exchange, key).await.ok().flatten()
    }

    /// Returns the byte-array value for the given key, or `None` if the key
    /// does not exist or holds a value of another type.
    pub async fn get_bytes<E: Exchange>(&self, exchange: &mut E, key: &str) -> Option<Vec<u8>> {
        self.get(exchange, key).await.ok().flatten()
    }

    /// Deletes the given key and corresponding value from the session data,
    /// then commits the session and refreshes the session cookie.
    ///
    /// Removing an absent key is a no-op, but the commit still happens:
    /// the session may carry other pending changes.
    pub async fn remove<E: Exchange>(&self, exchange: &mut E, key: &str) {
        let context = self.context(exchange);
        self.manager.remove(&context, key);
        self.commit_and_write(exchange, &context).await;
    }

    /// Destroys the session: deletes it from the store and directs the
    /// client to drop its cookie.
    ///
    /// On success the response carries a clearing cookie (empty token,
    /// epoch expiry). Any further mutating call on the same request starts
    /// a new session with a new token.
    ///
    /// # Errors
    ///
    /// Returns the store error if destruction fails; in that case the
    /// cookie is left untouched, since the session still exists.
    pub async fn destroy<E: Exchange>(&self, exchange: &mut E) -> Result<()> {
        let context = self.context(exchange);
        self.manager.destroy(&context).await?;
        self.manager.write_session_cookie(
            &context,
            exchange.headers_mut(),
            "",
            OffsetDateTime::UNIX_EPOCH,
        );
        Ok(())
    }

    /// Assigns the session a new token while retaining the current session
    /// data, then commits and writes the new cookie.
    ///
    /// Call this before any privilege-level change (login, logout) to
    /// mitigate session fixation attacks.
    ///
    /// # Errors
    ///
    /// Returns the store error if renewal fails; nothing is committed and
    /// the cookie is left untouched, so a stale token is never propagated.
    pub async fn renew_token<E: Exchange>(&self, exchange: &mut E) -> Result<()> {
        let context = self.context(exchange);
        self.manager.renew_token(&context).await?;
        self.commit_and_write(exchange, &context).await;
        Ok(())
    }

    /// Controls whether this session's cookie is persistent, overriding the
    /// configured default for subsequent cookie writes, then commits and
    /// refreshes the cookie so the change applies immediately.
    pub async fn remember_me<E: Exchange>(&self, exchange: &mut E, remember: bool) {
        let context = self.context(exchange);
        self.manager.remember_me(&context, remember);
        self.commit_and_write(exchange, &context).await;
    }

    /// Returns the session context attached to the request by the load
    /// phase.
    ///
    /// # Panics
    ///
    /// Panics if the load phase has not run for this request.
    #[track_caller]
    fn context<E: Exchange>(&self, exchange: &E) -> M::Context {
        exchange
            .extensions()
            .get::<Loaded<M::Context>>()
            .map(|Loaded(context)| context.clone())
            .expect(
                "session context missing from request extensions. \
                 Did you forget to run SessionAdapter::load_and_save before the handler?",
            )
    }

    /// The shared tail of every accessor: commit the session and write the
    /// resulting token and expiry into the session cookie.
    async fn commit_and_write<E: Exchange>(&self, exchange: &mut E, context: &M::Context) {
        match self.manager.commit(context).await {
            Ok((token, expiry)) => {
                self.manager
                    .write_session_cookie(context, exchange.headers_mut(), &token, expiry);
            }
            Err(error) => {
                warn!("session commit failed, cookie left unchanged: {error}");
            }
        }
    }
}
