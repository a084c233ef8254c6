//! Configuration for the session cookie.
//!
//! The cookie settings live on the session manager (see
//! [`SessionManager::cookie`](crate::SessionManager::cookie)) and are
//! consumed both by the load phase, which uses the cookie name to find the
//! session token on incoming requests, and by the default
//! [`write_session_cookie`](crate::SessionManager::write_session_cookie)
//! implementation, which uses the remaining attributes to build the
//! `Set-Cookie` header.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// The configuration for the session cookie.
///
/// # Examples
///
/// ```
/// use session_shim::config::CookieConfig;
///
/// let config = CookieConfig::builder().name("sid").secure(false).build();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(build_fn(skip, error = std::convert::Infallible))]
#[serde(default)]
pub struct CookieConfig {
    /// The name of the session cookie.
    #[builder(setter(into))]
    pub name: String,
    /// The `Path` attribute of the session cookie.
    #[builder(setter(into))]
    pub path: String,
    /// The `Domain` attribute of the session cookie, if any.
    #[builder(setter(into, strip_option))]
    pub domain: Option<String>,
    /// Whether the session cookie is only sent over HTTPS.
    pub secure: bool,
    /// Whether the session cookie is inaccessible to client-side scripts.
    pub http_only: bool,
    /// Whether the session cookie is persistent by default.
    ///
    /// A persistent cookie carries `Expires` and `Max-Age` attributes and is
    /// retained after the user closes their browser. When this is `false`,
    /// the cookie is a browser-session cookie unless the handler opts a
    /// particular session in with
    /// [`SessionAdapter::remember_me`](crate::SessionAdapter::remember_me).
    pub persist: bool,
    /// The `SameSite` attribute of the session cookie.
    pub same_site: SameSite,
}

impl CookieConfig {
    /// Create a new [`CookieConfigBuilder`] to build a [`CookieConfig`].
    ///
    /// # Examples
    ///
    /// ```
    /// use session_shim::config::CookieConfig;
    ///
    /// let config = CookieConfig::builder().build();
    /// assert_eq!(config.name, "session");
    /// ```
    #[must_use]
    pub fn builder() -> CookieConfigBuilder {
        CookieConfigBuilder::default()
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CookieConfigBuilder {
    /// Builds the session cookie configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use session_shim::config::CookieConfig;
    ///
    /// let config = CookieConfig::builder().secure(false).build();
    /// ```
    #[must_use]
    pub fn build(&self) -> CookieConfig {
        CookieConfig {
            name: self.name.clone().unwrap_or_else(|| String::from("session")),
            path: self.path.clone().unwrap_or_else(|| String::from("/")),
            domain: self.domain.clone().flatten(),
            secure: self.secure.unwrap_or(true),
            http_only: self.http_only.unwrap_or(true),
            persist: self.persist.unwrap_or(true),
            same_site: self.same_site.unwrap_or(SameSite::Lax),
        }
    }
}

/// The `SameSite` attribute of the session cookie.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    /// The cookie is only sent on same-site requests.
    Strict,
    /// The cookie is also sent on top-level cross-site navigations.
    #[default]
    Lax,
    /// The cookie is sent on all requests; requires `secure`.
    None,
}

impl From<SameSite> for cookie::SameSite {
    fn from(value: SameSite) -> Self {
        match value {
            SameSite::Strict => cookie::SameSite::Strict,
            SameSite::Lax => cookie::SameSite::Lax,
            SameSite::None => cookie::SameSite::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CookieConfig::default();

        assert_eq!(config.name, "session");
        assert_eq!(config.path, "/");
        assert_eq!(config.domain, None);
        assert!(config.secure);
        assert!(config.http_only);
        assert!(config.persist);
        assert_eq!(config.same_site, SameSite::Lax);
    }

    #[test]
    fn test_builder_overrides() {
        let config = CookieConfig::builder()
            .name("sid")
            .path("/app")
            .domain("example.com")
            .secure(false)
            .persist(false)
            .same_site(SameSite::Strict)
            .build();

        assert_eq!(config.name, "sid");
        assert_eq!(config.path, "/app");
        assert_eq!(config.domain.as_deref(), Some("example.com"));
        assert!(!config.secure);
        assert!(config.http_only);
        assert!(!config.persist);
        assert_eq!(config.same_site, SameSite::Strict);
    }
}
