//! Cookie mirror backed by the transport's cookie jar

use std::sync::Arc;

use reqwest::cookie::Jar;
use tablemate_common::auth::{CookieMirror, SessionCookie, StoreError};
use url::Url;

/// Writes session cookies into a [`Jar`] shared with the [`HttpClient`], so
/// server-side middleware receives the credential as a cookie on every
/// request to the API origin.
///
/// [`HttpClient`]: super::HttpClient
#[derive(Debug, Clone)]
pub struct JarCookieMirror {
    jar: Arc<Jar>,
    origin: Url,
}

impl JarCookieMirror {
    /// # Errors
    /// Returns `StoreError::Mirror` when `origin` is not an absolute URL.
    pub fn new(jar: Arc<Jar>, origin: &str) -> Result<Self, StoreError> {
        let origin = Url::parse(origin)
            .map_err(|e| StoreError::Mirror(format!("invalid cookie origin '{}': {}", origin, e)))?;
        Ok(Self { jar, origin })
    }

    #[must_use]
    pub fn jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }

    #[must_use]
    pub fn origin(&self) -> &Url {
        &self.origin
    }
}

impl CookieMirror for JarCookieMirror {
    fn write(&self, cookie: &SessionCookie) -> Result<(), StoreError> {
        // An expired cookie (Max-Age=0) evicts the stored one.
        self.jar.add_cookie_str(&cookie.header_value(), &self.origin);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::cookie::CookieStore;

    use super::*;

    fn cookie_header(jar: &Jar, url: &str) -> Option<String> {
        jar.cookies(&Url::parse(url).unwrap()).map(|v| v.to_str().unwrap().to_string())
    }

    #[test]
    fn written_cookie_is_sent_to_every_path() {
        let jar = Arc::new(Jar::default());
        let mirror = JarCookieMirror::new(jar.clone(), "http://localhost:8080/api").unwrap();

        mirror.write(&SessionCookie::new("tablemate_token", "aaa.bbb.ccc", 604_800, false)).unwrap();

        assert_eq!(
            cookie_header(&jar, "http://localhost:8080/dashboard").as_deref(),
            Some("tablemate_token=aaa.bbb.ccc")
        );
    }

    #[test]
    fn removal_cookie_evicts_value() {
        let jar = Arc::new(Jar::default());
        let mirror = JarCookieMirror::new(jar.clone(), "http://localhost:8080").unwrap();

        mirror.write(&SessionCookie::new("tablemate_token", "aaa.bbb.ccc", 604_800, false)).unwrap();
        mirror.write(&SessionCookie::removal("tablemate_token", false)).unwrap();

        assert_eq!(cookie_header(&jar, "http://localhost:8080/"), None);
    }

    #[test]
    fn rejects_relative_origin() {
        let err = JarCookieMirror::new(Arc::new(Jar::default()), "/api").unwrap_err();
        assert!(matches!(err, StoreError::Mirror(_)));
    }
}
