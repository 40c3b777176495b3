//! Cookie mirror of the session credential
//!
//! Server-side middleware cannot read the durable store, so every credential
//! set or clear is mirrored into a cookie. Mirror writes are best-effort: a
//! failing mirror is logged by the session and never fails the caller.

use std::fmt;

use super::store::StoreError;

/// `SameSite` cookie attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// A session cookie together with the attributes it is written with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub max_age_secs: u64,
    pub same_site: SameSite,
    pub secure: bool,
}

impl SessionCookie {
    /// Cookie carrying `value` with `Path=/` and `SameSite=Lax`
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        max_age_secs: u64,
        secure: bool,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            max_age_secs,
            same_site: SameSite::Lax,
            secure,
        }
    }

    /// Cookie that deletes `name` (empty value, `Max-Age=0`)
    pub fn removal(name: impl Into<String>, secure: bool) -> Self {
        Self::new(name, "", 0, secure)
    }

    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.max_age_secs == 0
    }

    /// Render as a `Set-Cookie` header value
    #[must_use]
    pub fn header_value(&self) -> String {
        let mut header = format!(
            "{}={}; Path={}; Max-Age={}; SameSite={}",
            self.name,
            self.value,
            self.path,
            self.max_age_secs,
            self.same_site.as_str()
        );
        if self.secure {
            header.push_str("; Secure");
        }
        header
    }
}

impl fmt::Display for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header_value())
    }
}

/// Destination for mirrored session cookies
pub trait CookieMirror: Send + Sync {
    /// Write (or, for a removal cookie, delete) the session cookie
    ///
    /// # Errors
    /// Returns `StoreError::Mirror` if the cookie could not be written
    fn write(&self, cookie: &SessionCookie) -> Result<(), StoreError>;
}

/// Mirror that discards every write
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCookieMirror;

impl CookieMirror for NoopCookieMirror {
    fn write(&self, _cookie: &SessionCookie) -> Result<(), StoreError> {
        Ok(())
    }
}
