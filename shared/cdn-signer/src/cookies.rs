use std::fmt::Write as _;

use chrono::{DateTime, Utc};

/// Attributes applied to every signed cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    /// `Domain` attribute; `None` leaves it host-only
    pub domain: Option<String>,
    /// `Path` attribute
    pub path: String,
    /// Whether to mark the cookies `Secure`
    pub secure: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            domain: None,
            path: "/".to_string(),
            secure: false,
        }
    }
}

/// One cookie of a signed cookie set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCookie {
    /// Cookie name
    pub name: &'static str,
    /// Cookie value, already safe to place in a header
    pub value: String,
    /// `Domain` attribute
    pub domain: Option<String>,
    /// `Path` attribute
    pub path: String,
    /// `Secure` attribute
    pub secure: bool,
    /// `HttpOnly` attribute
    pub http_only: bool,
    /// `Expires` attribute
    pub expires_at: DateTime<Utc>,
}

impl SignedCookie {
    /// Renders the cookie as a `Set-Cookie` header value
    #[must_use]
    pub fn to_set_cookie(&self) -> String {
        let mut header = format!("{}={}", self.name, self.value);
        if !self.path.is_empty() {
            let _ = write!(header, "; Path={}", self.path);
        }
        if let Some(domain) = &self.domain {
            let _ = write!(header, "; Domain={domain}");
        }
        let _ = write!(
            header,
            "; Expires={}",
            self.expires_at.format("%a, %d %b %Y %H:%M:%S GMT")
        );
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        header
    }
}

/// The three cookies that together authenticate a bearer at the edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCookieSet {
    cookies: Vec<SignedCookie>,
}

impl SignedCookieSet {
    pub(crate) const fn new(cookies: Vec<SignedCookie>) -> Self {
        Self { cookies }
    }

    /// Cookie by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SignedCookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    /// Iterates over the cookies in issue order
    pub fn iter(&self) -> impl Iterator<Item = &SignedCookie> {
        self.cookies.iter()
    }

    /// Number of cookies in the set
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Whether the set holds no cookies
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Request `Cookie` header value with name/value pairs only.
    ///
    /// Domain, path and secure are hints for the user agent and are not part of the token.
    #[must_use]
    pub fn to_cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl<'a> IntoIterator for &'a SignedCookieSet {
    type Item = &'a SignedCookie;
    type IntoIter = std::slice::Iter<'a, SignedCookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.cookies.iter()
    }
}
