use base64::engine::general_purpose::URL_SAFE_NO_PAD as b64_urlsafe;
use base64::Engine;
use rand::RngCore;

use crate::threadrand::SecureRng;

pub const SESSION_COOKIE_NAME: &str = "ballot_session";
pub const CSRF_COOKIE_NAME: &str = "ballot_csrf";

const CSRF_TOKEN_BYTES: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// A cookie described as plain attributes, independent of any HTTP
/// framework. Handlers render it into a `Set-Cookie` header at the edge.
#[derive(Clone, Debug)]
pub struct SessionCookie {
    pub name: &'static str,
    pub value: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: &'static str,
    pub max_age_secs: Option<i64>,
}

impl SessionCookie {
    /// The opaque session-id cookie. HttpOnly so scripts can never read
    /// the session reference.
    pub fn session(value: String, max_age_secs: i64) -> Self {
        Self {
            name: SESSION_COOKIE_NAME,
            value,
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
            path: "/",
            max_age_secs: Some(max_age_secs),
        }
    }

    /// The anti-forgery token cookie. Deliberately not HttpOnly; the
    /// client reads it back and repeats it in a header on state-changing
    /// requests.
    pub fn csrf(value: String, max_age_secs: i64) -> Self {
        Self {
            name: CSRF_COOKIE_NAME,
            value,
            http_only: false,
            secure: true,
            same_site: SameSite::Lax,
            path: "/",
            max_age_secs: Some(max_age_secs),
        }
    }

    /// An expired replacement that overwrites whatever the client's
    /// cookie jar holds under `name`, valid to send whether or not a
    /// server-side session still exists.
    pub fn expired(name: &'static str, http_only: bool) -> Self {
        Self {
            name,
            value: String::new(),
            http_only,
            secure: true,
            same_site: SameSite::Lax,
            path: "/",
            max_age_secs: Some(0),
        }
    }

    pub fn to_set_cookie_string(&self) -> String {
        let mut cookie = format!("{}={}", self.name, self.value);

        if self.http_only {
            cookie.push_str("; HttpOnly");
        }

        if self.secure {
            cookie.push_str("; Secure");
        }

        cookie.push_str("; SameSite=");
        cookie.push_str(self.same_site.as_str());
        cookie.push_str("; Path=");
        cookie.push_str(self.path);

        if let Some(max_age) = self.max_age_secs {
            cookie.push_str(&format!("; Max-Age={}", max_age));
        }

        cookie
    }
}

pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    SecureRng.fill_bytes(&mut bytes);

    b64_urlsafe.encode(bytes)
}

pub fn csrf_tokens_match(given: &str, saved: &str) -> bool {
    let given = given.as_bytes();
    let saved = saved.as_bytes();

    if given.len() != saved.len() {
        return false;
    }

    let mut tokens_dont_match = 0u8;

    // Do bitwise comparison to prevent timing attacks
    for (i, saved_byte) in saved.iter().enumerate() {
        unsafe {
            tokens_dont_match |= saved_byte ^ given.get_unchecked(i);
        }
    }

    tokens_dont_match == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = SessionCookie::session(String::from("abc123"), 3600);
        let rendered = cookie.to_set_cookie_string();

        assert!(rendered.starts_with("ballot_session=abc123"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("SameSite=Lax"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Max-Age=3600"));
    }

    #[test]
    fn test_csrf_cookie_is_readable_by_client() {
        let cookie = SessionCookie::csrf(String::from("token"), 3600);
        let rendered = cookie.to_set_cookie_string();

        assert!(rendered.starts_with("ballot_csrf=token"));
        assert!(!rendered.contains("HttpOnly"));
    }

    #[test]
    fn test_expired_cookie_overwrites_client_state() {
        let rendered = SessionCookie::expired(SESSION_COOKIE_NAME, true).to_set_cookie_string();

        assert!(rendered.starts_with("ballot_session="));
        assert!(rendered.contains("Max-Age=0"));
        assert!(rendered.contains("HttpOnly"));
    }

    #[test]
    fn test_csrf_token_generation_and_matching() {
        let token = generate_csrf_token();
        let other = generate_csrf_token();

        assert!(!token.is_empty());
        assert_ne!(token, other);

        assert!(csrf_tokens_match(&token, &token));
        assert!(!csrf_tokens_match(&token, &other));
        assert!(!csrf_tokens_match(&token, &token[1..]));
        assert!(!csrf_tokens_match("", &token));
    }
}
