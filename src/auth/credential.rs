//! Basic-auth credential extraction.

use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// A name/secret pair taken from a single request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub name: String,
    pub secret: String,
}

impl Credential {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
        }
    }

    /// Extract the credential from the `Authorization` header, if any.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        Self::from_basic(value)
    }

    /// Parse a `Basic <base64(name:secret)>` header value.
    ///
    /// The secret is everything after the first colon, so it may contain
    /// colons itself.
    pub fn from_basic(value: &str) -> Option<Self> {
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let text = String::from_utf8(decoded).ok()?;
        let (name, secret) = text.split_once(':')?;
        Some(Self::new(name, secret))
    }

    /// Header value carrying this credential.
    pub fn to_basic(&self) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", self.name, self.secret)))
    }
}

// Keep secrets out of logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("secret", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_parse_basic_header() {
        let cred = Credential::from_basic("Basic dGVzdDE6c2VjcmV0").unwrap();
        assert_eq!(cred, Credential::new("test1", "secret"));
    }

    #[test]
    fn test_secret_may_contain_colons() {
        let header = Credential::new("user", "a:b:c").to_basic();
        let cred = Credential::from_basic(&header).unwrap();
        assert_eq!(cred.name, "user");
        assert_eq!(cred.secret, "a:b:c");
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let header = Credential::new("u", "p").to_basic().replace("Basic", "bAsIc");
        assert!(Credential::from_basic(&header).is_some());
    }

    #[test]
    fn test_rejects_other_schemes_and_garbage() {
        assert!(Credential::from_basic("Bearer abc").is_none());
        assert!(Credential::from_basic("Basic !!!notbase64").is_none());
        // base64("nocolon")
        assert!(Credential::from_basic("Basic bm9jb2xvbg==").is_none());
    }

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(Credential::from_headers(&headers).is_none());
        let value = Credential::new("test1", "pw").to_basic();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
        assert_eq!(Credential::from_headers(&headers).unwrap().name, "test1");
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", Credential::new("u", "hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
