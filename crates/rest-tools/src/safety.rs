//! Outbound HTTP safety controls (origin pinning, redirect policy, redaction).
//!
//! Every tool call resolves a caller-supplied path against the configured base URL. Paths like
//! `@evil.example/` or `//evil.example/` can move the request to another host, which would send
//! our credential to it. Requests and redirects are therefore pinned to the base URL's origin.

use crate::error::{RestError, Result};
use url::Url;

/// Maximum number of same-origin redirects followed for one request.
const MAX_REDIRECTS: usize = 10;

/// Validate a resolved URL before making an outbound request.
///
/// # Errors
///
/// Returns `RestError::Blocked` if the URL uses a non-`http(s)` scheme or does not share the base
/// URL's origin (scheme, host, port).
pub fn check_same_origin(base: &Url, url: &Url) -> Result<()> {
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(RestError::Blocked(format!(
            "unsupported URL scheme '{scheme}'"
        )));
    }

    if url.origin() != base.origin() {
        return Err(RestError::Blocked(format!(
            "'{}' is outside the configured backend '{}'",
            redact_url(url),
            redact_url(base)
        )));
    }

    Ok(())
}

/// Redirect policy that follows redirects only while they stay on `base`'s origin.
#[must_use]
pub fn same_origin_redirects(base: &Url) -> reqwest::redirect::Policy {
    let origin = base.origin();
    reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if attempt.url().origin() == origin {
            attempt.follow()
        } else {
            attempt.stop()
        }
    })
}

#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    // Best-effort: drop credentials + query + fragment.
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://api.example.com/v1").expect("url")
    }

    #[test]
    fn same_origin_is_allowed() {
        let url = Url::parse("https://api.example.com/v1/users?id=1").expect("url");
        check_same_origin(&base(), &url).expect("allowed");
    }

    #[test]
    fn other_host_is_blocked() {
        let url = Url::parse("https://api.example.com@evil.example/").expect("url");
        let err = check_same_origin(&base(), &url).unwrap_err();
        assert!(matches!(err, RestError::Blocked(_)));
        assert!(err.to_string().contains("outside the configured backend"));
    }

    #[test]
    fn other_port_or_scheme_is_blocked() {
        let port = Url::parse("https://api.example.com:8443/v1").expect("url");
        assert!(check_same_origin(&base(), &port).is_err());

        let scheme = Url::parse("http://api.example.com/v1").expect("url");
        assert!(check_same_origin(&base(), &scheme).is_err());
    }

    #[test]
    fn redact_url_drops_credentials_and_query() {
        let url = Url::parse("https://user:pw@api.example.com/x?api_key=secret#frag").expect("url");
        let redacted = redact_url(&url);
        assert_eq!(redacted, "https://api.example.com/x");
    }
}
