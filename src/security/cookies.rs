// ABOUTME: HTTP cookie helpers for the session and OAuth state cookies
// ABOUTME: Builds HttpOnly, SameSite cookies and reads values back from request headers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

//! Cookie utilities
//!
//! The session cookie itself is issued elsewhere; this module only reads it.
//! The `oauth_state` cookie is written by the authorize endpoints and checked
//! by the callbacks.

use axum::http::{header, HeaderMap, HeaderValue};

use crate::constants::cookies;

/// Cookie attributes
pub struct SecureCookieConfig {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Max-Age in seconds
    pub max_age_secs: i64,
    /// `HttpOnly` flag
    pub http_only: bool,
    /// `Secure` flag
    pub secure: bool,
    /// `SameSite` policy
    pub same_site: SameSitePolicy,
    /// Cookie path
    pub path: String,
}

/// `SameSite` cookie policy
#[derive(Debug, Clone, Copy)]
pub enum SameSitePolicy {
    /// First-party only
    Strict,
    /// Sent on top-level navigation, which the provider redirect back is
    Lax,
}

impl SecureCookieConfig {
    /// HttpOnly, `SameSite=Lax` cookie on `/`
    #[must_use]
    pub fn new(name: &str, value: &str, max_age_secs: i64, secure: bool) -> Self {
        Self {
            name: name.to_owned(),
            value: value.to_owned(),
            max_age_secs,
            http_only: true,
            secure,
            same_site: SameSitePolicy::Lax,
            path: "/".to_owned(),
        }
    }

    /// Build the Set-Cookie header value
    #[must_use]
    pub fn build(&self) -> String {
        use std::fmt::Write;
        let mut cookie = format!("{}={}", self.name, self.value);

        let _ = write!(cookie, "; Max-Age={}", self.max_age_secs);
        let _ = write!(cookie, "; Path={}", self.path);

        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }

        match self.same_site {
            SameSitePolicy::Strict => cookie.push_str("; SameSite=Strict"),
            SameSitePolicy::Lax => cookie.push_str("; SameSite=Lax"),
        }

        cookie
    }
}

/// Append a short-lived `oauth_state` cookie
pub fn set_oauth_state_cookie(headers: &mut HeaderMap, state: &str, secure: bool) {
    let cookie = SecureCookieConfig::new(
        cookies::OAUTH_STATE,
        state,
        cookies::OAUTH_STATE_MAX_AGE_SECS,
        secure,
    );
    if let Ok(value) = HeaderValue::from_str(&cookie.build()) {
        headers.append(header::SET_COOKIE, value);
    }
}

/// Append a header expiring the `oauth_state` cookie
pub fn clear_oauth_state_cookie(headers: &mut HeaderMap, secure: bool) {
    let cookie = SecureCookieConfig::new(cookies::OAUTH_STATE, "", 0, secure);
    if let Ok(value) = HeaderValue::from_str(&cookie.build()) {
        headers.append(header::SET_COOKIE, value);
    }
}

/// Extract a cookie value from request headers
#[must_use]
pub fn get_cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name.trim() == cookie_name).then(|| value.trim().to_owned())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_cookie_is_http_only_and_lax() {
        let mut headers = HeaderMap::new();
        set_oauth_state_cookie(&mut headers, "abc", true);
        let value = headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(value.starts_with("oauth_state=abc; Max-Age=600; Path=/"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Secure"));
        assert!(value.ends_with("SameSite=Lax"));
    }

    #[test]
    fn reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("a=1; oauth_state=xyz; session=tok"),
        );
        assert_eq!(get_cookie_value(&headers, "oauth_state").as_deref(), Some("xyz"));
        assert_eq!(get_cookie_value(&headers, "missing"), None);
    }
}
