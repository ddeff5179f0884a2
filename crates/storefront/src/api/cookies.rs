//! Session cookies, plugged into reqwest as its cookie provider.
//!
//! The backend hands out `access_token` and `refresh_token` cookies.
//! [`SessionCookieJar`] keeps them in the [`SessionStore`] rather than a
//! general-purpose jar, so tokens from cookies and tokens from response
//! bodies live in one place and persist through the session's storage.
//! Parsing and expiry are left to the `cookie` crate.

use std::sync::Arc;

use chrono::Utc;
use cookie::Cookie;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use secrecy::ExposeSecret;
use url::Url;

use crate::session::SessionStore;

/// Cookie carrying the access token.
pub const ACCESS_COOKIE: &str = "access_token";
/// Cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// A token update announced by a `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieUpdate {
    Set(String),
    Removed,
}

/// Token updates found in a response's `Set-Cookie` headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCookies {
    pub access: Option<CookieUpdate>,
    pub refresh: Option<CookieUpdate>,
}

impl SessionCookies {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }

    /// Collect session cookie updates from `Set-Cookie` values. Unparseable
    /// and unrelated cookies are ignored.
    pub fn from_set_cookie<'a>(values: impl IntoIterator<Item = &'a HeaderValue>) -> Self {
        let mut cookies = Self::default();
        for value in values {
            let Some(cookie) = value.to_str().ok().and_then(|raw| Cookie::parse(raw).ok()) else {
                continue;
            };
            match cookie.name() {
                ACCESS_COOKIE => cookies.access = Some(update_for(&cookie)),
                REFRESH_COOKIE => cookies.refresh = Some(update_for(&cookie)),
                _ => {}
            }
        }
        cookies
    }
}

/// An empty value, a non-positive `Max-Age` or an `Expires` in the past all
/// delete the cookie.
fn update_for(cookie: &Cookie<'_>) -> CookieUpdate {
    let aged_out = cookie
        .max_age()
        .is_some_and(|age| age.whole_seconds() <= 0);
    let expired = cookie
        .expires_datetime()
        .is_some_and(|at| at.unix_timestamp() <= Utc::now().timestamp());

    if cookie.value().is_empty() || aged_out || expired {
        CookieUpdate::Removed
    } else {
        CookieUpdate::Set(cookie.value().to_owned())
    }
}

/// reqwest cookie provider backed by the session store.
///
/// The access token goes out on every request; the refresh token only on
/// requests to the refresh endpoint.
#[derive(Debug)]
pub struct SessionCookieJar {
    session: Arc<SessionStore>,
    refresh_path: String,
}

impl SessionCookieJar {
    #[must_use]
    pub fn new(session: Arc<SessionStore>, refresh_path: impl Into<String>) -> Self {
        Self {
            session,
            refresh_path: refresh_path.into(),
        }
    }

    fn is_refresh(&self, url: &Url) -> bool {
        url.path().trim_end_matches('/').ends_with(&self.refresh_path)
    }
}

impl CookieStore for SessionCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, _url: &Url) {
        let cookies = SessionCookies::from_set_cookie(cookie_headers);
        self.session.apply_cookies(&cookies);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let mut pairs = Vec::new();
        if let Some(access) = self.session.access_token() {
            pairs.push(Cookie::new(ACCESS_COOKIE, access.expose_secret().to_owned()));
        }
        if self.is_refresh(url)
            && let Some(refresh) = self.session.refresh_token()
        {
            pairs.push(Cookie::new(REFRESH_COOKIE, refresh.expose_secret().to_owned()));
        }
        if pairs.is_empty() {
            return None;
        }

        let header = pairs
            .iter()
            .map(|cookie| cookie.stripped().to_string())
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&header).ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::session::SessionTokens;
    use crate::storage::{KeyValueStore, MemoryStore, keys};

    fn signed_in() -> (Arc<MemoryStore>, SessionCookieJar) {
        let storage = Arc::new(MemoryStore::new());
        let session = Arc::new(SessionStore::restore(storage.clone()));
        session.store_tokens(SessionTokens {
            access_token: SecretString::from("a1"),
            refresh_token: Some(SecretString::from("r1")),
        });
        (storage, SessionCookieJar::new(session, "/auth/refresh"))
    }

    fn set(jar: &SessionCookieJar, values: &[&'static str]) {
        let headers: Vec<HeaderValue> = values.iter().copied().map(HeaderValue::from_static).collect();
        let url = Url::parse("https://api.hardware.example/auth/logout").unwrap();
        jar.set_cookies(&mut headers.iter(), &url);
    }

    #[test]
    fn test_from_set_cookie_reads_session_cookies_only() {
        let headers = [
            HeaderValue::from_static("theme=dark; Path=/"),
            HeaderValue::from_static("access_token=new-access; Path=/; HttpOnly; SameSite=Lax"),
            HeaderValue::from_static("refresh_token=; Path=/; Max-Age=0"),
        ];

        let cookies = SessionCookies::from_set_cookie(&headers);
        assert_eq!(cookies.access, Some(CookieUpdate::Set("new-access".to_string())));
        assert_eq!(cookies.refresh, Some(CookieUpdate::Removed));
    }

    #[test]
    fn test_negative_max_age_removes() {
        let headers = [HeaderValue::from_static("access_token=xyz; Max-Age=-1")];
        let cookies = SessionCookies::from_set_cookie(&headers);
        assert_eq!(cookies.access, Some(CookieUpdate::Removed));
    }

    #[test]
    fn test_past_expiry_clears_token() {
        let (storage, jar) = signed_in();

        set(
            &jar,
            &["access_token=deleted; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT"],
        );

        assert!(!jar.session.has_tokens());
        assert_eq!(storage.get(keys::ACCESS_TOKEN), None);
    }

    #[test]
    fn test_future_expiry_rotates_token() {
        let (storage, jar) = signed_in();

        set(
            &jar,
            &["access_token=a2; Path=/; Expires=Fri, 01 Jan 2100 00:00:00 GMT"],
        );

        assert_eq!(jar.session.access_token().unwrap().expose_secret(), "a2");
        assert_eq!(jar.session.refresh_token().unwrap().expose_secret(), "r1");
        assert_eq!(storage.get(keys::ACCESS_TOKEN).as_deref(), Some("a2"));
    }

    #[test]
    fn test_refresh_token_only_sent_to_refresh_endpoint() {
        let (_, jar) = signed_in();

        let cart = Url::parse("https://api.hardware.example/v1/cart").unwrap();
        assert_eq!(jar.cookies(&cart).unwrap(), "access_token=a1");

        let refresh = Url::parse("https://api.hardware.example/v1/auth/refresh").unwrap();
        assert_eq!(
            jar.cookies(&refresh).unwrap(),
            "access_token=a1; refresh_token=r1"
        );
    }

    #[test]
    fn test_no_cookie_header_without_session() {
        let session = Arc::new(SessionStore::restore(Arc::new(MemoryStore::new())));
        let jar = SessionCookieJar::new(session, "/auth/refresh");
        let url = Url::parse("https://api.hardware.example/cart").unwrap();
        assert!(jar.cookies(&url).is_none());
    }
}
