//! Cookie-carried sessions.
//!
//! The session is a signed HS256 token holding the user's id and name. Nothing
//! is kept server-side: a request is authenticated exactly when its cookie
//! verifies against the process-wide key, so rotating the key logs everyone out.

use anyhow::{Context, Result};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SESSION_COOKIE: &str = "noticeboard_session";

/// Identity resolved from a valid session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: i64,
    username: String,
    iat: i64,
    exp: i64,
}

/// Signing key plus cookie settings, built once at startup.
pub struct SessionConfig {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: chrono::Duration,
    secure: bool,
}

impl SessionConfig {
    pub fn new(secret: &[u8], ttl: chrono::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::default(),
            ttl,
            secure: false,
        }
    }

    /// Only send the cookie over HTTPS.
    pub fn with_secure_cookie(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Signs a session for `user` and adds it to the jar.
    pub fn issue(&self, jar: CookieJar, user: &SessionUser) -> Result<CookieJar> {
        let now = chrono::Utc::now();
        let expires = now
            .checked_add_signed(self.ttl)
            .context("session ttl out of range")?;
        let claims = SessionClaims {
            sub: user.user_id,
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;

        let cookie = Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(cookie::time::Duration::seconds(self.ttl.num_seconds()));

        Ok(jar.add(cookie))
    }

    /// Resolves the session carried by the request, if any.
    ///
    /// A missing, malformed, expired or forged cookie is simply anonymous.
    pub fn read(&self, jar: &CookieJar) -> Option<SessionUser> {
        let cookie = jar.get(SESSION_COOKIE)?;
        match decode::<SessionClaims>(cookie.value(), &self.decoding, &self.validation) {
            Ok(data) => Some(SessionUser {
                user_id: data.claims.sub,
                username: data.claims.username,
            }),
            Err(e) => {
                debug!("Ignoring invalid session cookie: {}", e);
                None
            }
        }
    }

    /// Replaces the session cookie with an expired, empty one. Safe to call
    /// without an active session.
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        // `CookieJar::remove` only emits Set-Cookie when the request had the
        // cookie; the removal is sent unconditionally instead.
        let mut cookie: Cookie<'static> = Cookie::build(SESSION_COOKIE)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .into();
        cookie.make_removal();
        jar.add(cookie)
    }
}
