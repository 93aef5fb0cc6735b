//! Admin credential gate.
//!
//! A single shared password guards the administrative surface. Login
//! issues an opaque session token with a fixed lifetime, delivered as an
//! HttpOnly cookie and held in memory; restarting the server logs every
//! admin out.

use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Cookie carrying the admin session token.
pub const ADMIN_COOKIE: &str = "admin_token";

/// In-memory admin session store.
pub struct SessionStore {
    ttl: Duration,
    tokens: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl SessionStore {
    /// Create a new session store with the given lifetime.
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            ttl: Duration::hours(ttl_hours),
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Session lifetime in seconds, for the cookie's Max-Age.
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Issue a fresh session token.
    pub fn issue(&self) -> String {
        let token = Uuid::new_v4().to_string();
        let mut tokens = self.tokens.write().unwrap();
        tokens.retain(|_, expires| *expires > Utc::now());
        tokens.insert(token.clone(), Utc::now() + self.ttl);
        token
    }

    /// Check a token and prune it when expired.
    pub fn verify(&self, token: &str) -> bool {
        let mut tokens = self.tokens.write().unwrap();
        match tokens.get(token) {
            Some(expires) if *expires > Utc::now() => true,
            Some(_) => {
                tokens.remove(token);
                false
            }
            None => false,
        }
    }

    /// Drop a token (logout).
    pub fn revoke(&self, token: &str) {
        self.tokens.write().unwrap().remove(token);
    }
}

/// Pull the admin session token from a request's Cookie header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get("cookie")?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == ADMIN_COOKIE).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn issue_verify_revoke_cycle() {
        let sessions = SessionStore::new(24);

        let token = sessions.issue();
        assert!(sessions.verify(&token));
        assert!(!sessions.verify("not-a-token"));

        sessions.revoke(&token);
        assert!(!sessions.verify(&token));
    }

    #[test]
    fn expired_tokens_fail_verification() {
        let sessions = SessionStore::new(0);
        let token = sessions.issue();
        assert!(!sessions.verify(&token));
    }

    #[test]
    fn cookie_parsing_finds_the_admin_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("theme=dark; admin_token=abc123; lang=ja"),
        );
        assert_eq!(session_token(&headers), Some("abc123".to_string()));

        let mut missing = HeaderMap::new();
        missing.insert("cookie", HeaderValue::from_static("theme=dark"));
        assert_eq!(session_token(&missing), None);

        assert_eq!(session_token(&HeaderMap::new()), None);
    }
}
