//! Login tokens and role checks.
//!
//! `POST /login` hands out a random bearer token bound to a user name and a
//! role, valid until `POST /logout` or until it lapses. Protected routes validate `Authorization: Bearer <token>` and make
//! the caller's [`Identity`] available to handlers as a request extension.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

const GUEST_NAME: &str = "Guest";

/// Access level, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    User,
    Admin,
}

impl Role {
    /// Role granted to `name` at login.
    pub fn for_name(name: &str, admin_users: &[String]) -> Role {
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case(GUEST_NAME) {
            Role::Guest
        } else if admin_users.iter().any(|a| a.trim().eq_ignore_ascii_case(name)) {
            Role::Admin
        } else {
            Role::User
        }
    }
}

/// The logged-in caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub role: Role,
}

impl Identity {
    /// Fail with 403 unless the caller has at least `role`.
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        if self.role >= role {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "{} access required",
                match role {
                    Role::Guest => "guest",
                    Role::User => "user",
                    Role::Admin => "admin",
                }
            )))
        }
    }
}

/// Generate a random 32-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// A token together with when it was issued.
struct IssuedToken {
    identity: Identity,
    issued_at: Instant,
}

/// Issued login tokens. A token lapses `ttl` after login.
pub struct LoginRegistry {
    tokens: Mutex<HashMap<String, IssuedToken>>,
    ttl: Duration,
}

impl LoginRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Log `name` in and return a fresh token with the resulting identity.
    pub fn login(&self, name: &str, admin_users: &[String]) -> Result<(String, Identity), ApiError> {
        let role = Role::for_name(name, admin_users);
        let name = match name.trim() {
            "" => GUEST_NAME.to_string(),
            name => name.to_string(),
        };
        let identity = Identity { name, role };
        let token = generate_token();

        self.lock()?.insert(
            token.clone(),
            IssuedToken {
                identity: identity.clone(),
                issued_at: Instant::now(),
            },
        );
        tracing::info!(name = %identity.name, role = ?identity.role, "User logged in");
        Ok((token, identity))
    }

    /// Identity behind a live token. A lapsed token is dropped.
    pub fn lookup(&self, token: &str) -> Option<Identity> {
        let mut tokens = self.lock().ok()?;
        let issued = tokens.get(token)?;
        if issued.issued_at.elapsed() >= self.ttl {
            tokens.remove(token);
            return None;
        }
        Some(issued.identity.clone())
    }

    /// Revoke a token. Returns false when it was not issued.
    pub fn logout(&self, token: &str) -> bool {
        match self.lock() {
            Ok(mut tokens) => tokens.remove(token).is_some(),
            Err(_) => false,
        }
    }

    /// Drop every lapsed token and return how many went.
    pub fn purge_expired(&self) -> Result<usize, ApiError> {
        let mut tokens = self.lock()?;
        let before = tokens.len();
        tokens.retain(|_, issued| issued.issued_at.elapsed() < self.ttl);
        Ok(before - tokens.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, IssuedToken>>, ApiError> {
        self.tokens
            .lock()
            .map_err(|e| ApiError::Internal(format!("login lock poisoned: {}", e)))
    }
}

/// Extract the bearer token from request headers.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get("authorization")
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid Authorization header encoding".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Invalid bearer token".to_string()))
}

/// Middleware that requires a token issued by `POST /login`.
///
/// On success the caller's [`Identity`] is inserted into the request
/// extensions; otherwise responds 401.
pub async fn require_login(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let identity = match bearer_token(req.headers()) {
        Ok(token) => state.logins.lookup(token),
        Err(e) => return e.into_response(),
    };

    match identity {
        Some(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        None => ApiError::Unauthorized("Invalid bearer token".to_string()).into_response(),
    }
}
