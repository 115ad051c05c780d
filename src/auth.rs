//! Password hashing, session tokens and role rules.
//!
//! Foundation users see and manage everything. Municipal users are confined
//! to the project they are associated with; without one they can do nothing.

use std::sync::LazyLock;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, TimeDelta, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{NewUser, Role, User};

pub const SESSION_COOKIE: &str = "renatura_session";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing session token")]
    MissingToken,
    #[error("session is invalid or has expired")]
    InvalidSession,
    #[error("invalid email or password")]
    BadCredentials,
    #[error("password must have at least {min} characters", min = MIN_PASSWORD_CHARS)]
    WeakPassword,
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

pub const MIN_PASSWORD_CHARS: usize = 8;

/// Hash checked when a login names an unknown email, so both paths cost the same.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("renatura-unknown-account").ok());

/// Argon2id hash in PHC string format.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AuthError::WeakPassword);
    }
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| AuthError::Hashing(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Constant-time check of `password` against a stored PHC string.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Spends the same work as a real verification and always fails.
pub fn verify_unknown_account(password: &str) -> bool {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
    false
}

/// Field problems of a new account; empty when it can be stored.
pub fn check_new_user(input: &NewUser) -> Vec<String> {
    let mut problems = Vec::new();
    let email = input.email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => problems.push(format!("email '{email}' is not valid")),
    }
    if input.name.trim().is_empty() {
        problems.push("name is empty".to_string());
    }
    match (input.role, input.project_id) {
        (Role::Municipality, None) => {
            problems.push("ayuntamiento users must belong to a project".to_string())
        }
        (Role::Foundation, Some(_)) => {
            problems.push("fundacion users are not tied to a project".to_string())
        }
        _ => {}
    }
    if input.password.chars().count() < MIN_PASSWORD_CHARS {
        problems.push(AuthError::WeakPassword.to_string());
    }
    problems
}

/// Session lifetime and expiry instant, or `None` when they overflow.
pub fn session_expiry(now: DateTime<Utc>, ttl_hours: i64) -> Option<(TimeDelta, DateTime<Utc>)> {
    let ttl = TimeDelta::try_hours(ttl_hours)?;
    Some((ttl, now.checked_add_signed(ttl)?))
}

/// A fresh bearer token; only its digest is persisted.
pub fn new_session_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Token from `Authorization: Bearer ...`, falling back to the session cookie.
pub fn token_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

pub fn is_foundation(user: &User) -> bool {
    user.role == Role::Foundation
}

pub fn can_view_project(user: &User, project_id: Uuid) -> bool {
    match user.role {
        Role::Foundation => true,
        Role::Municipality => user.project_id == Some(project_id),
    }
}

/// Recording, editing and deleting values follows the same scope as viewing.
pub fn can_record_values(user: &User, project_id: Uuid) -> bool {
    can_view_project(user, project_id)
}

pub fn can_manage_catalog(user: &User) -> bool {
    is_foundation(user)
}
