//! Credential token storage and the route guard built on it

use crate::error::CredentialError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use log::{info, warn};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The only claim the client cares about
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<u64>,
}

/// Token written by the login flow, read before connecting
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn token(&self) -> Option<String> {
        let token = fs::read_to_string(&self.path).ok()?;
        let token = token.trim();
        (!token.is_empty()).then(|| token.to_string())
    }

    pub fn store(&self, token: &str) -> std::io::Result<()> {
        fs::write(&self.path, token)
    }

    pub fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => info!("Cleared credential token"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Could not clear credential token: {}", e),
        }
    }
}

/// Expiry of a JWT in seconds since the epoch, if it declares one.
/// The signature is not checked; the server does that.
pub fn token_expiry(token: &str) -> Result<Option<u64>, CredentialError> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(CredentialError::Malformed),
    };

    let json = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| CredentialError::Malformed)?;
    let claims: Claims = serde_json::from_slice(&json).map_err(|_| CredentialError::Malformed)?;
    Ok(claims.exp)
}

/// Checks a token against the current time
pub fn validate_token(token: &str, now: SystemTime) -> Result<(), CredentialError> {
    let now = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs();

    match token_expiry(token)? {
        Some(exp) if exp < now => Err(CredentialError::Expired),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted(String),
    RedirectToLogin(CredentialError),
}

/// Gates everything that needs a session. An expired token is removed from
/// the store so the next login starts clean.
pub fn route_guard(store: &CredentialStore, now: SystemTime) -> Access {
    let Some(token) = store.token() else {
        return Access::RedirectToLogin(CredentialError::Missing);
    };

    match validate_token(&token, now) {
        Ok(()) => Access::Granted(token),
        Err(CredentialError::Expired) => {
            warn!("Credential token expired");
            store.clear();
            Access::RedirectToLogin(CredentialError::Expired)
        }
        Err(e) => {
            warn!("Credential token rejected: {}", e);
            Access::RedirectToLogin(e)
        }
    }
}
