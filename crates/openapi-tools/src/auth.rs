//! Credential resolution for outbound calls.
//!
//! Bearer mode hands out the configured token. PAT mode exchanges the configured secret for a
//! bearer token via a login call and caches the result per identity for the lifetime of the
//! provider (or until [`AuthProvider::invalidate`] is called).

use crate::config::AuthConfig;
use crate::error::{OpenApiToolsError, Result};
use crate::redact::sanitize_reqwest_error;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Identity -> bearer token.
///
/// Each identity owns an async once-cell, so concurrent misses for the same identity share a
/// single login call. A failed login leaves the cell empty and the next caller tries again.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    slots: Arc<Mutex<HashMap<String, Arc<OnceCell<String>>>>>,
}

impl TokenCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, identity: &str) -> Arc<OnceCell<String>> {
        Arc::clone(self.slots.lock().entry(identity.to_string()).or_default())
    }

    /// Cached token for `identity`, if a login already completed.
    #[must_use]
    pub fn get(&self, identity: &str) -> Option<String> {
        self.slots
            .lock()
            .get(identity)
            .and_then(|cell| cell.get().cloned())
    }

    /// Forget the token for `identity`. Returns `true` if a token was cached.
    pub fn invalidate(&self, identity: &str) -> bool {
        self.slots
            .lock()
            .remove(identity)
            .is_some_and(|cell| cell.initialized())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Why a login left the identity's cache slot empty.
enum LoginAttempt {
    NoToken,
    Failed(OpenApiToolsError),
}

/// Resolves the bearer token to send with a call.
#[derive(Debug, Clone)]
pub struct AuthProvider {
    auth: Option<AuthConfig>,
    login_url: String,
    client: Client,
    cache: TokenCache,
}

impl AuthProvider {
    #[must_use]
    pub fn new(auth: Option<AuthConfig>, login_url: impl Into<String>, client: Client) -> Self {
        Self {
            auth,
            login_url: login_url.into(),
            client,
            cache: TokenCache::new(),
        }
    }

    /// Share an existing token cache (e.g. between resources that log in as the same user).
    #[must_use]
    pub fn with_cache(mut self, cache: TokenCache) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.auth.is_some()
    }

    /// The identity a PAT login would use: the caller-supplied identity, else the configured
    /// username. `None` outside PAT mode.
    #[must_use]
    pub fn pat_identity<'a>(&'a self, identity: Option<&'a str>) -> Option<&'a str> {
        match &self.auth {
            Some(AuthConfig::Pat { username, .. }) => identity
                .filter(|s| !s.is_empty())
                .or(username.as_deref())
                .filter(|s| !s.is_empty()),
            _ => None,
        }
    }

    /// Token to send as `Authorization: Bearer`. Empty when nothing is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the PAT login call fails or is rejected. A successful login whose
    /// response carries no token yields an empty token, which is not cached.
    pub async fn authenticate(&self, identity: Option<&str>) -> Result<String> {
        match &self.auth {
            None => Ok(String::new()),
            Some(AuthConfig::Bearer { token }) => Ok(token.clone().unwrap_or_default()),
            Some(AuthConfig::Pat { token: secret, .. }) => {
                let identity = self.pat_identity(identity);
                let secret = secret.as_deref().filter(|s| !s.is_empty());
                let (Some(identity), Some(secret)) = (identity, secret) else {
                    tracing::warn!("No username or token provided for PAT auth");
                    return Ok(String::new());
                };

                let slot = self.cache.slot(identity);
                let attempt = slot
                    .get_or_try_init(|| async {
                        match self.login(identity, secret).await {
                            Ok(Some(token)) => Ok(token),
                            Ok(None) => Err(LoginAttempt::NoToken),
                            Err(e) => Err(LoginAttempt::Failed(e)),
                        }
                    })
                    .await;
                match attempt {
                    Ok(token) => Ok(token.clone()),
                    Err(LoginAttempt::NoToken) => {
                        tracing::warn!(
                            username = %identity,
                            "Login response carried no token; sending the request unauthenticated"
                        );
                        Ok(String::new())
                    }
                    Err(LoginAttempt::Failed(e)) => Err(e),
                }
            }
        }
    }

    /// Drop the cached PAT token for `identity` (resolved like [`Self::authenticate`]).
    pub fn invalidate(&self, identity: Option<&str>) -> bool {
        match self.pat_identity(identity) {
            Some(id) => self.cache.invalidate(id),
            None => false,
        }
    }

    /// `Ok(None)` when the login succeeded but the response carried no token.
    async fn login(&self, username: &str, secret: &str) -> Result<Option<String>> {
        tracing::info!(username = %username, "Authenticating PAT");

        let resp = self
            .client
            .post(&self.login_url)
            .json(&LoginRequest {
                username,
                password: secret,
            })
            .send()
            .await
            .map_err(|e| OpenApiToolsError::Transport(sanitize_reqwest_error(&e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(OpenApiToolsError::Auth(format!(
                "Failed to authenticate PAT for {username}: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body: LoginResponse = resp.json().await.map_err(|e| {
            OpenApiToolsError::Auth(format!(
                "Invalid login response for {username}: {}",
                sanitize_reqwest_error(&e)
            ))
        })?;

        Ok(body.token.filter(|t| !t.is_empty()))
    }
}
