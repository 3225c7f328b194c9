//! Credential lifecycle
//!
//! A long-lived GitHub token (from the device-code login) is exchanged for a
//! short-lived Copilot API token. The cached token is reused until its expiry
//! passes, then refreshed. The state itself is owned by the caller: the engine
//! receives it as a value and reports every change through an update callback.

mod copilot;

pub use copilot::{CopilotTokenClient, DEFAULT_TOKEN_URL};

use crate::llm::LlmError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Persisted authentication state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    /// Long-lived credential used to mint access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    /// Cached short-lived access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthState {
    pub fn with_github_token(token: impl Into<String>) -> Self {
        Self {
            github_token: Some(token.into()),
            ..Self::default()
        }
    }

    /// The cached access token, if present and not yet expired at `now`
    pub fn cached_token(&self, now: DateTime<Utc>) -> Option<&str> {
        match (&self.access_token, self.expires_at) {
            (Some(token), Some(expires_at)) if now < expires_at => Some(token.as_str()),
            _ => None,
        }
    }
}

/// A freshly minted access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of [`ensure_valid_token`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredToken {
    pub token: String,
    /// `true` when the state was updated and must be persisted by the caller
    pub refreshed: bool,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not authenticated. Sign in to GitHub Copilot first.")]
    NotAuthenticated,
    #[error("Failed to refresh access token: {0}")]
    Refresh(#[from] LlmError),
}

/// Exchanges the long-lived credential for an access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, github_token: &str) -> Result<AccessToken, LlmError>;
}

#[async_trait]
impl<T: TokenRefresher + ?Sized> TokenRefresher for Arc<T> {
    async fn refresh(&self, github_token: &str) -> Result<AccessToken, LlmError> {
        (**self).refresh(github_token).await
    }
}

/// Return a usable access token, refreshing it when absent or expired
pub async fn ensure_valid_token<R>(
    state: &mut AuthState,
    refresher: &R,
) -> Result<EnsuredToken, AuthError>
where
    R: TokenRefresher + ?Sized,
{
    ensure_valid_token_at(state, refresher, Utc::now()).await
}

pub async fn ensure_valid_token_at<R>(
    state: &mut AuthState,
    refresher: &R,
    now: DateTime<Utc>,
) -> Result<EnsuredToken, AuthError>
where
    R: TokenRefresher + ?Sized,
{
    if let Some(token) = state.cached_token(now) {
        return Ok(EnsuredToken {
            token: token.to_string(),
            refreshed: false,
        });
    }

    let github_token = state
        .github_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::NotAuthenticated)?;

    tracing::debug!("Refreshing access token");
    let fresh = refresher.refresh(github_token).await?;
    tracing::info!(expires_at = %fresh.expires_at, "Access token refreshed");

    state.access_token = Some(fresh.token.clone());
    state.expires_at = Some(fresh.expires_at);

    Ok(EnsuredToken {
        token: fresh.token,
        refreshed: true,
    })
}
