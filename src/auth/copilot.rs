//! GitHub Copilot token exchange

use super::{AccessToken, TokenRefresher};
use crate::llm::LlmError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_TOKEN_URL: &str = "https://api.github.com/copilot_internal/v2/token";

const USER_AGENT: &str = concat!("vault-copilot/", env!("CARGO_PKG_VERSION"));

/// Mints Copilot API tokens from a GitHub OAuth token
pub struct CopilotTokenClient {
    client: Client,
    url: String,
}

impl CopilotTokenClient {
    pub fn new(url: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TokenRefresher for CopilotTokenClient {
    async fn refresh(&self, github_token: &str) -> Result<AccessToken, LlmError> {
        let response = self
            .client
            .get(&self.url)
            .header("Authorization", format!("token {github_token}"))
            .header("Accept", "application/json")
            .header("Editor-Version", USER_AGENT)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), &body));
        }

        parse_token_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    /// Unix seconds
    expires_at: i64,
}

fn parse_token_response(body: &str) -> Result<AccessToken, LlmError> {
    let resp: TokenResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::invalid_response(format!("Failed to parse token response: {e}")))?;

    let expires_at = DateTime::<Utc>::from_timestamp(resp.expires_at, 0).ok_or_else(|| {
        LlmError::invalid_response(format!("Invalid token expiry: {}", resp.expires_at))
    })?;

    Ok(AccessToken {
        token: resp.token,
        expires_at,
    })
}
