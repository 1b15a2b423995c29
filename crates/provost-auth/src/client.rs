// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! OAuth2 token client.
//!
//! Trades authorization codes and refresh tokens for access tokens at a
//! provider's token endpoint, using the standard
//! `application/x-www-form-urlencoded` grant requests.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AuthError, Result};

/// Token endpoint configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Absolute URL of the provider's token endpoint.
    pub token_endpoint: String,
    /// OAuth2 client identifier.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
    /// Redirect URI registered for the authorization-code flow.
    pub redirect_uri: String,
}

/// Successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for API calls.
    pub access_token: String,
    /// Refresh token, when the provider issues one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Token type, normally `Bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Client for a provider's OAuth2 token endpoint.
pub struct TokenClient {
    config: TokenConfig,
    client: reqwest::Client,
}

impl TokenClient {
    /// Create a client with a default HTTP client.
    pub fn new(config: TokenConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create a client reusing an existing HTTP client.
    pub fn with_client(config: TokenConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        self.request_tokens(&form).await
    }

    /// Trade a refresh token for a fresh access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        self.request_tokens(&form).await
    }

    async fn request_tokens(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .client
            .post(&self.config.token_endpoint)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // The body may carry provider internals; keep it out of the error.
            let body = response.text().await.unwrap_or_default();
            debug!(status = %status, body = %body, "Token endpoint rejected the request");
            warn!(status = %status, "Token exchange failed");
            return Err(AuthError::ExchangeFailed {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let tokens = serde_json::from_slice(&body)?;
        Ok(tokens)
    }
}
