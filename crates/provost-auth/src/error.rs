// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for token exchange.

use thiserror::Error;

/// Token exchange errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The token endpoint could not be reached.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The token endpoint rejected the exchange.
    ///
    /// Deliberately opaque: the response body may carry credentials or
    /// provider internals and is logged at debug level only, never
    /// propagated.
    #[error("Token exchange rejected with HTTP {status}")]
    ExchangeFailed {
        /// HTTP status returned by the token endpoint.
        status: u16,
    },

    /// The token endpoint returned a body that is not a token response.
    #[error("Malformed token response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

/// Result type using [`AuthError`].
pub type Result<T> = std::result::Result<T, AuthError>;
