// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for provost-core.
//!
//! Parsing and validation errors are resolved locally into a terminal
//! failed status record whenever possible, so the orchestrator always
//! receives exactly one record per dispatched operation. Only transport
//! failures delivering that final record surface upward unresolved.

use thiserror::Error;

/// Engine errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Register was called with an already-registered identifier.
    #[error("Operation '{operation_id}' is already registered")]
    DuplicateOperation {
        /// The identifier that was already present.
        operation_id: String,
    },

    /// The identifier is not (or no longer) registered.
    #[error("Unknown operation '{operation_id}'")]
    UnknownOperation {
        /// The identifier that could not be resolved.
        operation_id: String,
    },

    /// The outcome was not failed but the required result section is absent.
    #[error("Notification for operation '{operation_id}' is missing its result section")]
    MissingResultSection {
        /// The operation the notification belongs to.
        operation_id: String,
    },

    /// The result section is present but its item list cannot be decoded.
    #[error("Malformed item payload for operation '{operation_id}': {details}")]
    MalformedItemPayload {
        /// The operation the notification belongs to.
        operation_id: String,
        /// Decode error details.
        details: String,
    },

    /// The notification payload is not a well-formed envelope.
    #[error("Malformed notification envelope: {details}")]
    MalformedEnvelope {
        /// Parse error details.
        details: String,
    },

    /// Delivering a status record to the callback destination failed.
    #[error("Transport failure delivering to '{destination}': {details}")]
    Transport {
        /// The callback destination URL.
        destination: String,
        /// Transport error details.
        details: String,
    },

    /// The outbound HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The operation request failed validation before dispatch.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provisioning command could not be launched.
    #[error("Launcher error: {0}")]
    Launcher(#[from] crate::launcher::LauncherError),

    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type using the engine [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
