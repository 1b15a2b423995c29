// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Completion notification payloads.
//!
//! A [`ResultEnvelope`] is the raw payload the out-of-process command
//! executor sends when a provisioning command finishes. It carries a
//! top-level outcome status, an optional error message, and an
//! action-specific `result` section. The envelope is transient: it is
//! parsed once and consumed by the handler for the operation it belongs to.
//!
//! Structural validation (is the payload an envelope at all, is the
//! required `result` section present) is separate from per-item decoding of
//! the result content. Structural absence is a protocol violation and fatal
//! for the operation; content decode failures are degraded gracefully by
//! the kind-specific reducers.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Top-level outcome of a completed provisioning command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The command completed successfully.
    Success,
    /// The command failed.
    Failed,
}

/// Raw completion notification payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultEnvelope {
    /// Top-level outcome status as reported by the executor.
    pub status: String,
    /// Top-level error message, present on failure.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Action-specific result section. Required unless the outcome is
    /// failed.
    #[serde(default)]
    pub result: Option<Value>,
}

impl ResultEnvelope {
    /// Parse an envelope from a raw JSON value.
    pub fn from_value(payload: Value) -> Result<Self> {
        serde_json::from_value(payload).map_err(|e| Error::MalformedEnvelope {
            details: e.to_string(),
        })
    }

    /// Parse an envelope from raw bytes.
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| Error::MalformedEnvelope {
            details: e.to_string(),
        })
    }

    /// Map the raw status string onto an [`Outcome`].
    ///
    /// The executor reports `ok`/`success` on success and `err`/`failed` on
    /// failure. Anything else is a malformed envelope.
    pub fn outcome(&self) -> Result<Outcome> {
        match self.status.as_str() {
            "ok" | "success" => Ok(Outcome::Success),
            "err" | "failed" => Ok(Outcome::Failed),
            other => Err(Error::MalformedEnvelope {
                details: format!("unrecognized outcome status '{}'", other),
            }),
        }
    }

    /// The top-level error message, or a generic fallback when the
    /// executor reported failure without one.
    pub fn error_message(&self) -> &str {
        self.error_message
            .as_deref()
            .unwrap_or("provisioning command failed")
    }
}
