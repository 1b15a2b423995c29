// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Launcher trait definitions.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::operation::{Action, ResourceKind};

/// Errors from launcher operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LauncherError {
    /// The container image for the command was not found.
    #[error("Image not found: {0}")]
    ImageNotFound(String),

    /// The command process failed to start.
    #[error("Command start failed: {0}")]
    StartFailed(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("Other: {0}")]
    Other(String),
}

/// Result type for launcher operations.
pub type Result<T> = std::result::Result<T, LauncherError>;

/// Description of one provisioning command to launch.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Operation identifier the command must echo back in its notification.
    pub operation_id: String,
    /// Requesting user.
    pub user: String,
    /// Resource kind the command provisions.
    pub kind: ResourceKind,
    /// Action the command performs.
    pub action: Action,
    /// Container image to run.
    pub image: String,
    /// Extra environment passed to the command.
    pub env: HashMap<String, String>,
}

/// Handle for a launched command (detached execution).
#[derive(Debug, Clone)]
pub struct LaunchHandle {
    /// Backend-specific identifier (container id for docker).
    pub handle_id: String,
    /// Operation identifier the command was launched for.
    pub operation_id: String,
    /// When the command was started.
    pub started_at: DateTime<Utc>,
}

/// Trait for provisioning command launchers.
///
/// Implementations start the command and return without waiting for it;
/// completion arrives later as an out-of-band notification carrying the
/// operation identifier.
#[async_trait]
pub trait CommandLauncher: Send + Sync {
    /// Launcher type identifier (e.g. "docker", "mock").
    fn launcher_type(&self) -> &'static str;

    /// Launch a provisioning command without waiting for completion.
    async fn launch(&self, spec: &LaunchSpec) -> Result<LaunchHandle>;
}
