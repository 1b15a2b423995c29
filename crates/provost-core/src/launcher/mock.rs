// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock launcher for testing.
//!
//! Records every launch instead of starting a real command, so tests can
//! drive the notification path themselves.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::traits::{CommandLauncher, LaunchHandle, LaunchSpec, LauncherError, Result};

/// Mock launcher for testing.
#[derive(Default)]
pub struct MockLauncher {
    launches: Arc<Mutex<Vec<LaunchSpec>>>,
    /// If true, every launch fails with a start error.
    pub fail_by_default: bool,
}

impl MockLauncher {
    /// Create a mock launcher whose launches succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock launcher whose launches fail.
    pub fn failing() -> Self {
        Self {
            launches: Arc::new(Mutex::new(Vec::new())),
            fail_by_default: true,
        }
    }

    /// Specs of every launch attempted so far.
    pub async fn launches(&self) -> Vec<LaunchSpec> {
        self.launches.lock().await.clone()
    }
}

#[async_trait]
impl CommandLauncher for MockLauncher {
    fn launcher_type(&self) -> &'static str {
        "mock"
    }

    async fn launch(&self, spec: &LaunchSpec) -> Result<LaunchHandle> {
        self.launches.lock().await.push(spec.clone());

        if self.fail_by_default {
            return Err(LauncherError::StartFailed("mock launch failure".to_string()));
        }

        // Operation ids are opaque caller-supplied strings; truncate by
        // characters, not bytes.
        let short: String = spec.operation_id.chars().take(8).collect();
        Ok(LaunchHandle {
            handle_id: format!("mock_{}", short),
            operation_id: spec.operation_id.clone(),
            started_at: Utc::now(),
        })
    }
}
