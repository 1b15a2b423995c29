// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Docker launcher.
//!
//! Runs provisioning commands as detached docker containers. The operation
//! identifier and action are passed to the container as environment
//! variables; the container is expected to deliver its completion
//! notification through the portal's notification intake when it finishes.

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use tracing::{debug, info};

use super::traits::{CommandLauncher, LaunchHandle, LaunchSpec, LauncherError, Result};

/// Launcher that starts provisioning commands as docker containers.
pub struct DockerLauncher {
    docker_binary: String,
}

impl Default for DockerLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerLauncher {
    /// Create a launcher using the `docker` binary on PATH.
    pub fn new() -> Self {
        Self {
            docker_binary: "docker".to_string(),
        }
    }

    /// Create a launcher using an explicit docker binary path.
    pub fn with_binary(docker_binary: impl Into<String>) -> Self {
        Self {
            docker_binary: docker_binary.into(),
        }
    }
}

#[async_trait]
impl CommandLauncher for DockerLauncher {
    fn launcher_type(&self) -> &'static str {
        "docker"
    }

    async fn launch(&self, spec: &LaunchSpec) -> Result<LaunchHandle> {
        let mut command = Command::new(&self.docker_binary);
        command
            .arg("run")
            .arg("--detach")
            .arg("--label")
            .arg(format!("provost.operation_id={}", spec.operation_id));

        for (key, value) in &spec.env {
            command.arg("-e").arg(format!("{}={}", key, value));
        }

        command.arg(&spec.image);

        debug!(
            operation_id = %spec.operation_id,
            image = %spec.image,
            action = %spec.action,
            "Launching provisioning container"
        );

        let output = command.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("No such image") || stderr.contains("pull access denied") {
                return Err(LauncherError::ImageNotFound(spec.image.clone()));
            }
            return Err(LauncherError::StartFailed(stderr.trim().to_string()));
        }

        // `docker run -d` prints the container id on stdout
        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if container_id.is_empty() {
            return Err(LauncherError::StartFailed(
                "docker did not report a container id".to_string(),
            ));
        }

        info!(
            operation_id = %spec.operation_id,
            container_id = %container_id,
            image = %spec.image,
            "Provisioning container started"
        );

        Ok(LaunchHandle {
            handle_id: container_id,
            operation_id: spec.operation_id.clone(),
            started_at: Utc::now(),
        })
    }
}
