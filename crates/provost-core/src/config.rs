// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the provisioning engine.

use std::time::Duration;

/// Engine configuration loaded from environment variables.
///
/// All endpoints and knobs are injected values; nothing is compiled in.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the self-service API receiving status callbacks.
    pub self_service_base_url: String,
    /// Docker image name prefix for provisioning commands.
    pub image_prefix: String,
    /// Number of forwarder workers delivering callbacks concurrently.
    pub forwarder_workers: usize,
    /// Delivery attempts per status record (1 = no retry).
    pub delivery_attempts: u32,
    /// Timeout for one outbound callback request.
    pub delivery_timeout: Duration,
    /// Capacity of the notification intake queue.
    pub queue_capacity: usize,
    /// How long an operation may await its notification before it is
    /// force-failed. `None` disables the timeout monitor.
    pub operation_timeout: Option<Duration>,
    /// How often the timeout monitor scans for overdue operations.
    pub timeout_poll_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let self_service_base_url = std::env::var("PROVOST_SELF_SERVICE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("PROVOST_SELF_SERVICE_URL"))?;

        let image_prefix =
            std::env::var("PROVOST_IMAGE_PREFIX").unwrap_or_else(|_| "provost".to_string());

        let forwarder_workers =
            parse_var("PROVOST_FORWARDER_WORKERS", 4usize)?.max(1);

        let delivery_attempts = parse_var("PROVOST_DELIVERY_ATTEMPTS", 1u32)?.max(1);

        let delivery_timeout =
            Duration::from_secs(parse_var("PROVOST_DELIVERY_TIMEOUT_SECS", 30u64)?);

        let queue_capacity = parse_var("PROVOST_QUEUE_CAPACITY", 256usize)?.max(1);

        // 0 disables the timeout monitor
        let timeout_secs = parse_var("PROVOST_OPERATION_TIMEOUT_SECS", 7200u64)?;
        let operation_timeout = if timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(timeout_secs))
        };

        let timeout_poll_interval =
            Duration::from_secs(parse_var("PROVOST_TIMEOUT_POLL_SECS", 60u64)?);

        Ok(Self {
            self_service_base_url,
            image_prefix,
            forwarder_workers,
            delivery_attempts,
            delivery_timeout,
            queue_capacity,
            operation_timeout,
            timeout_poll_interval,
        })
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue(var)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// An environment variable holds an unparsable value.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
