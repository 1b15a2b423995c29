// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operation timeout monitor.
//!
//! Background worker that force-expires operations whose completion
//! notification never arrived. Expiry goes through the registry's atomic
//! claim, so a notification racing the monitor resolves the operation
//! exactly once either way: whichever side claims the handler produces the
//! single terminal record.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::forwarder::{Delivery, ForwarderHandle, callback_destination};
use crate::request_registry::RequestRegistry;

/// Error message stamped on force-expired operations.
pub const TIMEOUT_MESSAGE: &str =
    "operation timed out: no completion notification received";

/// Timeout monitor configuration.
#[derive(Debug, Clone)]
pub struct TimeoutMonitorConfig {
    /// How often to scan for expired operations.
    pub poll_interval: Duration,
    /// Age after which a pending operation is force-expired.
    pub operation_timeout: Duration,
}

impl Default for TimeoutMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            operation_timeout: Duration::from_secs(7200),
        }
    }
}

/// Background worker expiring operations that never completed.
pub struct TimeoutMonitor {
    registry: Arc<RequestRegistry>,
    forwarder: ForwarderHandle,
    self_service_base_url: String,
    config: TimeoutMonitorConfig,
    shutdown: Arc<Notify>,
}

impl TimeoutMonitor {
    /// Create a monitor over the given registry.
    pub fn new(
        registry: Arc<RequestRegistry>,
        forwarder: ForwarderHandle,
        self_service_base_url: impl Into<String>,
        config: TimeoutMonitorConfig,
    ) -> Self {
        Self {
            registry,
            forwarder,
            self_service_base_url: self_service_base_url.into(),
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle for requesting shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Spawn the monitor loop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run the monitor loop until shutdown is requested.
    pub async fn run(self) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            operation_timeout_secs = self.config.operation_timeout.as_secs(),
            "Timeout monitor started"
        );

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Timeout monitor shutting down");
                    break;
                }

                _ = ticker.tick() => {
                    self.expire_overdue().await;
                }
            }
        }
    }

    /// Claim and fail every operation older than the timeout.
    async fn expire_overdue(&self) {
        let timeout = match chrono::Duration::from_std(self.config.operation_timeout) {
            Ok(d) => d,
            Err(e) => {
                error!(error = %e, "Operation timeout is not representable");
                return;
            }
        };
        let cutoff = Utc::now() - timeout;

        for operation_id in self.registry.registered_before(cutoff) {
            // A notification may win the race between the scan and here.
            let Some(handler) = self.registry.take(&operation_id) else {
                continue;
            };

            warn!(
                operation_id = %operation_id,
                timeout_secs = self.config.operation_timeout.as_secs(),
                "Force-expiring operation without completion notification"
            );

            let record = handler.failed_record(TIMEOUT_MESSAGE);
            let destination =
                callback_destination(&self.self_service_base_url, handler.callback_uri());

            if let Err(e) = self
                .forwarder
                .deliver(Delivery {
                    operation_id: operation_id.clone(),
                    destination,
                    record,
                })
                .await
            {
                error!(
                    operation_id = %operation_id,
                    error = %e,
                    "Failed to enqueue timeout record"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forwarder::{Forwarder, ForwarderConfig};
    use crate::handler::ExploratoryHandler;
    use crate::operation::{Action, OperationRequest, ResourceKind};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn register(registry: &RequestRegistry, operation_id: &str) {
        let request =
            OperationRequest::new("alice", ResourceKind::Exploratory, Action::Create, "nb-1")
                .with_operation_id(operation_id);
        registry
            .register(Arc::new(ExploratoryHandler::new(request)))
            .unwrap();
    }

    #[tokio::test]
    async fn test_overdue_operation_is_expired_and_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/api/infrastructure_provision/exploratory_environment/status",
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let registry = Arc::new(RequestRegistry::new());
        register(&registry, "op-old");

        let forwarder = Forwarder::start(ForwarderConfig::default()).unwrap();
        let monitor = TimeoutMonitor::new(
            registry.clone(),
            forwarder.handle(),
            server.uri(),
            TimeoutMonitorConfig {
                poll_interval: Duration::from_secs(60),
                // Zero timeout: everything registered is already overdue
                operation_timeout: Duration::from_secs(0),
            },
        );

        monitor.expire_overdue().await;

        assert!(registry.is_empty());
        forwarder.shutdown().await;
        server.verify().await;
    }

    #[tokio::test]
    async fn test_fresh_operation_is_left_alone() {
        let registry = Arc::new(RequestRegistry::new());
        register(&registry, "op-fresh");

        let forwarder = Forwarder::start(ForwarderConfig::default()).unwrap();
        let monitor = TimeoutMonitor::new(
            registry.clone(),
            forwarder.handle(),
            "http://localhost:1",
            TimeoutMonitorConfig::default(),
        );

        monitor.expire_overdue().await;

        assert_eq!(registry.len(), 1);
        forwarder.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_loop() {
        let registry = Arc::new(RequestRegistry::new());
        let forwarder = Forwarder::start(ForwarderConfig::default()).unwrap();
        let monitor = TimeoutMonitor::new(
            registry,
            forwarder.handle(),
            "http://localhost:1",
            TimeoutMonitorConfig::default(),
        );

        let shutdown = monitor.shutdown_handle();
        let task = monitor.spawn();

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("monitor should stop")
            .unwrap();
        forwarder.shutdown().await;
    }
}
