// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable provisioning engine.
//!
//! [`ProvisioningEngine`] wires the registry, dispatcher, notification
//! intake, forwarder pool, and timeout monitor into one embeddable unit:
//!
//! ```text
//! dispatch() ──► Dispatcher ──► registry.register ──► launcher.launch
//!
//! notify() ──► intake queue ──► processing loop ──► registry.take
//!                                     │                  │
//!                                     ▼                  ▼
//!                              handler.handle ──► forwarder pool ──► POST
//! ```
//!
//! Notification intake and callback delivery are decoupled through bounded
//! queues: `notify` only enqueues, the processing loop only claims and
//! reduces, and the forwarder workers absorb slow callback destinations.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use provost_core::launcher::MockLauncher;
//! use provost_core::runtime::ProvisioningEngine;
//!
//! # async fn demo() -> provost_core::Result<()> {
//! let engine = ProvisioningEngine::builder(Arc::new(MockLauncher::new()))
//!     .with_self_service_base_url("http://localhost:8080")
//!     .start()?;
//!
//! // ... dispatch operations, feed notifications ...
//!
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::envelope::ResultEnvelope;
use crate::error::{Error, Result};
use crate::forwarder::{
    Delivery, Forwarder, ForwarderConfig, ForwarderHandle, callback_destination,
};
use crate::launcher::{CommandLauncher, LaunchHandle};
use crate::operation::OperationRequest;
use crate::request_registry::RequestRegistry;
use crate::timeout_monitor::{TimeoutMonitor, TimeoutMonitorConfig};

/// One completion notification awaiting processing.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Identifier of the operation the notification answers.
    pub operation_id: String,
    /// Raw notification payload.
    pub payload: Value,
}

/// Builder for [`ProvisioningEngine`].
pub struct ProvisioningEngineBuilder {
    launcher: Arc<dyn CommandLauncher>,
    self_service_base_url: Option<String>,
    image_prefix: String,
    forwarder_workers: usize,
    delivery_attempts: u32,
    delivery_timeout: Duration,
    queue_capacity: usize,
    operation_timeout: Option<Duration>,
    timeout_poll_interval: Duration,
}

impl ProvisioningEngineBuilder {
    fn new(launcher: Arc<dyn CommandLauncher>) -> Self {
        Self {
            launcher,
            self_service_base_url: None,
            image_prefix: "provost".to_string(),
            forwarder_workers: 4,
            delivery_attempts: 1,
            delivery_timeout: Duration::from_secs(30),
            queue_capacity: 256,
            operation_timeout: Some(Duration::from_secs(7200)),
            timeout_poll_interval: Duration::from_secs(60),
        }
    }

    /// Base URL of the self-service API receiving status callbacks.
    /// Required.
    pub fn with_self_service_base_url(mut self, url: impl Into<String>) -> Self {
        self.self_service_base_url = Some(url.into());
        self
    }

    /// Docker image name prefix for provisioning commands.
    pub fn with_image_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.image_prefix = prefix.into();
        self
    }

    /// Number of forwarder workers delivering callbacks concurrently.
    pub fn with_forwarder_workers(mut self, workers: usize) -> Self {
        self.forwarder_workers = workers.max(1);
        self
    }

    /// Delivery attempts per status record (1 = no retry).
    pub fn with_delivery_attempts(mut self, attempts: u32) -> Self {
        self.delivery_attempts = attempts.max(1);
        self
    }

    /// Timeout for one outbound callback request.
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Capacity of the notification intake and delivery queues.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// How long an operation may await its notification before it is
    /// force-failed. `None` disables the timeout monitor.
    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// How often the timeout monitor scans for overdue operations.
    pub fn with_timeout_poll_interval(mut self, interval: Duration) -> Self {
        self.timeout_poll_interval = interval;
        self
    }

    /// Apply every knob from an environment-loaded [`Config`].
    pub fn with_config(mut self, config: &Config) -> Self {
        self.self_service_base_url = Some(config.self_service_base_url.clone());
        self.image_prefix = config.image_prefix.clone();
        self.forwarder_workers = config.forwarder_workers.max(1);
        self.delivery_attempts = config.delivery_attempts.max(1);
        self.delivery_timeout = config.delivery_timeout;
        self.queue_capacity = config.queue_capacity.max(1);
        self.operation_timeout = config.operation_timeout;
        self.timeout_poll_interval = config.timeout_poll_interval;
        self
    }

    /// Start the engine: forwarder pool, processing loop, and (when an
    /// operation timeout is configured) the timeout monitor.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> Result<ProvisioningEngine> {
        let Some(self_service_base_url) = self.self_service_base_url else {
            return Err(Error::InvalidRequest(
                "self-service base URL must be set".to_string(),
            ));
        };

        let registry = Arc::new(RequestRegistry::new());
        let dispatcher = Dispatcher::new(
            registry.clone(),
            self.launcher.clone(),
            self.image_prefix.clone(),
        );

        let forwarder = Forwarder::start(ForwarderConfig {
            workers: self.forwarder_workers,
            queue_capacity: self.queue_capacity,
            delivery_attempts: self.delivery_attempts,
            request_timeout: self.delivery_timeout,
        })?;
        let forwarder_handle = forwarder.handle();

        let (notification_tx, notification_rx) = mpsc::channel(self.queue_capacity);
        let processing = tokio::spawn(processing_loop(
            notification_rx,
            registry.clone(),
            forwarder_handle.clone(),
            self_service_base_url.clone(),
        ));

        let monitor = self.operation_timeout.map(|operation_timeout| {
            let monitor = TimeoutMonitor::new(
                registry.clone(),
                forwarder_handle.clone(),
                self_service_base_url.clone(),
                TimeoutMonitorConfig {
                    poll_interval: self.timeout_poll_interval,
                    operation_timeout,
                },
            );
            let shutdown = monitor.shutdown_handle();
            (shutdown, monitor.spawn())
        });

        info!(
            self_service_base_url = %self_service_base_url,
            launcher = self.launcher.launcher_type(),
            timeout_monitor = monitor.is_some(),
            "Provisioning engine started"
        );

        Ok(ProvisioningEngine {
            registry,
            dispatcher,
            notification_tx,
            forwarder,
            forwarder_handle,
            processing,
            monitor,
            self_service_base_url,
        })
    }
}

/// Asynchronous operation correlation and status-propagation engine.
pub struct ProvisioningEngine {
    registry: Arc<RequestRegistry>,
    dispatcher: Dispatcher,
    notification_tx: mpsc::Sender<Notification>,
    forwarder: Forwarder,
    forwarder_handle: ForwarderHandle,
    processing: JoinHandle<()>,
    monitor: Option<(Arc<tokio::sync::Notify>, JoinHandle<()>)>,
    self_service_base_url: String,
}

impl ProvisioningEngine {
    /// Builder over the given command launcher.
    pub fn builder(launcher: Arc<dyn CommandLauncher>) -> ProvisioningEngineBuilder {
        ProvisioningEngineBuilder::new(launcher)
    }

    /// Dispatch one provisioning operation.
    ///
    /// The handler is registered before the command is launched; a failed
    /// launch leaves no registration behind.
    pub async fn dispatch(&self, request: OperationRequest) -> Result<LaunchHandle> {
        self.dispatcher.dispatch(request).await
    }

    /// Feed a completion notification into the engine.
    ///
    /// Enqueues only; processing happens on the engine's own loop. Unknown
    /// identifiers are accepted here and discarded during processing, so
    /// late and duplicate notifications are harmless to the caller.
    pub async fn notify(&self, operation_id: impl Into<String>, payload: Value) -> Result<()> {
        let notification = Notification {
            operation_id: operation_id.into(),
            payload,
        };
        self.notification_tx
            .send(notification)
            .await
            .map_err(|_| Error::InvalidRequest("engine is shut down".to_string()))
    }

    /// Non-blocking variant of [`notify`](Self::notify).
    ///
    /// Fails when the intake queue is full instead of waiting.
    pub fn try_notify(&self, operation_id: impl Into<String>, payload: Value) -> Result<()> {
        let notification = Notification {
            operation_id: operation_id.into(),
            payload,
        };
        self.notification_tx
            .try_send(notification)
            .map_err(|e| Error::InvalidRequest(format!("notification intake rejected: {}", e)))
    }

    /// Cancel a pending operation, delivering a terminal failed record.
    ///
    /// Returns [`Error::UnknownOperation`] when the identifier is not (or
    /// no longer) pending.
    pub async fn cancel(&self, operation_id: &str, reason: &str) -> Result<()> {
        let Some(handler) = self.registry.take(operation_id) else {
            return Err(Error::UnknownOperation {
                operation_id: operation_id.to_string(),
            });
        };

        warn!(operation_id = %operation_id, reason = %reason, "Cancelling operation");

        let record = handler.failed_record(reason);
        let destination =
            callback_destination(&self.self_service_base_url, handler.callback_uri());
        self.forwarder_handle
            .deliver(Delivery {
                operation_id: operation_id.to_string(),
                destination,
                record,
            })
            .await
    }

    /// Number of operations still awaiting their completion notification.
    pub fn pending_operations(&self) -> usize {
        self.registry.len()
    }

    /// Stop intake, drain pending notifications and deliveries, and stop
    /// all background tasks.
    pub async fn shutdown(self) {
        info!("Provisioning engine shutting down");

        // Closing intake lets the processing loop drain and exit.
        drop(self.notification_tx);
        if let Err(e) = self.processing.await {
            error!(error = %e, "Notification processing task panicked");
        }

        if let Some((shutdown, task)) = self.monitor {
            shutdown.notify_one();
            if let Err(e) = task.await {
                error!(error = %e, "Timeout monitor task panicked");
            }
        }

        // The forwarder drains its queue before its workers stop.
        self.forwarder.shutdown().await;

        info!("Provisioning engine stopped");
    }
}

/// Claim, reduce, and enqueue for delivery, one notification at a time.
async fn processing_loop(
    mut rx: mpsc::Receiver<Notification>,
    registry: Arc<RequestRegistry>,
    forwarder: ForwarderHandle,
    self_service_base_url: String,
) {
    debug!("Notification processing loop started");

    while let Some(notification) = rx.recv().await {
        let operation_id = notification.operation_id;

        // The claim is the exactly-once gate: duplicates and unknown
        // identifiers observe no entry and are discarded here.
        let Some(handler) = registry.take(&operation_id) else {
            debug!(
                operation_id = %operation_id,
                "Discarding notification for unknown operation"
            );
            continue;
        };

        let record = match ResultEnvelope::from_value(notification.payload) {
            Ok(envelope) => handler.handle(&envelope),
            Err(e) => {
                warn!(
                    operation_id = %operation_id,
                    error = %e,
                    "Notification payload is not a well-formed envelope"
                );
                handler.failed_record(&e.to_string())
            }
        };

        let destination = callback_destination(&self_service_base_url, handler.callback_uri());
        if let Err(e) = forwarder
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
                "Failed to enqueue status record for delivery"
            );
        }
    }

    debug!("Notification processing loop stopped");
}
