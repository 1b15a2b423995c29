// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Status record forwarder.
//!
//! Delivers terminal status records to the upstream orchestrator's
//! callback endpoints. Deliveries run on a fixed-size worker pool fed by a
//! bounded queue, sized independently of notification intake, so one slow
//! callback destination cannot stall unrelated notification processing.
//!
//! The forwarder attempts each delivery the configured number of times
//! (default: once - retrying is a deployment decision, not fixed here) and
//! reports transport failures as [`Error::Transport`], distinct from parse
//! errors. Exactly-once semantics per operation are the caller's
//! responsibility: the registry's atomic claim guarantees each record is
//! enqueued at most once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::status::StatusRecord;

/// One status record queued for delivery.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Operation the record answers.
    pub operation_id: String,
    /// Absolute callback destination URL.
    pub destination: String,
    /// The record to deliver.
    pub record: StatusRecord,
}

/// Forwarder configuration.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Number of delivery workers.
    pub workers: usize,
    /// Capacity of the delivery queue.
    pub queue_capacity: usize,
    /// Delivery attempts per record (1 = no retry).
    pub delivery_attempts: u32,
    /// Timeout for one outbound callback request.
    pub request_timeout: Duration,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
            delivery_attempts: 1,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Worker pool delivering status records to callback destinations.
pub struct Forwarder {
    tx: mpsc::Sender<Delivery>,
    workers: Vec<JoinHandle<()>>,
}

/// Cloneable handle for enqueueing deliveries.
#[derive(Clone)]
pub struct ForwarderHandle {
    tx: mpsc::Sender<Delivery>,
}

impl Forwarder {
    /// Start the worker pool. Must be called from within a Tokio runtime.
    ///
    /// Fails when the outbound HTTP client cannot be constructed with the
    /// configured delivery timeout.
    pub fn start(config: ForwarderConfig) -> Result<Self> {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let worker_count = config.workers.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            workers.push(tokio::spawn(worker_loop(
                worker_id,
                rx.clone(),
                client.clone(),
                config.delivery_attempts.max(1),
            )));
        }

        info!(
            workers = worker_count,
            queue_capacity = config.queue_capacity,
            delivery_attempts = config.delivery_attempts,
            "Forwarder started"
        );

        Ok(Self { tx, workers })
    }

    /// Handle for enqueueing deliveries.
    pub fn handle(&self) -> ForwarderHandle {
        ForwarderHandle {
            tx: self.tx.clone(),
        }
    }

    /// Drain the queue and stop all workers.
    pub async fn shutdown(self) {
        drop(self.tx);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Forwarder worker task panicked");
            }
        }
        info!("Forwarder stopped");
    }
}

impl ForwarderHandle {
    /// Enqueue one record for delivery.
    ///
    /// Fails only when the forwarder has shut down.
    pub async fn deliver(&self, delivery: Delivery) -> Result<()> {
        let destination = delivery.destination.clone();
        self.tx
            .send(delivery)
            .await
            .map_err(|_| Error::Transport {
                destination,
                details: "forwarder is shut down".to_string(),
            })
    }
}

/// Join a callback path onto the self-service base URL.
pub fn callback_destination(base_url: &str, callback_uri: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), callback_uri)
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<Delivery>>>,
    client: reqwest::Client,
    attempts: u32,
) {
    debug!(worker_id = worker_id, "Forwarder worker started");

    loop {
        // Hold the lock only while waiting for the next delivery; the
        // delivery itself runs unlocked so workers proceed independently.
        let delivery = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };

        let Some(delivery) = delivery else {
            break;
        };

        if let Err(e) = deliver_with_retry(&client, &delivery, attempts).await {
            error!(
                operation_id = %delivery.operation_id,
                destination = %delivery.destination,
                error = %e,
                "Giving up on status record delivery"
            );
        }
    }

    debug!(worker_id = worker_id, "Forwarder worker stopped");
}

async fn deliver_with_retry(
    client: &reqwest::Client,
    delivery: &Delivery,
    attempts: u32,
) -> Result<()> {
    let mut last_error = None;

    for attempt in 1..=attempts {
        match deliver_once(client, delivery).await {
            Ok(()) => {
                debug!(
                    operation_id = %delivery.operation_id,
                    destination = %delivery.destination,
                    attempt = attempt,
                    "Delivered status record"
                );
                return Ok(());
            }
            Err(e) => {
                warn!(
                    operation_id = %delivery.operation_id,
                    destination = %delivery.destination,
                    attempt = attempt,
                    error = %e,
                    "Status record delivery attempt failed"
                );
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Transport {
        destination: delivery.destination.clone(),
        details: "no delivery attempt was made".to_string(),
    }))
}

async fn deliver_once(client: &reqwest::Client, delivery: &Delivery) -> Result<()> {
    let response = client
        .post(&delivery.destination)
        .json(&delivery.record)
        .send()
        .await
        .map_err(|e| Error::Transport {
            destination: delivery.destination.clone(),
            details: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(Error::Transport {
            destination: delivery.destination.clone(),
            details: format!("callback endpoint returned HTTP {}", response.status()),
        });
    }

    Ok(())
}
