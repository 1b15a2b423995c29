// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provost Core - Operation Correlation and Status Propagation
//!
//! This crate is the provisioning engine of the self-service notebook
//! portal. It dispatches long-running provisioning commands, correlates
//! their out-of-band completion notifications by operation identifier, and
//! propagates canonical status records back to the self-service API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Self-Service Portal                               │
//! │                  (operation requests, status callbacks)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//!            │ dispatch                                    ▲ POST status
//!            ▼                                             │
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     provost-core (This Crate)                            │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐     │
//! │  │  Dispatcher │  │   Request   │  │  Callback   │  │  Forwarder  │     │
//! │  │             │  │   Registry  │  │  Handlers   │  │    Pool     │     │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  └─────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//!            │ launch                                      ▲ notify
//!            ▼                                             │
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Provisioning Commands                                │
//! │                  (detached docker containers)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Operation Flow
//!
//! 1. The dispatcher validates the request, registers a kind-specific
//!    callback handler under the operation identifier, then launches the
//!    provisioning command detached. Registration strictly precedes the
//!    launch.
//! 2. The command eventually reports completion out-of-band; the
//!    notification carries the operation identifier and a result envelope.
//! 3. The processing loop atomically claims the handler for that
//!    identifier. Duplicate and unknown identifiers find no entry and are
//!    discarded, so each operation resolves exactly once.
//! 4. The handler reduces the envelope into the canonical status record
//!    for its resource kind; every malformed input degrades into a
//!    terminal failed record rather than a lost operation.
//! 5. The forwarder pool delivers the record to the kind's callback
//!    destination on the self-service API.
//!
//! # Operation Status
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `pending` | Dispatched, awaiting completion notification |
//! | `creating` | Resource creation reported in progress |
//! | `running` | Create/configure/start completed successfully |
//! | `stopped` | Stop completed successfully |
//! | `terminated` | Terminate completed successfully |
//! | `installed` | Library installation completed successfully |
//! | `failed` | Command failed, protocol violation, or timeout |
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `PROVOST_SELF_SERVICE_URL` | Yes | - | Base URL for status callbacks |
//! | `PROVOST_IMAGE_PREFIX` | No | `provost` | Image name prefix for commands |
//! | `PROVOST_FORWARDER_WORKERS` | No | `4` | Concurrent callback deliveries |
//! | `PROVOST_DELIVERY_ATTEMPTS` | No | `1` | Delivery attempts per record |
//! | `PROVOST_DELIVERY_TIMEOUT_SECS` | No | `30` | Timeout per callback request |
//! | `PROVOST_QUEUE_CAPACITY` | No | `256` | Notification/delivery queue size |
//! | `PROVOST_OPERATION_TIMEOUT_SECS` | No | `7200` | Force-fail age, `0` disables |
//! | `PROVOST_TIMEOUT_POLL_SECS` | No | `60` | Timeout monitor scan interval |
//!
//! # Modules
//!
//! - [`config`]: Engine configuration from environment variables
//! - [`dispatcher`]: Request validation, registration, command launch
//! - [`envelope`]: Completion notification payloads
//! - [`error`]: Error types for engine operations
//! - [`forwarder`]: Worker pool delivering status records
//! - [`handler`]: Callback handlers, one per resource kind
//! - [`launcher`]: Command execution backends (docker, mock)
//! - [`operation`]: Operation requests and resource kinds
//! - [`request_registry`]: Concurrent registry of in-flight operations
//! - [`runtime`]: Embeddable provisioning engine
//! - [`status`]: Canonical status records and wire formats
//! - [`timeout_monitor`]: Background expiry of operations without notification

#![deny(missing_docs)]

/// Engine configuration loaded from environment variables.
pub mod config;

/// Request validation, handler registration, and command launch.
pub mod dispatcher;

/// Completion notification payloads.
pub mod envelope;

/// Error types for engine operations.
pub mod error;

/// Worker pool delivering status records to callback destinations.
pub mod forwarder;

/// Callback handlers, one per resource kind.
pub mod handler;

/// Command execution backends (docker, mock).
pub mod launcher;

/// Operation requests and resource kinds.
pub mod operation;

/// Concurrent registry of in-flight operations.
pub mod request_registry;

/// Embeddable provisioning engine.
pub mod runtime;

/// Canonical status records and their wire formats.
pub mod status;

/// Background expiry of operations whose notification never arrived.
pub mod timeout_monitor;

pub use config::Config;
pub use error::{Error, Result};
pub use operation::{Action, LibraryRequest, OperationRequest, ResourceKind};
pub use runtime::ProvisioningEngine;
pub use status::{OperationStatus, StatusRecord};
