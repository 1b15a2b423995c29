// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Canonical status records delivered to the upstream orchestrator.
//!
//! A [`StatusRecord`] is the only artifact that crosses the system boundary
//! outward: exactly one per dispatched operation, serialized with the field
//! names the self-service API expects (`exploratory_name`,
//! `computational_name`, `notebook_instance_name`, ...). The wire names
//! must be preserved exactly for compatibility.
//!
//! Records are built value-style: `with_*` methods consume the record and
//! return a new one, so a base record can be reused for failure-path
//! short-circuiting without mutating shared state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome status of an operation, as reported upstream.
///
/// Kind-specific subsets apply: exploratory and computational resources
/// move between `running`, `stopped` and `terminated`, library installs end
/// in `installed` or `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Operation dispatched, no notification yet.
    Pending,
    /// Resource is being created.
    Creating,
    /// Resource is up and running.
    Running,
    /// Resource is stopped.
    Stopped,
    /// Resource was terminated.
    Terminated,
    /// Libraries were installed.
    Installed,
    /// Operation failed.
    Failed,
}

impl OperationStatus {
    /// Stable string form matching the wire encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Creating => "creating",
            OperationStatus::Running => "running",
            OperationStatus::Stopped => "stopped",
            OperationStatus::Terminated => "terminated",
            OperationStatus::Installed => "installed",
            OperationStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-library install outcome.
///
/// Field values are copied verbatim from the executor's result section on
/// the success path; on a failed top-level outcome every entry is stamped
/// with the top-level status and error message instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryStatus {
    /// Library group (e.g. `pip3`, `os_pkg`).
    pub group: String,
    /// Library name.
    pub name: String,
    /// Installed or requested version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Install status string as reported by the executor.
    pub status: String,
    /// Error message for this library, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Status of an exploratory (notebook) environment operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExploratoryStatus {
    /// Operation identifier this record answers.
    pub request_id: String,
    /// Requesting user.
    pub user: String,
    /// Exploratory environment name.
    pub exploratory_name: String,
    /// Cloud instance name of the notebook, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notebook_instance_name: Option<String>,
    /// Outcome status.
    pub status: OperationStatus,
    /// Error message, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Timestamp captured when the record was constructed.
    pub uptime: DateTime<Utc>,
}

/// Status of a computational cluster operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputationalStatus {
    /// Operation identifier this record answers.
    pub request_id: String,
    /// Requesting user.
    pub user: String,
    /// Exploratory environment the cluster is attached to.
    pub exploratory_name: String,
    /// Computational resource name.
    pub computational_name: String,
    /// Cloud instance name of the notebook the cluster attaches to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notebook_instance_name: Option<String>,
    /// Outcome status.
    pub status: OperationStatus,
    /// Error message, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Timestamp captured when the record was constructed.
    pub uptime: DateTime<Utc>,
}

/// Status of a library installation operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibInstallStatus {
    /// Operation identifier this record answers.
    pub request_id: String,
    /// Requesting user.
    pub user: String,
    /// Exploratory environment the libraries target.
    pub exploratory_name: String,
    /// Computational resource, when installing into a cluster.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computational_name: Option<String>,
    /// Outcome status.
    pub status: OperationStatus,
    /// Error message, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Timestamp captured when the record was constructed.
    pub uptime: DateTime<Utc>,
    /// Per-library install outcomes, ordered as requested.
    pub libs: Vec<LibraryStatus>,
}

/// Canonical, resource-kind-typed result of one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatusRecord {
    /// Exploratory environment status.
    Exploratory(ExploratoryStatus),
    /// Computational cluster status.
    Computational(ComputationalStatus),
    /// Library installation status.
    LibInstall(LibInstallStatus),
}

impl StatusRecord {
    /// The operation identifier this record answers.
    pub fn request_id(&self) -> &str {
        match self {
            StatusRecord::Exploratory(s) => &s.request_id,
            StatusRecord::Computational(s) => &s.request_id,
            StatusRecord::LibInstall(s) => &s.request_id,
        }
    }

    /// The outcome status carried by this record.
    pub fn status(&self) -> OperationStatus {
        match self {
            StatusRecord::Exploratory(s) => s.status,
            StatusRecord::Computational(s) => s.status,
            StatusRecord::LibInstall(s) => s.status,
        }
    }

    /// The error message carried by this record, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            StatusRecord::Exploratory(s) => s.error_message.as_deref(),
            StatusRecord::Computational(s) => s.error_message.as_deref(),
            StatusRecord::LibInstall(s) => s.error_message.as_deref(),
        }
    }

    /// Return a new record with the given status.
    pub fn with_status(self, status: OperationStatus) -> Self {
        match self {
            StatusRecord::Exploratory(s) => {
                StatusRecord::Exploratory(ExploratoryStatus { status, ..s })
            }
            StatusRecord::Computational(s) => {
                StatusRecord::Computational(ComputationalStatus { status, ..s })
            }
            StatusRecord::LibInstall(s) => StatusRecord::LibInstall(LibInstallStatus { status, ..s }),
        }
    }

    /// Return a new record with the given error message.
    pub fn with_error_message(self, message: impl Into<String>) -> Self {
        let message = Some(message.into());
        match self {
            StatusRecord::Exploratory(s) => StatusRecord::Exploratory(ExploratoryStatus {
                error_message: message,
                ..s
            }),
            StatusRecord::Computational(s) => StatusRecord::Computational(ComputationalStatus {
                error_message: message,
                ..s
            }),
            StatusRecord::LibInstall(s) => StatusRecord::LibInstall(LibInstallStatus {
                error_message: message,
                ..s
            }),
        }
    }
}
