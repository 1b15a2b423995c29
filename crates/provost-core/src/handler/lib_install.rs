// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Callback handler for library installation operations.
//!
//! The reduction policy here is deliberately asymmetric. A failed
//! top-level outcome stamps every requested library with the failure and
//! never looks at the result section. On the success path the result
//! section and its `libs` node are structurally required, but a `libs`
//! list that is present yet undecodable only degrades the record back to
//! its base library list - the operation still completes and the overall
//! outcome is still delivered.

use serde_json::Value;
use tracing::warn;

use super::CallbackHandler;
use crate::error::{Error, Result};
use crate::operation::OperationRequest;
use crate::status::{LibInstallStatus, LibraryStatus, OperationStatus, StatusRecord};

/// Callback destination for library install status records.
pub const LIB_STATUS_URI: &str = "/api/infrastructure_provision/library/status";

/// Name of the per-library list node inside the result section.
const LIBS_NODE: &str = "libs";

/// Capitalized spelling used by older executor images.
const LIBS_NODE_LEGACY: &str = "Libs";

/// Handler for library installation operations.
pub struct LibInstallHandler {
    request: OperationRequest,
}

impl LibInstallHandler {
    /// Create a handler owning the given request.
    pub fn new(request: OperationRequest) -> Self {
        Self { request }
    }
}

impl CallbackHandler for LibInstallHandler {
    fn request(&self) -> &OperationRequest {
        &self.request
    }

    fn callback_uri(&self) -> &'static str {
        LIB_STATUS_URI
    }

    fn base_status(&self, status: OperationStatus) -> StatusRecord {
        let libs = self
            .request
            .libraries
            .iter()
            .map(|lib| LibraryStatus {
                group: lib.group.clone(),
                name: lib.name.clone(),
                version: lib.version.clone(),
                status: status.as_str().to_string(),
                error_message: None,
            })
            .collect();

        StatusRecord::LibInstall(LibInstallStatus {
            request_id: self.request.operation_id.clone(),
            user: self.request.user.clone(),
            exploratory_name: self.request.exploratory_name.clone(),
            computational_name: self.request.computational_name.clone(),
            status,
            error_message: None,
            uptime: chrono::Utc::now(),
            libs,
        })
    }

    fn failed_record(&self, message: &str) -> StatusRecord {
        // Every requested library carries the top-level outcome and error
        // message, overriding anything the raw payload may have contained.
        match self.base_status(OperationStatus::Failed) {
            StatusRecord::LibInstall(mut status) => {
                for lib in &mut status.libs {
                    lib.error_message = Some(message.to_string());
                }
                status.error_message = Some(message.to_string());
                StatusRecord::LibInstall(status)
            }
            other => other.with_error_message(message),
        }
    }

    fn reduce(&self, result: &Value, base: StatusRecord) -> Result<StatusRecord> {
        let operation_id = &self.request.operation_id;

        // Structural absence of the libs node is a protocol violation.
        // Both spellings are accepted; older executors capitalize it.
        let Some(libs_node) = result
            .get(LIBS_NODE)
            .or_else(|| result.get(LIBS_NODE_LEGACY))
        else {
            return Err(Error::MissingResultSection {
                operation_id: operation_id.clone(),
            });
        };

        match serde_json::from_value::<Vec<LibraryStatus>>(libs_node.clone()) {
            Ok(libs) => match base {
                StatusRecord::LibInstall(status) => {
                    Ok(StatusRecord::LibInstall(LibInstallStatus { libs, ..status }))
                }
                other => Ok(other),
            },
            Err(e) => {
                let err = Error::MalformedItemPayload {
                    operation_id: operation_id.clone(),
                    details: e.to_string(),
                };
                warn!(
                    operation_id = %operation_id,
                    error = %err,
                    "Retaining base library list"
                );
                Ok(base)
            }
        }
    }
}
