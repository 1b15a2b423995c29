// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Callback handler for exploratory (notebook) environment operations.

use serde_json::Value;

use super::CallbackHandler;
use crate::error::Result;
use crate::operation::OperationRequest;
use crate::status::{ExploratoryStatus, OperationStatus, StatusRecord};

/// Callback destination for exploratory environment status records.
pub const EXPLORATORY_STATUS_URI: &str =
    "/api/infrastructure_provision/exploratory_environment/status";

/// Handler for exploratory environment operations.
pub struct ExploratoryHandler {
    request: OperationRequest,
}

impl ExploratoryHandler {
    /// Create a handler owning the given request.
    pub fn new(request: OperationRequest) -> Self {
        Self { request }
    }
}

impl CallbackHandler for ExploratoryHandler {
    fn request(&self) -> &OperationRequest {
        &self.request
    }

    fn callback_uri(&self) -> &'static str {
        EXPLORATORY_STATUS_URI
    }

    fn base_status(&self, status: OperationStatus) -> StatusRecord {
        StatusRecord::Exploratory(ExploratoryStatus {
            request_id: self.request.operation_id.clone(),
            user: self.request.user.clone(),
            exploratory_name: self.request.exploratory_name.clone(),
            notebook_instance_name: self.request.notebook_instance_name.clone(),
            status,
            error_message: None,
            uptime: chrono::Utc::now(),
        })
    }

    fn reduce(&self, result: &Value, base: StatusRecord) -> Result<StatusRecord> {
        // The executor reports the cloud instance name once the notebook
        // exists; absence is tolerated (e.g. terminate results).
        let instance_name = result
            .get("instance_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        match base {
            StatusRecord::Exploratory(s) => Ok(StatusRecord::Exploratory(ExploratoryStatus {
                notebook_instance_name: instance_name.or(s.notebook_instance_name),
                ..s
            })),
            other => Ok(other),
        }
    }
}
