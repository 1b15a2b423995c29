// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Callback handler for computational cluster operations.

use serde_json::Value;

use super::CallbackHandler;
use crate::error::Result;
use crate::operation::OperationRequest;
use crate::status::{ComputationalStatus, OperationStatus, StatusRecord};

/// Callback destination for computational resource status records.
pub const COMPUTATIONAL_STATUS_URI: &str =
    "/api/infrastructure_provision/computational_resources/status";

/// Handler for computational cluster operations.
pub struct ComputationalHandler {
    request: OperationRequest,
}

impl ComputationalHandler {
    /// Create a handler owning the given request.
    pub fn new(request: OperationRequest) -> Self {
        Self { request }
    }
}

impl CallbackHandler for ComputationalHandler {
    fn request(&self) -> &OperationRequest {
        &self.request
    }

    fn callback_uri(&self) -> &'static str {
        COMPUTATIONAL_STATUS_URI
    }

    fn base_status(&self, status: OperationStatus) -> StatusRecord {
        StatusRecord::Computational(ComputationalStatus {
            request_id: self.request.operation_id.clone(),
            user: self.request.user.clone(),
            exploratory_name: self.request.exploratory_name.clone(),
            computational_name: self.request.computational_name.clone().unwrap_or_default(),
            notebook_instance_name: self.request.notebook_instance_name.clone(),
            status,
            error_message: None,
            uptime: chrono::Utc::now(),
        })
    }

    fn reduce(&self, result: &Value, base: StatusRecord) -> Result<StatusRecord> {
        let instance_name = result
            .get("instance_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        match base {
            StatusRecord::Computational(s) => {
                Ok(StatusRecord::Computational(ComputationalStatus {
                    notebook_instance_name: instance_name.or(s.notebook_instance_name),
                    ..s
                }))
            }
            other => Ok(other),
        }
    }
}
