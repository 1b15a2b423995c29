// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Callback handlers, one per resource kind.
//!
//! A handler owns the context of one in-flight operation: the original
//! [`OperationRequest`](crate::operation::OperationRequest) plus the policy
//! for turning a completion notification into the canonical status record
//! for that resource kind. The kind-specific pieces are the callback
//! destination, the base record shape, and the reduction of the result
//! section; the orchestration in [`CallbackHandler::handle`] is shared.
//!
//! `handle` never leaves an operation unresolved: a failed outcome
//! short-circuits into a stamped failure record without touching the
//! result section, a missing result section is a protocol violation that
//! is converted into a terminal failed record, and any reduction error is
//! converted the same way. Whatever happens, exactly one record comes out
//! and is handed to the forwarder by the caller.

mod computational;
mod exploratory;
mod lib_install;

pub use computational::ComputationalHandler;
pub use exploratory::ExploratoryHandler;
pub use lib_install::LibInstallHandler;

use serde_json::Value;
use tracing::{error, warn};

use crate::envelope::{Outcome, ResultEnvelope};
use crate::error::{Error, Result};
use crate::operation::{Action, OperationRequest};
use crate::status::{OperationStatus, StatusRecord};

/// Policy and context for one in-flight operation, per resource kind.
pub trait CallbackHandler: Send + Sync {
    /// The request this handler was created for.
    fn request(&self) -> &OperationRequest;

    /// Callback destination path for this resource kind, relative to the
    /// self-service base URL. Fixed per kind.
    fn callback_uri(&self) -> &'static str;

    /// Build a record pre-populated with the operation's identifiers and a
    /// timestamp captured now, carrying the given outcome status.
    fn base_status(&self, status: OperationStatus) -> StatusRecord;

    /// Kind-specific reduction of the result section into the record.
    ///
    /// Structural violations (required nodes absent) are errors; content
    /// decode problems are resolved internally by degrading to the base
    /// record.
    fn reduce(&self, result: &Value, base: StatusRecord) -> Result<StatusRecord>;

    /// The status a successful completion maps to, derived from the action.
    fn success_status(&self) -> OperationStatus {
        match self.request().action {
            Action::Create | Action::Configure | Action::Start => OperationStatus::Running,
            Action::Stop => OperationStatus::Stopped,
            Action::Terminate => OperationStatus::Terminated,
            Action::InstallLibraries => OperationStatus::Installed,
        }
    }

    /// Terminal failed record for this operation.
    ///
    /// Kinds with per-item payloads override this to stamp every item with
    /// the failure as well.
    fn failed_record(&self, message: &str) -> StatusRecord {
        self.base_status(OperationStatus::Failed)
            .with_error_message(message)
    }

    /// Turn a completion notification into the terminal status record for
    /// this operation.
    ///
    /// Infallible by design: every internal error becomes a terminal
    /// failed record, so the upstream orchestrator always receives a
    /// result for the operation it was promised.
    fn handle(&self, envelope: &ResultEnvelope) -> StatusRecord {
        let operation_id = &self.request().operation_id;

        let outcome = match envelope.outcome() {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    operation_id = %operation_id,
                    error = %e,
                    "Notification outcome could not be determined"
                );
                return self.failed_record(&e.to_string());
            }
        };

        match outcome {
            // Short-circuit: the result section is not even parsed.
            Outcome::Failed => self.failed_record(envelope.error_message()),
            Outcome::Success => {
                let Some(result) = envelope.result.as_ref() else {
                    let err = Error::MissingResultSection {
                        operation_id: operation_id.clone(),
                    };
                    error!(
                        operation_id = %operation_id,
                        error = %err,
                        "Protocol violation in completion notification"
                    );
                    return self.failed_record(&err.to_string());
                };

                let base = self.base_status(self.success_status());
                match self.reduce(result, base) {
                    Ok(record) => record,
                    Err(e) => {
                        error!(
                            operation_id = %operation_id,
                            error = %e,
                            "Failed to reduce notification result"
                        );
                        self.failed_record(&e.to_string())
                    }
                }
            }
        }
    }
}
