// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request registry.
//!
//! Concurrent map from operation identifier to the callback handler owning
//! that operation. The registry is the single source of truth for "is this
//! operation still pending" and the only shared mutable structure in the
//! engine; handlers themselves are operation-scoped and never shared across
//! operations.
//!
//! [`RequestRegistry::take`] is the claim operation used by notification
//! processing: it resolves and deregisters in one atomic map operation, so
//! at most one notification can ever drive a handler past resolution. A
//! second notification for the same identifier observes an unknown
//! operation and is discarded by the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::handler::CallbackHandler;

/// A registered in-flight operation.
struct RegisteredOperation {
    handler: Arc<dyn CallbackHandler>,
    registered_at: DateTime<Utc>,
}

/// Concurrent registry of in-flight operations.
#[derive(Default)]
pub struct RequestRegistry {
    operations: DashMap<String, RegisteredOperation>,
}

impl RequestRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            operations: DashMap::new(),
        }
    }

    /// Register a handler under its operation identifier.
    ///
    /// Must be called before the provisioning command is issued, so a
    /// completion notification can never arrive for an unregistered
    /// identifier. Registering an identifier twice is a protocol error and
    /// is rejected without touching the existing entry.
    pub fn register(&self, handler: Arc<dyn CallbackHandler>) -> Result<()> {
        let operation_id = handler.request().operation_id.clone();

        match self.operations.entry(operation_id.clone()) {
            Entry::Occupied(_) => {
                warn!(
                    operation_id = %operation_id,
                    "Rejected duplicate registration"
                );
                Err(Error::DuplicateOperation { operation_id })
            }
            Entry::Vacant(entry) => {
                entry.insert(RegisteredOperation {
                    handler,
                    registered_at: Utc::now(),
                });
                debug!(operation_id = %operation_id, "Registered operation");
                Ok(())
            }
        }
    }

    /// Look up the handler for an identifier without consuming the entry.
    ///
    /// Returns `None` for unknown identifiers; late or duplicate
    /// notifications are discardable by the caller, never an error here.
    pub fn resolve(&self, operation_id: &str) -> Option<Arc<dyn CallbackHandler>> {
        self.operations
            .get(operation_id)
            .map(|entry| entry.handler.clone())
    }

    /// Atomically claim the handler for an identifier, removing the entry.
    ///
    /// Exactly one caller can win the claim for a given identifier; every
    /// later call returns `None`.
    pub fn take(&self, operation_id: &str) -> Option<Arc<dyn CallbackHandler>> {
        let claimed = self
            .operations
            .remove(operation_id)
            .map(|(_, op)| op.handler);
        if claimed.is_some() {
            debug!(operation_id = %operation_id, "Claimed operation");
        }
        claimed
    }

    /// Remove an entry. Idempotent; returns whether an entry was removed.
    pub fn deregister(&self, operation_id: &str) -> bool {
        let removed = self.operations.remove(operation_id).is_some();
        if removed {
            debug!(operation_id = %operation_id, "Deregistered operation");
        }
        removed
    }

    /// Identifiers of operations registered before the cutoff.
    ///
    /// Used by the timeout monitor to force-expire operations still
    /// awaiting a notification.
    pub fn registered_before(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.operations
            .iter()
            .filter(|entry| entry.registered_at < cutoff)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of in-flight operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether no operations are in flight.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ExploratoryHandler;
    use crate::operation::{Action, OperationRequest, ResourceKind};

    fn handler(operation_id: &str) -> Arc<dyn CallbackHandler> {
        let request =
            OperationRequest::new("alice", ResourceKind::Exploratory, Action::Create, "nb-1")
                .with_operation_id(operation_id);
        Arc::new(ExploratoryHandler::new(request))
    }

    #[test]
    fn test_register_then_resolve_returns_same_handler() {
        let registry = RequestRegistry::new();
        let h = handler("op-1");

        registry.register(h.clone()).unwrap();

        let resolved = registry.resolve("op-1").expect("should resolve");
        assert!(Arc::ptr_eq(&resolved, &h));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let registry = RequestRegistry::new();
        registry.register(handler("op-1")).unwrap();

        let err = registry.register(handler("op-1")).unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateOperation { operation_id } if operation_id == "op-1"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_take_claims_exactly_once() {
        let registry = RequestRegistry::new();
        registry.register(handler("op-1")).unwrap();

        assert!(registry.take("op-1").is_some());
        assert!(registry.take("op-1").is_none());
        assert!(registry.resolve("op-1").is_none());
    }

    #[test]
    fn test_resolve_unknown_returns_none() {
        let registry = RequestRegistry::new();
        assert!(registry.resolve("nope").is_none());
    }

    #[test]
    fn test_deregister_is_idempotent() {
        let registry = RequestRegistry::new();
        registry.register(handler("op-1")).unwrap();

        assert!(registry.deregister("op-1"));
        assert!(!registry.deregister("op-1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registered_before_finds_old_entries() {
        let registry = RequestRegistry::new();
        registry.register(handler("op-1")).unwrap();

        let future = Utc::now() + chrono::Duration::seconds(60);
        let past = Utc::now() - chrono::Duration::seconds(60);

        assert_eq!(registry.registered_before(future), vec!["op-1".to_string()]);
        assert!(registry.registered_before(past).is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_takes_yield_single_winner() {
        let registry = Arc::new(RequestRegistry::new());
        registry.register(handler("op-race")).unwrap();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.take("op-race").is_some()
            }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
