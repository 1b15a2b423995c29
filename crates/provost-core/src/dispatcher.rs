// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operation dispatcher.
//!
//! Validates an [`OperationRequest`], builds the kind-specific callback
//! handler, registers it, and launches the provisioning command. The
//! registration strictly precedes the launch: a completion notification can
//! never arrive for an identifier the registry does not know. A failed
//! launch rolls the registration back, leaving the registry exactly as it
//! was.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info};

use crate::error::{Error, Result};
use crate::handler::{
    CallbackHandler, ComputationalHandler, ExploratoryHandler, LibInstallHandler,
};
use crate::launcher::{CommandLauncher, LaunchHandle, LaunchSpec};
use crate::operation::{OperationRequest, ResourceKind};
use crate::request_registry::RequestRegistry;

/// Dispatches provisioning operations.
pub struct Dispatcher {
    registry: Arc<RequestRegistry>,
    launcher: Arc<dyn CommandLauncher>,
    image_prefix: String,
}

impl Dispatcher {
    /// Create a dispatcher over the given registry and launcher.
    pub fn new(
        registry: Arc<RequestRegistry>,
        launcher: Arc<dyn CommandLauncher>,
        image_prefix: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            launcher,
            image_prefix: image_prefix.into(),
        }
    }

    /// Dispatch one operation: validate, register, launch.
    ///
    /// On success the operation is in flight and its handler is registered
    /// under `request.operation_id`. On any error nothing is registered.
    pub async fn dispatch(&self, request: OperationRequest) -> Result<LaunchHandle> {
        validate(&request)?;

        let operation_id = request.operation_id.clone();
        let spec = self.launch_spec(&request)?;
        let handler = build_handler(request);

        // Register first so the notification window opens before the
        // command can possibly complete.
        self.registry.register(handler)?;

        match self.launcher.launch(&spec).await {
            Ok(handle) => {
                info!(
                    operation_id = %operation_id,
                    launcher = self.launcher.launcher_type(),
                    image = %spec.image,
                    action = %spec.action,
                    "Dispatched provisioning command"
                );
                Ok(handle)
            }
            Err(e) => {
                // Roll back so the identifier is not left dangling.
                self.registry.deregister(&operation_id);
                error!(
                    operation_id = %operation_id,
                    error = %e,
                    "Provisioning command launch failed"
                );
                Err(Error::Launcher(e))
            }
        }
    }

    fn launch_spec(&self, request: &OperationRequest) -> Result<LaunchSpec> {
        let mut env = HashMap::new();
        env.insert("OPERATION_ID".to_string(), request.operation_id.clone());
        env.insert("CONF_USER".to_string(), request.user.clone());
        env.insert("CONF_ACTION".to_string(), request.action.as_str().to_string());
        env.insert(
            "EXPLORATORY_NAME".to_string(),
            request.exploratory_name.clone(),
        );
        if let Some(name) = &request.computational_name {
            env.insert("COMPUTATIONAL_NAME".to_string(), name.clone());
        }
        // The installer command reads the requested library set from LIBS.
        if !request.libraries.is_empty() {
            env.insert("LIBS".to_string(), serde_json::to_string(&request.libraries)?);
        }

        Ok(LaunchSpec {
            operation_id: request.operation_id.clone(),
            user: request.user.clone(),
            kind: request.kind,
            action: request.action,
            image: format!("{}-{}", self.image_prefix, request.kind.as_str()),
            env,
        })
    }
}

/// Build the callback handler for the request's resource kind.
fn build_handler(request: OperationRequest) -> Arc<dyn CallbackHandler> {
    match request.kind {
        ResourceKind::Exploratory => Arc::new(ExploratoryHandler::new(request)),
        ResourceKind::Computational => Arc::new(ComputationalHandler::new(request)),
        ResourceKind::LibraryInstall => Arc::new(LibInstallHandler::new(request)),
    }
}

fn validate(request: &OperationRequest) -> Result<()> {
    if request.operation_id.trim().is_empty() {
        return Err(Error::InvalidRequest(
            "operation identifier must not be empty".to_string(),
        ));
    }
    if request.user.trim().is_empty() {
        return Err(Error::InvalidRequest("user must not be empty".to_string()));
    }
    if request.exploratory_name.trim().is_empty() {
        return Err(Error::InvalidRequest(
            "exploratory name must not be empty".to_string(),
        ));
    }
    match request.kind {
        ResourceKind::Computational if request.computational_name.is_none() => {
            Err(Error::InvalidRequest(
                "computational operations require a computational name".to_string(),
            ))
        }
        ResourceKind::LibraryInstall if request.libraries.is_empty() => Err(Error::InvalidRequest(
            "library install operations require at least one library".to_string(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::MockLauncher;
    use crate::operation::{Action, LibraryRequest};

    fn dispatcher(launcher: Arc<MockLauncher>) -> (Dispatcher, Arc<RequestRegistry>) {
        let registry = Arc::new(RequestRegistry::new());
        (
            Dispatcher::new(registry.clone(), launcher, "provost"),
            registry,
        )
    }

    fn request() -> OperationRequest {
        OperationRequest::new("alice", ResourceKind::Exploratory, Action::Create, "nb-1")
            .with_operation_id("op-1")
    }

    #[tokio::test]
    async fn test_dispatch_registers_then_launches() {
        let launcher = Arc::new(MockLauncher::new());
        let (dispatcher, registry) = dispatcher(launcher.clone());

        let handle = dispatcher.dispatch(request()).await.unwrap();

        assert_eq!(handle.operation_id, "op-1");
        assert!(registry.resolve("op-1").is_some());

        let launches = launcher.launches().await;
        assert_eq!(launches.len(), 1);
        assert_eq!(launches[0].image, "provost-exploratory");
        assert_eq!(launches[0].env.get("OPERATION_ID").unwrap(), "op-1");
        assert_eq!(launches[0].env.get("CONF_ACTION").unwrap(), "create");
    }

    #[tokio::test]
    async fn test_failed_launch_rolls_back_registration() {
        let launcher = Arc::new(MockLauncher::failing());
        let (dispatcher, registry) = dispatcher(launcher.clone());

        let err = dispatcher.dispatch(request()).await.unwrap_err();

        assert!(matches!(err, Error::Launcher(_)));
        // The launch was attempted but no registration survives
        assert_eq!(launcher.launches().await.len(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_operation_id_is_rejected_without_launch() {
        let launcher = Arc::new(MockLauncher::new());
        let (dispatcher, _registry) = dispatcher(launcher.clone());

        dispatcher.dispatch(request()).await.unwrap();
        let err = dispatcher.dispatch(request()).await.unwrap_err();

        assert!(matches!(err, Error::DuplicateOperation { .. }));
        // Only the first dispatch reached the launcher
        assert_eq!(launcher.launches().await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_requests_never_register_or_launch() {
        let launcher = Arc::new(MockLauncher::new());
        let (dispatcher, registry) = dispatcher(launcher.clone());

        let missing_user =
            OperationRequest::new("", ResourceKind::Exploratory, Action::Create, "nb-1");
        let missing_cluster =
            OperationRequest::new("bob", ResourceKind::Computational, Action::Create, "nb-1");
        let empty_libs = OperationRequest::new(
            "bob",
            ResourceKind::LibraryInstall,
            Action::InstallLibraries,
            "nb-1",
        );

        for request in [missing_user, missing_cluster, empty_libs] {
            let err = dispatcher.dispatch(request).await.unwrap_err();
            assert!(matches!(err, Error::InvalidRequest(_)));
        }

        assert!(registry.is_empty());
        assert!(launcher.launches().await.is_empty());
    }

    #[tokio::test]
    async fn test_library_install_dispatch_builds_lib_handler() {
        let launcher = Arc::new(MockLauncher::new());
        let (dispatcher, registry) = dispatcher(launcher.clone());

        let request = OperationRequest::new(
            "alice",
            ResourceKind::LibraryInstall,
            Action::InstallLibraries,
            "nb-1",
        )
        .with_operation_id("op-lib")
        .with_libraries(vec![LibraryRequest::new("pip3", "numpy")]);

        dispatcher.dispatch(request).await.unwrap();

        let handler = registry.resolve("op-lib").unwrap();
        assert_eq!(
            handler.callback_uri(),
            "/api/infrastructure_provision/library/status"
        );
        assert_eq!(
            launcher.launches().await[0].image,
            "provost-library_install"
        );
    }

    #[tokio::test]
    async fn test_library_list_is_passed_to_the_command() {
        let launcher = Arc::new(MockLauncher::new());
        let (dispatcher, _registry) = dispatcher(launcher.clone());

        let libraries = vec![
            LibraryRequest::new("pip3", "numpy").with_version("1.2"),
            LibraryRequest::new("pip3", "pandas"),
        ];
        let request = OperationRequest::new(
            "alice",
            ResourceKind::LibraryInstall,
            Action::InstallLibraries,
            "nb-1",
        )
        .with_operation_id("op-libs")
        .with_libraries(libraries.clone());

        dispatcher.dispatch(request).await.unwrap();

        let launches = launcher.launches().await;
        let decoded: Vec<LibraryRequest> =
            serde_json::from_str(launches[0].env.get("LIBS").expect("LIBS env")).unwrap();
        assert_eq!(decoded, libraries);
    }
}
