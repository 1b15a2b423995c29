// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operation requests and resource kinds.
//!
//! An [`OperationRequest`] describes one provisioning command from the
//! portal's point of view: who asked for it, what kind of resource it
//! targets, and which action the out-of-process command performs. It is
//! created when the command is dispatched, is immutable afterwards, and is
//! owned exclusively by the callback handler for that operation until the
//! completion notification arrives.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action performed by the provisioning command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Create a new resource.
    Create,
    /// Reconfigure an existing resource.
    Configure,
    /// Start a stopped resource.
    Start,
    /// Stop a running resource.
    Stop,
    /// Terminate a resource permanently.
    Terminate,
    /// Install libraries into an existing environment.
    InstallLibraries,
}

impl Action {
    /// Stable string form used in command environment and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Configure => "configure",
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Terminate => "terminate",
            Action::InstallLibraries => "install_libraries",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of provisioned entity, selecting the callback handler,
/// the reduction policy, and the callback destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Exploratory (notebook) environment.
    Exploratory,
    /// Computational cluster attached to an exploratory environment.
    Computational,
    /// Library installation into an existing environment.
    LibraryInstall,
}

impl ResourceKind {
    /// Stable string form used in image names and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Exploratory => "exploratory",
            ResourceKind::Computational => "computational",
            ResourceKind::LibraryInstall => "library_install",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One library requested for installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryRequest {
    /// Library group (e.g. `pip3`, `os_pkg`).
    pub group: String,
    /// Library name.
    pub name: String,
    /// Requested version, if pinned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl LibraryRequest {
    /// Create a library request without a pinned version.
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: None,
        }
    }

    /// Pin the requested version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// One in-flight provisioning operation.
///
/// The `operation_id` is the opaque identifier correlating the dispatched
/// command with its eventual completion notification.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    /// Opaque identifier, unique per in-flight operation.
    pub operation_id: String,
    /// Requesting user.
    pub user: String,
    /// Resource kind this operation targets.
    pub kind: ResourceKind,
    /// Action performed by the command.
    pub action: Action,
    /// Name of the exploratory environment this operation belongs to.
    pub exploratory_name: String,
    /// Name of the computational resource, for computational operations
    /// and library installs targeting a cluster.
    pub computational_name: Option<String>,
    /// Cloud instance name of the notebook, when already known.
    pub notebook_instance_name: Option<String>,
    /// Libraries to install, for [`ResourceKind::LibraryInstall`].
    pub libraries: Vec<LibraryRequest>,
}

impl OperationRequest {
    /// Create a request with a freshly minted operation identifier.
    pub fn new(
        user: impl Into<String>,
        kind: ResourceKind,
        action: Action,
        exploratory_name: impl Into<String>,
    ) -> Self {
        Self {
            operation_id: Uuid::new_v4().to_string(),
            user: user.into(),
            kind,
            action,
            exploratory_name: exploratory_name.into(),
            computational_name: None,
            notebook_instance_name: None,
            libraries: Vec::new(),
        }
    }

    /// Override the minted operation identifier (e.g. when the identifier
    /// was issued by the operations layer).
    pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = operation_id.into();
        self
    }

    /// Set the computational resource name.
    pub fn with_computational_name(mut self, name: impl Into<String>) -> Self {
        self.computational_name = Some(name.into());
        self
    }

    /// Set the cloud instance name of the notebook.
    pub fn with_notebook_instance_name(mut self, name: impl Into<String>) -> Self {
        self.notebook_instance_name = Some(name.into());
        self
    }

    /// Set the libraries to install.
    pub fn with_libraries(mut self, libraries: Vec<LibraryRequest>) -> Self {
        self.libraries = libraries;
        self
    }
}
