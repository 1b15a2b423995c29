// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provisioning command launchers.
//!
//! Launchers start the out-of-process provisioning command for an
//! operation and return immediately; the command reports its completion
//! later through the notification intake. Launchers are pure execution
//! backends - registration and status propagation are handled by the
//! dispatcher and the engine.

mod docker;
mod mock;
mod traits;

pub use docker::DockerLauncher;
pub use mock::MockLauncher;
pub use traits::{CommandLauncher, LaunchHandle, LaunchSpec, LauncherError};
