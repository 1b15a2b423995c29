// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provost Auth - OAuth2 Token Exchange
//!
//! Small client for the portal's identity provider: exchanges
//! authorization codes for access tokens and refreshes them, using the
//! standard OAuth2 form-encoded grants. Provider rejections stay opaque;
//! response bodies from failed exchanges are never propagated into errors.
//!
//! # Modules
//!
//! - [`client`]: Token endpoint client
//! - [`error`]: Error types for token exchange

#![deny(missing_docs)]

/// Token endpoint client.
pub mod client;

/// Error types for token exchange.
pub mod error;

pub use client::{TokenClient, TokenConfig, TokenResponse};
pub use error::AuthError;
