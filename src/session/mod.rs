// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session pagination state and its store

pub mod state;
pub mod store;

pub use state::SessionState;
pub use store::{SessionGuard, SessionStore, SessionStoreConfig};
