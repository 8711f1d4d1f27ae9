// SPDX-License-Identifier: AGPL-3.0-or-later

//! Luma - Helpdesk and Monitoring Backend
//!
//! This crate provides the REST API backend for the Luma platform: user
//! accounts and groups, helpdesk tickets, monitoring agents with metric
//! ingestion and alerting, bug/debug reports, and a JWT session lifecycle
//! with refresh rotation and revocation.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token issuance, validation, revocation
//! - `storage` - Embedded persistence (redb) behind typed repositories
//! - `sweeper` - Background pruning of expired session tokens

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
pub mod sweeper;
