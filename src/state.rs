// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;

use crate::auth::{ValidationCache, TokenService};
use crate::storage::Db;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub tokens: Arc<TokenService>,
    pub validation_cache: Arc<ValidationCache>,
    /// Whether internal error detail is exposed in responses
    pub development: bool,
}

impl AppState {
    pub fn new(db: Arc<Db>, tokens: Arc<TokenService>, validation_cache: Arc<ValidationCache>) -> Self {
        Self {
            db,
            tokens,
            validation_cache,
            development: false,
        }
    }

    pub fn with_development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }
}
