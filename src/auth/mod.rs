// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Authentication Module
//!
//! Session authentication for the LUMA API.
//!
//! ## Auth Flow
//!
//! 1. Client logs in with handle + password (Argon2 verification)
//! 2. Server issues an HS256 access/refresh token pair; both leave
//!    persisted rows keyed by jti
//! 3. Requests carry the access token (`Authorization: Bearer`, `token`
//!    cookie, or `token` query parameter)
//! 4. Per-request validation checks signature and expiry, the revocation
//!    blacklist, then the embedded active flag
//! 5. Refresh is single-use: the consumed token is revoked in the same
//!    operation that mints its replacement
//!
//! ## Security
//!
//! - Access and refresh tokens are signed with separate secrets
//! - Logout blacklists the jti for the token's remaining lifetime and
//!   evicts the validation-cache entry immediately
//! - The blacklist is fail-open: a cache outage degrades revocation
//!   propagation, never availability
//! - Clock skew tolerance is 60 seconds

pub mod cache;
pub mod claims;
pub mod error;
pub mod extractor;
pub mod revocation;
pub mod roles;
pub mod tokens;

pub use cache::ValidationCache;
pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth};
pub use revocation::{NoopRevocationList, RedisRevocationList, RevocationChecker};
pub use roles::Role;
pub use tokens::{hash_password, verify_password, IssuedTokens, TokenService, TokenTtls};
