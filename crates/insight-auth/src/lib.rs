//! Session token lifecycle for the Insightful API
//!
//! Borrows the bearer token the user's browser session already holds and
//! keeps it usable: the stored JWT is checked against its `exp` claim and
//! swapped for a fresh one through the refresh endpoint when it has lapsed.
//!
//! Token flow:
//! 1. The host page pushes its tokens via `TokenStore::set()`
//! 2. Callers ask `TokenManager::access_token()` for a bearer string
//! 3. The manager reads both keys and decodes `exp` with `jwt::decode_expiry()`
//! 4. Inside the grace window the cached JWT is returned without I/O
//! 5. Otherwise `token::refresh()` mints a new pair and rewrites the store
//! 6. A 400/401 from the refresh endpoint evicts both keys

pub mod constants;
pub mod error;
pub mod jwt;
pub mod manager;
pub mod store;
pub mod token;

pub use constants::*;
pub use error::{ActiveTokenIssue, Error, Result};
pub use jwt::decode_expiry;
pub use manager::TokenManager;
pub use store::{FileTokenStore, MemoryTokenStore, StoredTokens, TokenStore};
pub use token::{ActiveToken, RefreshEndpoint, TokenBody, refresh};
