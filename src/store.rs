//! Storage contracts and the built-in store implementation for issued access tokens.

pub mod memory;

pub use memory::MemoryStore;

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenId},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for issued access tokens, keyed by token value.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Persists a freshly issued token; a second insert for the same value fails with
	/// [`StoreError::Duplicate`].
	fn insert(&self, token: AccessToken) -> StoreFuture<'_, ()>;

	/// Fetches the record for the provided token value, if present.
	fn fetch<'a>(&'a self, token_value: &'a str) -> StoreFuture<'a, Option<AccessToken>>;

	/// Marks a record as revoked at the provided instant and returns the updated record.
	///
	/// Revoking an already revoked record keeps the first revocation instant.
	fn revoke<'a>(
		&'a self,
		token_value: &'a str,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<AccessToken>>;

	/// Drops every record whose expiry is at or before `now`; returns how many were removed.
	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// A record with the same token value already exists.
	#[error("Token `{token_id}` is already stored.")]
	Duplicate {
		/// Identifier of the rejected token.
		token_id: TokenId,
	},
}

/// Unique key identifying a stored token record.
///
/// Derived from a SHA-256 digest of the token value so raw bearer tokens never sit in map keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreKey(String);
impl StoreKey {
	/// Builds a key for the provided token value.
	pub fn new(token_value: &str) -> Self {
		Self(URL_SAFE_NO_PAD.encode(Sha256::digest(token_value.as_bytes())))
	}

	/// Returns the encoded digest.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
