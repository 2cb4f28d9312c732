//! Thread-safe in-memory [`TokenStore`] implementation.

// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	store::{StoreError, StoreFuture, StoreKey, TokenStore},
};

type StoreMap = Arc<RwLock<HashMap<StoreKey, AccessToken>>>;

/// Storage backend that keeps records in-process; reads run concurrently, writes serialize.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of records currently held, expired ones included.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true when the store holds no records.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn insert_now(map: StoreMap, token: AccessToken) -> Result<(), StoreError> {
		let key = StoreKey::new(token.token_value.expose());
		let mut guard = map.write();

		if guard.contains_key(&key) {
			return Err(StoreError::Duplicate { token_id: token.token_id });
		}

		guard.insert(key, token);

		Ok(())
	}

	fn revoke_now(map: StoreMap, key: StoreKey, instant: OffsetDateTime) -> Option<AccessToken> {
		let mut guard = map.write();

		match guard.get_mut(&key) {
			Some(token) => {
				token.revoke(instant);

				Some(token.clone())
			},
			None => None,
		}
	}

	fn purge_now(map: StoreMap, now: OffsetDateTime) -> usize {
		let mut guard = map.write();
		let before = guard.len();

		guard.retain(|_, token| token.expires_at > now);

		before - guard.len()
	}
}
impl TokenStore for MemoryStore {
	fn insert(&self, token: AccessToken) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::insert_now(map, token) })
	}

	fn fetch<'a>(&'a self, token_value: &'a str) -> StoreFuture<'a, Option<AccessToken>> {
		let map = self.0.clone();
		let key = StoreKey::new(token_value);

		Box::pin(async move { Ok(map.read().get(&key).cloned()) })
	}

	fn revoke<'a>(
		&'a self,
		token_value: &'a str,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<AccessToken>> {
		let map = self.0.clone();
		let key = StoreKey::new(token_value);

		Box::pin(async move { Ok(Self::revoke_now(map, key, instant)) })
	}

	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::purge_now(map, now)) })
	}
}
