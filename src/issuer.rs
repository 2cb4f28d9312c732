//! Client-credentials token issuance.
//!
//! [`TokenIssuer`] authenticates a registered client, narrows the requested scope against the
//! client's allowance, signs an HS256 JWT, and records the grant in the [`TokenStore`] before
//! returning it.

// crates.io
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use rand::Rng;
use serde::{Deserializer, Serializer, de::Error as DeError};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, ClientRegistry, ScopeSet, TokenClaims, TokenId, TokenSecret},
	error::IssueError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::TokenStore,
};

/// The only grant type accepted by the token endpoint.
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";
/// Token type reported to callers.
pub const BEARER_TOKEN_TYPE: &str = "Bearer";

/// Symmetric HS256 key pair shared by the issuer and the validator.
#[derive(Clone)]
pub struct SigningKey {
	encoding: EncodingKey,
	decoding: DecodingKey,
}
impl SigningKey {
	/// Derives the key from a configured secret.
	pub fn from_secret(secret: impl AsRef<[u8]>) -> Self {
		let secret = secret.as_ref();

		Self { encoding: EncodingKey::from_secret(secret), decoding: DecodingKey::from_secret(secret) }
	}

	/// Generates a random 256-bit key; tokens do not survive a restart.
	pub fn random() -> Self {
		let mut secret = [0_u8; 32];

		rand::rng().fill(&mut secret);

		Self::from_secret(secret)
	}

	/// JWT header algorithm bound to this key.
	pub const fn algorithm(&self) -> Algorithm {
		Algorithm::HS256
	}

	pub(crate) fn encoding(&self) -> &EncodingKey {
		&self.encoding
	}

	pub(crate) fn decoding(&self) -> &DecodingKey {
		&self.decoding
	}
}
impl Debug for SigningKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SigningKey").field("algorithm", &self.algorithm()).finish_non_exhaustive()
	}
}

/// Successful token endpoint payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
	/// Signed JWT.
	pub access_token: TokenSecret,
	/// Always [`BEARER_TOKEN_TYPE`].
	pub token_type: String,
	/// Whole seconds until expiry.
	pub expires_in: u64,
	/// Granted scopes, space-delimited on the wire.
	#[serde(serialize_with = "serialize_scope", deserialize_with = "deserialize_scope")]
	pub scope: ScopeSet,
}

/// Issues client-credentials access tokens.
#[derive(Clone)]
pub struct TokenIssuer {
	registry: ClientRegistry,
	store: Arc<dyn TokenStore>,
	key: SigningKey,
	ttl: Duration,
}
impl TokenIssuer {
	/// Creates an issuer; `ttl` is truncated to whole seconds when tokens are minted.
	pub fn new(
		registry: ClientRegistry,
		store: Arc<dyn TokenStore>,
		key: SigningKey,
		ttl: Duration,
	) -> Self {
		Self { registry, store, key, ttl }
	}

	/// Registered clients.
	pub fn registry(&self) -> &ClientRegistry {
		&self.registry
	}

	/// Store receiving every issued token.
	pub fn store(&self) -> &Arc<dyn TokenStore> {
		&self.store
	}

	/// Signing key used for minted tokens.
	pub fn key(&self) -> &SigningKey {
		&self.key
	}

	/// Lifetime of issued tokens.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Issues a token using the current UTC instant.
	pub async fn issue(
		&self,
		grant_type: &str,
		client_id: &str,
		client_secret: &str,
		requested_scope: Option<&str>,
	) -> Result<IssuedToken, IssueError> {
		self.issue_at(grant_type, client_id, client_secret, requested_scope, OffsetDateTime::now_utc())
			.await
	}

	/// Issues a token as of `now`.
	///
	/// Checks run in order: grant type, presence of credentials, client authentication, scope.
	/// An absent or empty `requested_scope` grants every scope the client is allowed.
	pub async fn issue_at(
		&self,
		grant_type: &str,
		client_id: &str,
		client_secret: &str,
		requested_scope: Option<&str>,
		now: OffsetDateTime,
	) -> Result<IssuedToken, IssueError> {
		const KIND: FlowKind = FlowKind::Issue;

		let span = FlowSpan::new(KIND, "issue_at");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				if grant_type != CLIENT_CREDENTIALS_GRANT {
					return Err(IssueError::InvalidGrantType { grant_type: grant_type.to_owned() });
				}
				if client_id.is_empty() || client_secret.is_empty() {
					return Err(IssueError::InvalidRequest {
						reason: "client_id and client_secret are required",
					});
				}

				let client = self
					.registry
					.authenticate(client_id, client_secret)
					.ok_or(IssueError::InvalidClient)?;
				let requested = match requested_scope {
					Some(raw) => ScopeSet::from_str(raw).map_err(|_| IssueError::InvalidScope)?,
					None => ScopeSet::default(),
				};
				let scope = if requested.is_empty() {
					client.allowed_scopes.clone()
				} else if requested.is_subset_of(&client.allowed_scopes) {
					requested
				} else {
					let missing = requested.missing_from(&client.allowed_scopes).collect::<Vec<_>>();

					tracing::debug!(
						client_id = %client.client_id,
						?missing,
						"Requested scope exceeds client allowance."
					);

					return Err(IssueError::InvalidScope);
				};
				let issued_at = now - Duration::nanoseconds(i64::from(now.nanosecond()));
				let expires_at = issued_at
					.checked_add(Duration::seconds(self.ttl.whole_seconds()))
					.ok_or(IssueError::ExpiryOverflow { ttl: self.ttl })?;
				let token_id = TokenId::generate();
				let claims = TokenClaims::new(
					client.client_id.clone(),
					scope.clone(),
					token_id.clone(),
					issued_at,
					expires_at,
				);
				let signed = jsonwebtoken::encode(
					&Header::new(self.key.algorithm()),
					&claims,
					self.key.encoding(),
				)
				.map_err(IssueError::Signing)?;
				let record = AccessToken::builder(client.client_id.clone(), token_id, scope)
					.token_value(signed)
					.issued_at(issued_at)
					.expires_at(expires_at)
					.build()?;
				let issued = IssuedToken {
					access_token: record.token_value.clone(),
					token_type: BEARER_TOKEN_TYPE.into(),
					expires_in: record.expires_in_at(issued_at),
					scope: record.scope.clone(),
				};

				tracing::info!(
					client_id = %record.client_id,
					token_id = %record.token_id,
					scope = %record.scope,
					expires_in = issued.expires_in,
					"Issued access token."
				);

				self.store.insert(record).await?;

				Ok(issued)
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	/// Revokes a previously issued token using the current UTC instant.
	///
	/// Returns `false` when the store holds no record for the value.
	pub async fn revoke(&self, token_value: &str) -> Result<bool, IssueError> {
		self.revoke_at(token_value, OffsetDateTime::now_utc()).await
	}

	/// Revokes a previously issued token as of `instant`.
	pub async fn revoke_at(
		&self,
		token_value: &str,
		instant: OffsetDateTime,
	) -> Result<bool, IssueError> {
		let revoked = self.store.revoke(token_value, instant).await?;

		if let Some(record) = &revoked {
			tracing::info!(token_id = %record.token_id, "Revoked access token.");
		}

		Ok(revoked.is_some())
	}
}
impl Debug for TokenIssuer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenIssuer")
			.field("clients", &self.registry.len())
			.field("key", &self.key)
			.field("ttl", &self.ttl)
			.finish_non_exhaustive()
	}
}

fn serialize_scope<S>(scope: &ScopeSet, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	serializer.serialize_str(&scope.normalized())
}

fn deserialize_scope<'de, D>(deserializer: D) -> Result<ScopeSet, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;

	ScopeSet::from_str(&raw).map_err(DeError::custom)
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		auth::{Client, ClientId, TokenStatus},
		store::MemoryStore,
		validator::TokenValidator,
	};

	fn issuer_with(store: MemoryStore) -> TokenIssuer {
		let allowed = ScopeSet::new(["a2a:travel-agent", "tasks:read"])
			.expect("Allowed scope fixture should be valid.");
		let registry = ClientRegistry::new([Client::new(
			ClientId::new(TEST_CLIENT_ID).expect("Client fixture should be valid."),
			TEST_CLIENT_SECRET,
			"Default Travel Agent Client",
			allowed,
		)]);

		TokenIssuer::new(
			registry,
			Arc::new(store),
			SigningKey::from_secret(TEST_JWT_SECRET),
			Duration::seconds(3_600),
		)
	}

	#[tokio::test]
	async fn issue_grants_all_allowed_scopes_when_none_requested() {
		let store = MemoryStore::default();
		let issuer = issuer_with(store.clone());
		let now = macros::datetime!(2025-01-01 00:00:00.75 UTC);
		let issued = issuer
			.issue_at(CLIENT_CREDENTIALS_GRANT, TEST_CLIENT_ID, TEST_CLIENT_SECRET, None, now)
			.await
			.expect("Valid credentials should be issued a token.");

		assert_eq!(issued.token_type, "Bearer");
		assert_eq!(issued.expires_in, 3_600);
		assert_eq!(issued.scope.normalized(), "a2a:travel-agent tasks:read");

		let record = store
			.fetch(issued.access_token.expose())
			.await
			.expect("Fetching the issued token should succeed.")
			.expect("Issued token should be stored.");

		assert_eq!(record.issued_at, macros::datetime!(2025-01-01 00:00 UTC));
		assert_eq!(record.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
		assert_eq!(record.status_at(now), TokenStatus::Active);
	}

	#[tokio::test]
	async fn issue_narrows_to_requested_subset_and_rejects_excess() {
		let issuer = issuer_with(MemoryStore::default());
		let issued = issuer
			.issue(CLIENT_CREDENTIALS_GRANT, TEST_CLIENT_ID, TEST_CLIENT_SECRET, Some("tasks:read"))
			.await
			.expect("Subset scope should be granted.");

		assert_eq!(issued.scope.normalized(), "tasks:read");

		let err = issuer
			.issue(
				CLIENT_CREDENTIALS_GRANT,
				TEST_CLIENT_ID,
				TEST_CLIENT_SECRET,
				Some("a2a:travel-agent admin"),
			)
			.await
			.expect_err("Scopes outside the allowance must be rejected.");

		assert!(matches!(err, IssueError::InvalidScope));

		let empty = issuer
			.issue(CLIENT_CREDENTIALS_GRANT, TEST_CLIENT_ID, TEST_CLIENT_SECRET, Some(""))
			.await
			.expect("Empty scope should grant the full allowance.");

		assert_eq!(empty.scope.len(), 2);
	}

	#[tokio::test]
	async fn issue_rejects_grant_type_before_credentials() {
		let issuer = issuer_with(MemoryStore::default());
		let err = issuer
			.issue("password", "unknown", "wrong", None)
			.await
			.expect_err("Unsupported grant types must be rejected.");

		assert!(matches!(err, IssueError::InvalidGrantType { ref grant_type } if grant_type == "password"));

		let err = issuer
			.issue(CLIENT_CREDENTIALS_GRANT, TEST_CLIENT_ID, "", None)
			.await
			.expect_err("Missing secret must be rejected.");

		assert!(matches!(err, IssueError::InvalidRequest { .. }));
	}

	#[tokio::test]
	async fn wrong_secret_and_unknown_client_are_indistinguishable() {
		let store = MemoryStore::default();
		let issuer = issuer_with(store.clone());
		let wrong_secret = issuer
			.issue(CLIENT_CREDENTIALS_GRANT, TEST_CLIENT_ID, "wrong", None)
			.await
			.expect_err("Wrong secret must be rejected.");
		let unknown = issuer
			.issue(CLIENT_CREDENTIALS_GRANT, "someone-else", TEST_CLIENT_SECRET, None)
			.await
			.expect_err("Unknown client must be rejected.");

		assert_eq!(wrong_secret.to_string(), unknown.to_string());
		assert_eq!(wrong_secret.oauth_code(), unknown.oauth_code());
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn revoke_marks_the_stored_record() {
		let store = MemoryStore::default();
		let issuer = issuer_with(store.clone());
		let issued = issuer
			.issue(CLIENT_CREDENTIALS_GRANT, TEST_CLIENT_ID, TEST_CLIENT_SECRET, None)
			.await
			.expect("Valid credentials should be issued a token.");

		assert!(issuer.revoke(issued.access_token.expose()).await.expect("Revoke should succeed."));
		assert!(!issuer.revoke("not-issued").await.expect("Revoke should succeed."));

		let record = store
			.fetch(issued.access_token.expose())
			.await
			.expect("Fetching should succeed.")
			.expect("Revoked token should remain stored.");

		assert!(record.is_revoked());
	}

	#[tokio::test]
	async fn oversized_ttl_is_a_server_error_not_a_panic() {
		let store = MemoryStore::default();
		let issuer = TokenIssuer {
			ttl: Duration::seconds(400_000_000_000),
			..issuer_with(store.clone())
		};
		let err = issuer
			.issue(CLIENT_CREDENTIALS_GRANT, TEST_CLIENT_ID, TEST_CLIENT_SECRET, None)
			.await
			.expect_err("An unrepresentable expiry must be rejected.");

		assert!(matches!(err, IssueError::ExpiryOverflow { .. }));
		assert_eq!(err.oauth_code(), "server_error");
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn concurrent_issuance_yields_independent_tokens() {
		let store = MemoryStore::default();
		let issuer = issuer_with(store.clone());
		let (first, second) = tokio::join!(
			issuer.issue(CLIENT_CREDENTIALS_GRANT, TEST_CLIENT_ID, TEST_CLIENT_SECRET, None),
			issuer.issue(CLIENT_CREDENTIALS_GRANT, TEST_CLIENT_ID, TEST_CLIENT_SECRET, None),
		);
		let first = first.expect("First concurrent issuance should succeed.");
		let second = second.expect("Second concurrent issuance should succeed.");

		assert_ne!(first.access_token.expose(), second.access_token.expose());
		assert_eq!(store.len(), 2);

		let validator = TokenValidator::new(issuer.key().clone()).with_store(Arc::new(store));
		let required = ScopeSet::travel_agent();
		let first_identity = validator
			.validate(first.access_token.expose(), &required)
			.await
			.expect("First token should validate.");
		let second_identity = validator
			.validate(second.access_token.expose(), &required)
			.await
			.expect("Second token should validate.");

		assert_eq!(first_identity.client_id, second_identity.client_id);
		assert_ne!(first_identity.token_id, second_identity.token_id);
	}

	#[test]
	fn issued_token_serializes_scope_as_string() {
		let issued = IssuedToken {
			access_token: TokenSecret::new("signed"),
			token_type: BEARER_TOKEN_TYPE.into(),
			expires_in: 3_600,
			scope: ScopeSet::travel_agent(),
		};
		let value = serde_json::to_value(&issued).expect("Issued token should serialize.");

		assert_eq!(
			value,
			serde_json::json!({
				"access_token": "signed",
				"token_type": "Bearer",
				"expires_in": 3_600,
				"scope": "a2a:travel-agent",
			})
		);
		assert!(!format!("{issued:?}").contains("signed"));
	}
}
