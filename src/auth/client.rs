//! Registered machine clients and constant-time credential verification.

// crates.io
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
// self
use crate::{
	_prelude::*,
	auth::{ClientId, ScopeSet, TokenId},
};

type SecretDigest = [u8; 32];

/// Digest compared against when the client id is unknown, so both rejection paths hash and
/// compare once.
const UNKNOWN_CLIENT_DIGEST: SecretDigest = [0; 32];

/// Registered OAuth client allowed to use the client-credentials grant.
///
/// Only a SHA-256 digest of the secret is retained.
#[derive(Clone)]
pub struct Client {
	/// Unique client identifier.
	pub client_id: ClientId,
	/// Human-readable label used in logs.
	pub name: String,
	/// Scopes this client may be granted.
	pub allowed_scopes: ScopeSet,
	secret_digest: SecretDigest,
}
impl Client {
	/// Registers a client with the provided plain-text secret.
	pub fn new(
		client_id: ClientId,
		client_secret: &str,
		name: impl Into<String>,
		allowed_scopes: ScopeSet,
	) -> Self {
		Self { client_id, name: name.into(), allowed_scopes, secret_digest: digest(client_secret) }
	}

	/// Compares the candidate secret against the stored digest in constant time.
	pub fn verify_secret(&self, candidate: &str) -> bool {
		bool::from(digest(candidate).as_slice().ct_eq(self.secret_digest.as_slice()))
	}
}
impl Debug for Client {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("client_id", &self.client_id)
			.field("name", &self.name)
			.field("allowed_scopes", &self.allowed_scopes)
			.field("secret_digest", &"<redacted>")
			.finish()
	}
}

/// Immutable registry of clients built at startup.
#[derive(Clone, Debug, Default)]
pub struct ClientRegistry(Arc<HashMap<ClientId, Client>>);
impl ClientRegistry {
	/// Builds a registry from the provided clients; later duplicates replace earlier ones.
	pub fn new(clients: impl IntoIterator<Item = Client>) -> Self {
		Self(Arc::new(
			clients.into_iter().map(|client| (client.client_id.clone(), client)).collect(),
		))
	}

	/// Looks up a client without authenticating it.
	pub fn get(&self, client_id: &str) -> Option<&Client> {
		self.0.get(client_id)
	}

	/// Number of registered clients.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true when no clients are registered.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Authenticates a client.
	///
	/// Returns `None` for an unknown id and for a wrong secret alike; callers must not be able to
	/// tell the two apart.
	pub fn authenticate(&self, client_id: &str, client_secret: &str) -> Option<&Client> {
		match self.0.get(client_id) {
			Some(client) => client.verify_secret(client_secret).then_some(client),
			None => {
				let _ = bool::from(
					digest(client_secret).as_slice().ct_eq(UNKNOWN_CLIENT_DIGEST.as_slice()),
				);

				None
			},
		}
	}
}

/// Identity resolved from a validated bearer token and attached to the request context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
	/// Client that owns the token.
	pub client_id: ClientId,
	/// Scopes granted to the token.
	pub scope: ScopeSet,
	/// Token identifier (`jti`), useful for log correlation.
	pub token_id: TokenId,
	/// Expiry instant of the presented token.
	pub expires_at: OffsetDateTime,
}

fn digest(secret: &str) -> SecretDigest {
	Sha256::digest(secret.as_bytes()).into()
}
