//! Bearer token validation.

// crates.io
use jsonwebtoken::Validation;
// self
use crate::{
	_prelude::*,
	auth::{ClientIdentity, ScopeSet, TOKEN_AUDIENCE, TOKEN_ISSUER, TokenClaims},
	error::ValidationError,
	issuer::SigningKey,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::TokenStore,
};

/// Verifies bearer tokens minted by the issuer.
///
/// The signed JWT is authoritative: a token is accepted iff its signature verifies, `now` is
/// strictly before its expiry, and its scopes include the required ones. When a store is
/// attached, a stored record that was revoked also rejects the token; an absent record does not.
/// Validation never writes to the store.
#[derive(Clone)]
pub struct TokenValidator {
	key: SigningKey,
	store: Option<Arc<dyn TokenStore>>,
	rules: Validation,
}
impl TokenValidator {
	/// Creates a stateless validator.
	pub fn new(key: SigningKey) -> Self {
		let mut rules = Validation::new(key.algorithm());

		// Expiry is checked against the injected clock with a hard boundary.
		rules.validate_exp = false;
		rules.leeway = 0;
		rules.required_spec_claims = ["exp", "iss", "aud"].into_iter().map(String::from).collect();
		rules.set_issuer(&[TOKEN_ISSUER]);
		rules.set_audience(&[TOKEN_AUDIENCE]);

		Self { key, store: None, rules }
	}

	/// Attaches a store consulted for revocation.
	pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Validates a bearer token using the current UTC instant.
	pub async fn validate(
		&self,
		bearer: &str,
		required: &ScopeSet,
	) -> Result<ClientIdentity, ValidationError> {
		self.validate_at(bearer, required, OffsetDateTime::now_utc()).await
	}

	/// Validates a bearer token as of `now`.
	pub async fn validate_at(
		&self,
		bearer: &str,
		required: &ScopeSet,
		now: OffsetDateTime,
	) -> Result<ClientIdentity, ValidationError> {
		const KIND: FlowKind = FlowKind::Validate;

		let span = FlowSpan::new(KIND, "validate_at");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.check(bearer, required, now)).await;

		if let Err(e) = &result {
			tracing::debug!(reason = e.reason_code(), "Rejected bearer token.");
		}

		obs::record_result(KIND, &result);

		result
	}

	async fn check(
		&self,
		bearer: &str,
		required: &ScopeSet,
		now: OffsetDateTime,
	) -> Result<ClientIdentity, ValidationError> {
		let claims = self.decode(bearer)?;
		let expires_at = claims.expires_at().ok_or(ValidationError::MalformedToken)?;

		if now >= expires_at {
			return Err(ValidationError::ExpiredToken);
		}
		if !required.is_subset_of(&claims.scopes) {
			return Err(ValidationError::InsufficientScope);
		}
		if let Some(store) = &self.store {
			match store.fetch(bearer).await {
				Ok(Some(record)) if record.is_revoked() => return Err(ValidationError::RevokedToken),
				Ok(_) => {},
				Err(e) => {
					tracing::warn!(error = %e, "Token store lookup failed; trusting the signature.");
				},
			}
		}

		Ok(ClientIdentity {
			client_id: claims.client_id,
			scope: claims.scopes,
			token_id: claims.jti,
			expires_at,
		})
	}

	fn decode(&self, bearer: &str) -> Result<TokenClaims, ValidationError> {
		jsonwebtoken::decode::<TokenClaims>(bearer, self.key.decoding(), &self.rules)
			.map(|data| data.claims)
			.map_err(|_| ValidationError::MalformedToken)
	}
}
impl Debug for TokenValidator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenValidator")
			.field("key", &self.key)
			.field("revocation_store", &self.store.is_some())
			.finish_non_exhaustive()
	}
}
