//! JWT payload minted by the issuer and verified by the validator.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, ScopeSet, TokenId},
};

/// `iss` claim stamped on every access token.
pub const TOKEN_ISSUER: &str = "travel-agent-oauth2";
/// `aud` claim stamped on every access token.
pub const TOKEN_AUDIENCE: &str = "travel-agent-a2a";

/// Claims carried inside a signed access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
	/// Subject; always the owning client.
	pub sub: ClientId,
	/// Owning client, duplicated for consumers that only read `client_id`.
	pub client_id: ClientId,
	/// Granted scopes.
	pub scopes: ScopeSet,
	/// Issued-at, unix seconds.
	pub iat: i64,
	/// Expiry, unix seconds.
	pub exp: i64,
	/// Unique token identifier.
	pub jti: TokenId,
	/// Issuer.
	pub iss: String,
	/// Audience.
	pub aud: String,
}
impl TokenClaims {
	/// Builds claims for a client grant over `[issued_at, expires_at)`.
	pub fn new(
		client_id: ClientId,
		scopes: ScopeSet,
		token_id: TokenId,
		issued_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> Self {
		Self {
			sub: client_id.clone(),
			client_id,
			scopes,
			iat: issued_at.unix_timestamp(),
			exp: expires_at.unix_timestamp(),
			jti: token_id,
			iss: TOKEN_ISSUER.into(),
			aud: TOKEN_AUDIENCE.into(),
		}
	}

	/// Expiry as an instant, or `None` when the claim is outside the representable range.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp(self.exp).ok()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn claims_serialize_scopes_as_array_and_fixed_issuer() {
		let claims = TokenClaims::new(
			ClientId::new("travel-agent-client").expect("Client fixture should be valid."),
			ScopeSet::travel_agent(),
			TokenId::new("jti-1").expect("Token id fixture should be valid."),
			macros::datetime!(2025-01-01 00:00 UTC),
			macros::datetime!(2025-01-01 01:00 UTC),
		);
		let value = serde_json::to_value(&claims).expect("Claims should serialize.");

		assert_eq!(value["scopes"], serde_json::json!(["a2a:travel-agent"]));
		assert_eq!(value["iss"], TOKEN_ISSUER);
		assert_eq!(value["aud"], TOKEN_AUDIENCE);
		assert_eq!(value["exp"].as_i64(), Some(value["iat"].as_i64().unwrap_or_default() + 3_600));
		assert_eq!(claims.expires_at(), Some(macros::datetime!(2025-01-01 01:00 UTC)));
	}
}
