//! Issued access token records, lifecycle helpers, and builders.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, ScopeSet, TokenId, token::secret::TokenSecret},
};

/// Current lifecycle status for an access token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is within its validity window.
	Active,
	/// Token reached its expiry instant; terminal.
	Expired,
	/// Token was revoked before expiry; terminal.
	Revoked,
}

/// Errors produced by [`AccessTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum AccessTokenBuilderError {
	/// Issued when no signed token value was provided.
	#[error("Token value is required.")]
	MissingTokenValue,
	/// Issued when no expiry was configured.
	#[error("Expiry must be supplied via expires_at.")]
	MissingExpiry,
	/// Issued when the expiry does not come strictly after the issued-at instant.
	#[error("Expiry must be strictly later than the issued-at instant.")]
	NonIncreasingExpiry,
}

/// One grant issued to a client.
#[derive(Serialize, Deserialize, Clone)]
pub struct AccessToken {
	/// Signed token value; callers must avoid logging it.
	pub token_value: TokenSecret,
	/// Unique token identifier (`jti`).
	pub token_id: TokenId,
	/// Owning client (lookup reference only).
	pub client_id: ClientId,
	/// Normalized scopes granted to this token.
	pub scope: ScopeSet,
	/// Issued-at instant.
	pub issued_at: OffsetDateTime,
	/// Expiry instant; always strictly after `issued_at`.
	pub expires_at: OffsetDateTime,
	/// Revocation instant if the token has been revoked.
	pub revoked_at: Option<OffsetDateTime>,
}
impl AccessToken {
	/// Returns a builder for the provided owner and scope.
	pub fn builder(client_id: ClientId, token_id: TokenId, scope: ScopeSet) -> AccessTokenBuilder {
		AccessTokenBuilder::new(client_id, token_id, scope)
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if self.revoked_at.is_some() {
			return TokenStatus::Revoked;
		}
		if instant >= self.expires_at {
			return TokenStatus::Expired;
		}

		TokenStatus::Active
	}

	/// Returns `true` if the token has been revoked.
	pub fn is_revoked(&self) -> bool {
		self.revoked_at.is_some()
	}

	/// Whole seconds left before expiry at the provided instant, floored at zero.
	pub fn expires_in_at(&self, instant: OffsetDateTime) -> u64 {
		u64::try_from((self.expires_at - instant).whole_seconds()).unwrap_or(0)
	}

	/// Marks the token as revoked.
	pub fn revoke(&mut self, instant: OffsetDateTime) {
		self.revoked_at.get_or_insert(instant);
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("token_value", &"<redacted>")
			.field("token_id", &self.token_id)
			.field("client_id", &self.client_id)
			.field("scope", &self.scope)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("revoked_at", &self.revoked_at)
			.finish()
	}
}

/// Builder for [`AccessToken`].
#[derive(Clone, Debug)]
pub struct AccessTokenBuilder {
	client_id: ClientId,
	token_id: TokenId,
	scope: ScopeSet,
	token_value: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
}
impl AccessTokenBuilder {
	fn new(client_id: ClientId, token_id: TokenId, scope: ScopeSet) -> Self {
		Self {
			client_id,
			token_id,
			scope,
			token_value: None,
			issued_at: None,
			expires_at: None,
		}
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Provides the signed token value.
	pub fn token_value(mut self, token: impl Into<String>) -> Self {
		self.token_value = Some(TokenSecret::new(token));

		self
	}

	/// Consumes the builder and produces an [`AccessToken`].
	pub fn build(self) -> Result<AccessToken, AccessTokenBuilderError> {
		let token_value = self.token_value.ok_or(AccessTokenBuilderError::MissingTokenValue)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = self.expires_at.ok_or(AccessTokenBuilderError::MissingExpiry)?;

		if expires_at <= issued_at {
			return Err(AccessTokenBuilderError::NonIncreasingExpiry);
		}

		Ok(AccessToken {
			token_value,
			token_id: self.token_id,
			client_id: self.client_id,
			scope: self.scope,
			issued_at,
			expires_at,
			revoked_at: None,
		})
	}
}
