//! Service-level error types shared across issuance, validation, dispatch, and configuration.

// self
use crate::_prelude::*;

/// Service-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token issuance was rejected.
	#[error(transparent)]
	Issue(#[from] IssueError),
	/// Bearer token validation was rejected.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Agent handler failure.
	#[error(transparent)]
	Agent(#[from] crate::agent::AgentError),
	/// Listener or socket failure.
	#[error("I/O error occurred while serving requests.")]
	Io(#[from] std::io::Error),
}

/// Configuration and validation failures raised while assembling the service.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Environment variable holds a value that cannot be parsed.
	#[error("Environment variable `{key}` has an invalid value: {reason}.")]
	InvalidValue {
		/// Variable name.
		key: &'static str,
		/// Parser-supplied reason string.
		reason: String,
	},
	/// OAuth2 is enabled but no client identity was configured.
	#[error("OAuth2 is enabled but `{key}` is not set.")]
	MissingClientCredential {
		/// Variable name that is missing.
		key: &'static str,
	},
	/// A configured identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Configured scopes cannot be normalized.
	#[error("Configured scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Upstream HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Token TTL must be strictly positive.
	#[error("The token TTL must be positive.")]
	NonPositiveTtl,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Rejections raised by the token endpoint.
///
/// Each variant maps onto an RFC 6749 §5.2 error code via [`IssueError::oauth_code`].
#[derive(Debug, ThisError)]
pub enum IssueError {
	/// Required request parameters are missing.
	#[error("Token request is malformed: {reason}.")]
	InvalidRequest {
		/// Human-readable description of the missing parameter.
		reason: &'static str,
	},
	/// The grant type is not `client_credentials`.
	#[error("Only the client_credentials grant type is supported.")]
	InvalidGrantType {
		/// Grant type supplied by the caller.
		grant_type: String,
	},
	/// Client authentication failed; unknown ids and wrong secrets are indistinguishable.
	#[error("Invalid client credentials.")]
	InvalidClient,
	/// Requested scope exceeds what the client may be granted.
	#[error("Requested scope is not allowed for this client.")]
	InvalidScope,
	/// Token record could not be stored.
	#[error(transparent)]
	Storage(#[from] crate::store::StoreError),
	/// Token could not be signed.
	#[error("Access token could not be signed.")]
	Signing(#[source] jsonwebtoken::errors::Error),
	/// Token lifetime produced an invalid record.
	#[error(transparent)]
	Record(#[from] crate::auth::AccessTokenBuilderError),
	/// Issued-at plus the configured lifetime falls outside the representable range.
	#[error("Token lifetime of {ttl} overflows the expiry instant.")]
	ExpiryOverflow {
		/// Configured lifetime.
		ttl: Duration,
	},
}
impl IssueError {
	/// Returns the RFC 6749 error code for this rejection.
	pub fn oauth_code(&self) -> &'static str {
		match self {
			Self::InvalidRequest { .. } => "invalid_request",
			Self::InvalidGrantType { .. } => "unsupported_grant_type",
			Self::InvalidClient => "invalid_client",
			Self::InvalidScope => "invalid_scope",
			Self::Storage(_) | Self::Signing(_) | Self::Record(_) | Self::ExpiryOverflow { .. } =>
				"server_error",
		}
	}

	/// Returns `true` when the failure belongs to the server rather than the caller.
	pub fn is_server_fault(&self) -> bool {
		matches!(
			self,
			Self::Storage(_) | Self::Signing(_) | Self::Record(_) | Self::ExpiryOverflow { .. }
		)
	}
}

/// Rejections raised while validating a bearer token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ValidationError {
	/// The token is not a well-formed JWT signed with the configured secret.
	#[error("Access token is malformed or carries an invalid signature.")]
	MalformedToken,
	/// The token reached its expiry instant.
	#[error("Access token has expired.")]
	ExpiredToken,
	/// The token lacks the scope the operation requires.
	#[error("Access token lacks the required scope.")]
	InsufficientScope,
	/// The token was revoked before it expired.
	#[error("Access token has been revoked.")]
	RevokedToken,
}
impl ValidationError {
	/// Returns a stable reason code suitable for logs and metrics.
	pub const fn reason_code(self) -> &'static str {
		match self {
			Self::MalformedToken => "malformed_token",
			Self::ExpiredToken => "expired_token",
			Self::InsufficientScope => "insufficient_scope",
			Self::RevokedToken => "revoked_token",
		}
	}
}
