//! Cached client-credentials token for the upstream model endpoint.

// crates.io
use oauth2::{
	AuthType, ClientId as OAuthClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	agent::AgentError,
	auth::TokenSecret,
	config::LlmConfig,
	error::ConfigError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

type UpstreamClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Cached tokens are replaced once they are this close to expiry.
pub const REFRESH_MARGIN: Duration = Duration::minutes(5);
/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_UPSTREAM_EXPIRY: Duration = Duration::seconds(3_600);

#[derive(Clone)]
struct CachedToken {
	secret: TokenSecret,
	expires_at: OffsetDateTime,
}
impl CachedToken {
	fn is_fresh_at(&self, now: OffsetDateTime) -> bool {
		now < self.expires_at - REFRESH_MARGIN
	}
}

/// Obtains and caches bearer tokens for the model endpoint via the client-credentials grant.
///
/// The cache lock is held while a refresh is in flight, so concurrent callers wait for a single
/// exchange instead of racing the token endpoint.
pub struct UpstreamCredentials {
	oauth: UpstreamClient,
	http: ReqwestClient,
	token_url: Url,
	scope: String,
	cached: AsyncMutex<Option<CachedToken>>,
}
impl UpstreamCredentials {
	/// Builds the credential source from the upstream settings.
	pub fn new(config: &LlmConfig, http: ReqwestClient) -> Result<Self, ConfigError> {
		let token_url = TokenUrl::new(config.token_url.to_string()).map_err(|e| {
			ConfigError::InvalidValue { key: "TOKEN_URL", reason: e.to_string() }
		})?;
		let oauth = BasicClient::new(OAuthClientId::new(config.client_id.clone()))
			.set_client_secret(ClientSecret::new(config.client_secret.expose().to_owned()))
			.set_auth_type(AuthType::RequestBody)
			.set_token_uri(token_url);

		Ok(Self {
			oauth,
			http,
			token_url: config.token_url.clone(),
			scope: config.token_scope.clone(),
			cached: AsyncMutex::new(None),
		})
	}

	/// Returns a bearer token valid for at least [`REFRESH_MARGIN`], refreshing if needed.
	pub async fn bearer(&self) -> Result<TokenSecret, AgentError> {
		self.bearer_at(OffsetDateTime::now_utc()).await
	}

	/// Same as [`Self::bearer`] with an injected clock.
	pub async fn bearer_at(&self, now: OffsetDateTime) -> Result<TokenSecret, AgentError> {
		let mut cached = self.cached.lock().await;

		if let Some(token) = cached.as_ref().filter(|token| token.is_fresh_at(now)) {
			return Ok(token.secret.clone());
		}

		let fresh = self.exchange(now).await?;
		let secret = fresh.secret.clone();

		*cached = Some(fresh);

		Ok(secret)
	}

	/// Drops the cached token so the next call performs a fresh exchange.
	pub async fn invalidate(&self) {
		self.cached.lock().await.take();
	}

	async fn exchange(&self, now: OffsetDateTime) -> Result<CachedToken, AgentError> {
		const KIND: FlowKind = FlowKind::UpstreamToken;

		let span = FlowSpan::new(KIND, "exchange");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<CachedToken, AgentError> = span
			.instrument(async {
				let mut request = self.oauth.exchange_client_credentials();

				if !self.scope.is_empty() {
					request = request.add_scope(Scope::new(self.scope.clone()));
				}

				let response = request.request_async(&self.http).await.map_err(map_request_error)?;
				let lifetime = response
					.expires_in()
					.and_then(|expires_in| Duration::try_from(expires_in).ok())
					.unwrap_or(DEFAULT_UPSTREAM_EXPIRY);

				tracing::debug!(
					expires_in = lifetime.whole_seconds(),
					"Obtained upstream access token."
				);

				Ok(CachedToken {
					secret: TokenSecret::new(response.access_token().secret().to_owned()),
					expires_at: now + lifetime,
				})
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}
}
impl Debug for UpstreamCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UpstreamCredentials")
			.field("token_url", &self.token_url.as_str())
			.field("scope", &self.scope)
			.finish_non_exhaustive()
	}
}

fn map_request_error(err: BasicRequestTokenError<HttpClientError<ReqwestError>>) -> AgentError {
	match err {
		RequestTokenError::ServerResponse(response) => {
			let message = match response.error_description() {
				Some(description) =>
					format!("token endpoint returned `{}`: {description}", response.error().as_ref()),
				None => format!("token endpoint returned `{}`", response.error().as_ref()),
			};

			AgentError::UpstreamToken { message }
		},
		RequestTokenError::Request(HttpClientError::Reqwest(inner)) => AgentError::Transport(*inner),
		RequestTokenError::Request(other) => AgentError::UpstreamToken { message: other.to_string() },
		RequestTokenError::Parse(source, _body) => AgentError::Decode(source),
		RequestTokenError::Other(message) => AgentError::UpstreamToken { message },
	}
}
