//! Environment-driven service configuration.

// self
use crate::{
	_prelude::*,
	auth::{Client, ClientId, ClientRegistry, ScopeSet, TokenSecret},
	error::ConfigError,
	issuer::SigningKey,
};

/// Default lifetime of issued access tokens in seconds.
pub const DEFAULT_TOKEN_EXPIRY_SECS: i64 = 3_600;
/// Longest accepted access token lifetime in seconds (one year).
pub const MAX_TOKEN_EXPIRY_SECS: i64 = 31_536_000;
/// Default interval between expired-token sweeps in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: i64 = 300;
/// Longest accepted interval between expired-token sweeps in seconds (one day).
pub const MAX_SWEEP_INTERVAL_SECS: i64 = 86_400;

/// Complete service configuration.
#[derive(Clone, Debug)]
pub struct Config {
	/// Listener and agent card settings.
	pub server: ServerConfig,
	/// Inbound OAuth2 settings.
	pub oauth: OAuthConfig,
	/// Upstream LLM settings; `None` selects the rule-based responder.
	pub llm: Option<LlmConfig>,
}
impl Config {
	/// Loads `.env` (when present) and reads the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		if let Err(e) = dotenvy::dotenv() {
			if !e.not_found() {
				tracing::warn!(error = %e, "Failed to load .env file.");
			}
		}

		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads configuration through `lookup`; empty values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
		let server = ServerConfig {
			host: get("HOST").unwrap_or_else(|| ServerConfig::DEFAULT_HOST.into()),
			port: parse_or(&get, "PORT", ServerConfig::DEFAULT_PORT)?,
			public_host: get("A2A_PUBLIC_HOST"),
			version: get("APP_VERSION").unwrap_or_else(|| ServerConfig::DEFAULT_VERSION.into()),
		};
		let enabled = match get("OAUTH2_ENABLED") {
			Some(raw) => parse_bool("OAUTH2_ENABLED", &raw)?,
			None => true,
		};
		let oauth = OAuthConfig {
			enabled,
			client_id: get("OAUTH2_CLIENT_ID"),
			client_secret: get("OAUTH2_CLIENT_SECRET").map(TokenSecret::new),
			jwt_secret: get("OAUTH2_JWT_SECRET").map(TokenSecret::new),
			token_ttl: Duration::seconds(parse_or(
				&get,
				"OAUTH2_TOKEN_EXPIRY",
				DEFAULT_TOKEN_EXPIRY_SECS,
			)?),
			sweep_interval: Duration::seconds(parse_or(
				&get,
				"OAUTH2_SWEEP_INTERVAL",
				DEFAULT_SWEEP_INTERVAL_SECS,
			)?),
		};

		oauth.validate()?;

		let llm = LlmConfig::from_lookup(&get)?;

		Ok(Self { server, oauth, llm })
	}
}

/// Listener and agent card settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
	/// Bind address.
	pub host: String,
	/// Bind port.
	pub port: u16,
	/// Host advertised in the agent card when the request carries none.
	pub public_host: Option<String>,
	/// Version advertised in the agent card and health payload.
	pub version: String,
}
impl ServerConfig {
	const DEFAULT_HOST: &'static str = "0.0.0.0";
	const DEFAULT_PORT: u16 = 8_080;
	const DEFAULT_VERSION: &'static str = "1.0.0";

	/// `host:port` string accepted by `TcpListener::bind`.
	pub fn bind_addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}
}
impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			host: Self::DEFAULT_HOST.into(),
			port: Self::DEFAULT_PORT,
			public_host: None,
			version: Self::DEFAULT_VERSION.into(),
		}
	}
}

/// Inbound OAuth2 issuer and validator settings.
#[derive(Clone, Debug)]
pub struct OAuthConfig {
	/// When false every route is served without authentication.
	pub enabled: bool,
	/// Identifier of the single registered client.
	pub client_id: Option<String>,
	/// Secret of the single registered client.
	pub client_secret: Option<TokenSecret>,
	/// HS256 signing secret; a random key is generated when unset.
	pub jwt_secret: Option<TokenSecret>,
	/// Lifetime of issued tokens.
	pub token_ttl: Duration,
	/// Interval between expired-token sweeps; zero disables the sweeper.
	pub sweep_interval: Duration,
}
impl OAuthConfig {
	/// Checks the settings without building anything.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.token_ttl.whole_seconds() <= 0 {
			return Err(ConfigError::NonPositiveTtl);
		}
		if self.token_ttl.whole_seconds() > MAX_TOKEN_EXPIRY_SECS {
			return Err(ConfigError::InvalidValue {
				key: "OAUTH2_TOKEN_EXPIRY",
				reason: format!("must not exceed {MAX_TOKEN_EXPIRY_SECS} seconds"),
			});
		}
		if self.sweep_interval.is_negative()
			|| self.sweep_interval.whole_seconds() > MAX_SWEEP_INTERVAL_SECS
		{
			return Err(ConfigError::InvalidValue {
				key: "OAUTH2_SWEEP_INTERVAL",
				reason: format!("must be between 0 and {MAX_SWEEP_INTERVAL_SECS} seconds"),
			});
		}
		if self.enabled {
			if self.client_id.is_none() {
				return Err(ConfigError::MissingClientCredential { key: "OAUTH2_CLIENT_ID" });
			}
			if self.client_secret.as_ref().is_none_or(TokenSecret::is_empty) {
				return Err(ConfigError::MissingClientCredential { key: "OAUTH2_CLIENT_SECRET" });
			}
		}

		Ok(())
	}

	/// Builds the client registry; empty when OAuth2 is disabled.
	pub fn registry(&self) -> Result<ClientRegistry, ConfigError> {
		self.validate()?;

		let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret) else {
			return Ok(ClientRegistry::default());
		};

		Ok(ClientRegistry::new([Client::new(
			ClientId::new(client_id)?,
			client_secret.expose(),
			"Default Travel Agent Client",
			ScopeSet::travel_agent(),
		)]))
	}

	/// Builds the signing key, generating a random one when no secret is configured.
	pub fn signing_key(&self) -> SigningKey {
		match &self.jwt_secret {
			Some(secret) => SigningKey::from_secret(secret.expose()),
			None => {
				tracing::warn!(
					"OAUTH2_JWT_SECRET is not set; using a random signing key, tokens will not survive a restart."
				);

				SigningKey::random()
			},
		}
	}
}

/// Upstream chat-completions settings.
#[derive(Clone, Debug)]
pub struct LlmConfig {
	/// Base endpoint of the hosted model service.
	pub endpoint: Url,
	/// Upstream client-credentials identifier.
	pub client_id: String,
	/// Upstream client-credentials secret.
	pub client_secret: TokenSecret,
	/// Upstream token endpoint.
	pub token_url: Url,
	/// Scope requested from the upstream token endpoint.
	pub token_scope: String,
	/// Model deployment name.
	pub deployment: String,
	/// `api-version` query parameter.
	pub api_version: String,
	/// Sampling temperature for models that accept one.
	pub temperature: f32,
	/// Completion token cap.
	pub max_tokens: u32,
}
impl LlmConfig {
	const DEFAULT_API_VERSION: &'static str = "2024-02-15-preview";
	const DEFAULT_DEPLOYMENT: &'static str = "gpt-4";
	const DEFAULT_MAX_TOKENS: u32 = 2_000;
	const DEFAULT_TEMPERATURE: f32 = 0.7;

	/// Returns `None` unless the endpoint and all four credential variables are set.
	fn from_lookup<G>(get: &G) -> Result<Option<Self>, ConfigError>
	where
		G: Fn(&str) -> Option<String>,
	{
		let (Some(endpoint), Some(client_id), Some(client_secret), Some(token_url), Some(token_scope)) = (
			get("OPENAI_ENDPOINT"),
			get("CLIENT_ID"),
			get("CLIENT_SECRET"),
			get("TOKEN_URL"),
			get("TOKEN_SCOPE"),
		) else {
			return Ok(None);
		};

		Ok(Some(Self {
			endpoint: parse_url("OPENAI_ENDPOINT", &endpoint)?,
			client_id,
			client_secret: TokenSecret::new(client_secret),
			token_url: parse_url("TOKEN_URL", &token_url)?,
			token_scope,
			deployment: get("OPENAI_DEPLOYMENT").unwrap_or_else(|| Self::DEFAULT_DEPLOYMENT.into()),
			api_version: get("OPENAI_API_VERSION")
				.unwrap_or_else(|| Self::DEFAULT_API_VERSION.into()),
			temperature: parse_or(get, "OPENAI_TEMPERATURE", Self::DEFAULT_TEMPERATURE)?,
			max_tokens: parse_or(get, "OPENAI_MAX_TOKENS", Self::DEFAULT_MAX_TOKENS)?,
		}))
	}

	/// Chat-completions URL for the configured deployment.
	pub fn chat_completions_url(&self) -> Result<Url, ConfigError> {
		let base = self.endpoint.as_str().trim_end_matches('/');
		let mut url = parse_url(
			"OPENAI_ENDPOINT",
			&format!("{base}/openai/deployments/{}/chat/completions", self.deployment),
		)?;

		url.query_pairs_mut().append_pair("api-version", &self.api_version);

		Ok(url)
	}
}

fn parse_or<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
	G: Fn(&str) -> Option<String>,
	T: FromStr,
	T::Err: Display,
{
	match get(key) {
		Some(raw) => raw
			.trim()
			.parse()
			.map_err(|e: T::Err| ConfigError::InvalidValue { key, reason: e.to_string() }),
		None => Ok(default),
	}
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"true" | "1" | "yes" | "on" => Ok(true),
		"false" | "0" | "no" | "off" => Ok(false),
		other => Err(ConfigError::InvalidValue { key, reason: format!("`{other}` is not a boolean") }),
	}
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidValue { key, reason: e.to_string() })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> =
			pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();

		move |key: &str| map.get(key).cloned()
	}

	const CREDENTIALS: [(&str, &str); 2] =
		[("OAUTH2_CLIENT_ID", "travel-agent-client"), ("OAUTH2_CLIENT_SECRET", "s3cret")];

	#[test]
	fn defaults_apply_when_only_credentials_are_set() {
		let config = Config::from_lookup(lookup(&CREDENTIALS)).expect("Config should load.");

		assert_eq!(config.server, ServerConfig::default());
		assert_eq!(config.server.bind_addr(), "0.0.0.0:8080");
		assert!(config.oauth.enabled);
		assert_eq!(config.oauth.token_ttl, Duration::seconds(3_600));
		assert_eq!(config.oauth.sweep_interval, Duration::seconds(300));
		assert!(config.oauth.jwt_secret.is_none());
		assert!(config.llm.is_none());
		assert_eq!(
			config.oauth.registry().expect("Registry should build.").len(),
			1,
			"The configured client should be registered."
		);
	}

	#[test]
	fn enabled_oauth_requires_client_credentials() {
		let err = Config::from_lookup(lookup(&[("OAUTH2_CLIENT_ID", "travel-agent-client")]))
			.expect_err("Missing secret must be rejected.");

		assert!(matches!(err, ConfigError::MissingClientCredential { key: "OAUTH2_CLIENT_SECRET" }));

		let config = Config::from_lookup(lookup(&[("OAUTH2_ENABLED", "false")]))
			.expect("Disabled OAuth2 needs no credentials.");

		assert!(!config.oauth.enabled);
		assert!(config.oauth.registry().expect("Registry should build.").is_empty());
	}

	#[test]
	fn invalid_values_are_reported_with_their_key() {
		let mut pairs = CREDENTIALS.to_vec();

		pairs.push(("PORT", "eighty"));

		let err = Config::from_lookup(lookup(&pairs)).expect_err("Invalid port must be rejected.");

		assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));

		let err = Config::from_lookup(lookup(&[("OAUTH2_ENABLED", "maybe")]))
			.expect_err("Invalid boolean must be rejected.");

		assert!(matches!(err, ConfigError::InvalidValue { key: "OAUTH2_ENABLED", .. }));

		let mut pairs = CREDENTIALS.to_vec();

		pairs.push(("OAUTH2_TOKEN_EXPIRY", "0"));

		assert!(matches!(Config::from_lookup(lookup(&pairs)), Err(ConfigError::NonPositiveTtl)));
	}

	#[test]
	fn out_of_range_durations_are_rejected() {
		let mut pairs = CREDENTIALS.to_vec();

		pairs.push(("OAUTH2_TOKEN_EXPIRY", "400000000000"));

		let err = Config::from_lookup(lookup(&pairs)).expect_err("Oversized TTL must be rejected.");

		assert!(matches!(err, ConfigError::InvalidValue { key: "OAUTH2_TOKEN_EXPIRY", .. }));

		let mut pairs = CREDENTIALS.to_vec();

		pairs.push(("OAUTH2_TOKEN_EXPIRY", "31536000"));

		let config = Config::from_lookup(lookup(&pairs)).expect("A one-year TTL should be accepted.");

		assert_eq!(config.oauth.token_ttl, Duration::seconds(MAX_TOKEN_EXPIRY_SECS));

		let mut pairs = CREDENTIALS.to_vec();

		pairs.push(("OAUTH2_SWEEP_INTERVAL", "-5"));

		let err = Config::from_lookup(lookup(&pairs)).expect_err("Negative interval must be rejected.");

		assert!(matches!(err, ConfigError::InvalidValue { key: "OAUTH2_SWEEP_INTERVAL", .. }));
	}

	#[test]
	fn llm_is_selected_only_when_all_upstream_variables_are_present() {
		let mut pairs = CREDENTIALS.to_vec();

		pairs.extend([
			("OPENAI_ENDPOINT", "https://example.openai.azure.com/"),
			("CLIENT_ID", "upstream-client"),
			("CLIENT_SECRET", "upstream-secret"),
			("TOKEN_URL", "https://login.example.com/oauth2/token"),
		]);

		let config = Config::from_lookup(lookup(&pairs)).expect("Config should load.");

		assert!(config.llm.is_none(), "TOKEN_SCOPE is still missing.");

		pairs.push(("TOKEN_SCOPE", "https://cognitiveservices.azure.com/.default"));

		let llm = Config::from_lookup(lookup(&pairs))
			.expect("Config should load.")
			.llm
			.expect("LLM settings should be selected.");

		assert_eq!(llm.deployment, "gpt-4");
		assert_eq!(llm.max_tokens, 2_000);
		assert_eq!(
			llm.chat_completions_url().expect("URL should build.").as_str(),
			"https://example.openai.azure.com/openai/deployments/gpt-4/chat/completions?api-version=2024-02-15-preview"
		);
	}
}
