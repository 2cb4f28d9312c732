//! Axum router in front of the token issuer and the JSON-RPC dispatcher.

pub mod middleware;
pub mod token;

// crates.io
use axum::{
	Extension, Json, Router,
	body::Bytes,
	extract::State,
	http::{HeaderMap, StatusCode},
	middleware as axum_middleware,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use tower_http::trace::TraceLayer;
// self
use crate::{
	_prelude::*,
	a2a::{AgentCard, ErrorCode, TOKEN_PATH, public_base_url},
	agent::{self, AgentHandler},
	auth::ClientIdentity,
	config::{Config, ServerConfig},
	dispatch::Dispatcher,
	issuer::TokenIssuer,
	store::{MemoryStore, TokenStore},
	validator::TokenValidator,
};

/// Current agent card path.
pub const AGENT_CARD_PATH: &str = "/.well-known/agent-card.json";
/// Legacy agent card path.
pub const LEGACY_AGENT_CARD_PATH: &str = "/.well-known/agent.json";
/// Health probe path.
pub const HEALTH_PATH: &str = "/health";

/// State shared by every route.
#[derive(Clone, Debug)]
pub struct AppState {
	/// Token endpoint backend.
	pub issuer: TokenIssuer,
	/// Bearer token checks used by the auth middleware.
	pub validator: TokenValidator,
	/// JSON-RPC dispatcher.
	pub dispatcher: Dispatcher,
	/// Whether bearer tokens are enforced.
	pub oauth_enabled: bool,
	/// Listener and card settings.
	pub server: ServerConfig,
}
impl AppState {
	/// Builds the state from configuration, selecting the agent handler on the way.
	pub fn from_config(config: &Config) -> Result<Self> {
		let handler = agent::select_handler(config.llm.as_ref())?;

		Self::with_handler(config, handler)
	}

	/// Builds the state around an explicit agent handler.
	pub fn with_handler(config: &Config, handler: Arc<dyn AgentHandler>) -> Result<Self> {
		let store: Arc<dyn TokenStore> = Arc::new(MemoryStore::default());
		let key = config.oauth.signing_key();
		let issuer = TokenIssuer::new(
			config.oauth.registry()?,
			store.clone(),
			key.clone(),
			config.oauth.token_ttl,
		);
		let validator = TokenValidator::new(key).with_store(store);

		if !config.oauth.enabled {
			tracing::warn!("OAuth2 is disabled; every route is served without authentication.");
		}

		Ok(Self {
			issuer,
			validator,
			dispatcher: Dispatcher::new(handler, config.oauth.enabled),
			oauth_enabled: config.oauth.enabled,
			server: config.server.clone(),
		})
	}
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/", get(agent_card).post(json_rpc))
		.route(AGENT_CARD_PATH, get(agent_card))
		.route(LEGACY_AGENT_CARD_PATH, get(agent_card))
		.route(HEALTH_PATH, get(health))
		.route(TOKEN_PATH, post(token::issue))
		.layer(axum_middleware::from_fn_with_state(state.clone(), middleware::require_bearer))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// Periodically purges expired tokens; returns `None` when the interval is zero.
pub fn spawn_expiry_sweeper(
	store: Arc<dyn TokenStore>,
	interval: Duration,
) -> Option<tokio::task::JoinHandle<()>> {
	let period = std::time::Duration::try_from(interval).ok().filter(|period| !period.is_zero())?;

	Some(tokio::spawn(async move {
		let mut ticker = tokio::time::interval(period);

		// The first tick completes immediately.
		ticker.tick().await;

		loop {
			ticker.tick().await;

			match store.purge_expired(OffsetDateTime::now_utc()).await {
				Ok(0) => {},
				Ok(removed) => tracing::debug!(removed, "Purged expired access tokens."),
				Err(e) => tracing::warn!(error = %e, "Failed to purge expired access tokens."),
			}
		}
	}))
}

async fn agent_card(State(state): State<AppState>, headers: HeaderMap) -> Json<AgentCard> {
	let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
	let url = public_base_url(
		header("x-forwarded-host"),
		header("host"),
		state.server.public_host.as_deref(),
		state.server.port,
	);

	Json(AgentCard::travel_agent(state.server.version.clone(), url, state.oauth_enabled))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
	Json(serde_json::json!({
		"status": "healthy",
		"agent": "Travel Agent",
		"version": state.server.version,
	}))
}

async fn json_rpc(
	State(state): State<AppState>,
	identity: Option<Extension<ClientIdentity>>,
	body: Bytes,
) -> Response {
	let identity = identity.map(|Extension(identity)| identity);
	let response = state.dispatcher.handle_bytes(&body, identity.as_ref()).await;
	let status = match response.as_error() {
		Some(error) if error.is(ErrorCode::Unauthorized) => StatusCode::UNAUTHORIZED,
		_ => StatusCode::OK,
	};

	(status, Json(response)).into_response()
}
