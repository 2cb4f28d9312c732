//! Bearer-token gate in front of every non-public route.

// crates.io
use axum::{
	Json,
	extract::{Request, State},
	http::{HeaderMap, HeaderValue, Method, StatusCode, header},
	middleware::Next,
	response::{IntoResponse, Response},
};
// self
use crate::{
	_prelude::*,
	a2a::TOKEN_PATH,
	auth::ScopeSet,
	error::ValidationError,
	server::{AGENT_CARD_PATH, AppState, HEALTH_PATH, LEGACY_AGENT_CARD_PATH},
};

/// Reasons a protected request is turned away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum AuthRejection {
	/// No `Authorization: Bearer` header was sent.
	#[error("Bearer token required")]
	MissingBearer,
	/// The bearer token failed validation.
	#[error("Invalid or expired access token")]
	InvalidToken(ValidationError),
}
impl IntoResponse for AuthRejection {
	fn into_response(self) -> Response {
		let (code, challenge) = match self {
			AuthRejection::MissingBearer => ("unauthorized", "Bearer"),
			AuthRejection::InvalidToken(_) => ("invalid_token", r#"Bearer error="invalid_token""#),
		};
		let body = Json(serde_json::json!({
			"error": code,
			"error_description": self.to_string(),
		}));
		let mut response = (StatusCode::UNAUTHORIZED, body).into_response();

		response.headers_mut().insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));

		response
	}
}

/// Returns `true` for routes served without a bearer token.
pub fn is_public(method: &Method, path: &str) -> bool {
	matches!(path, AGENT_CARD_PATH | LEGACY_AGENT_CARD_PATH | TOKEN_PATH | HEALTH_PATH)
		|| (method == Method::GET && path == "/")
}

/// Validates the bearer token and stores the caller's
/// [`ClientIdentity`](crate::auth::ClientIdentity) in the request extensions.
pub async fn require_bearer(
	State(state): State<AppState>,
	mut request: Request,
	next: Next,
) -> Response {
	if !state.oauth_enabled || is_public(request.method(), request.uri().path()) {
		return next.run(request).await;
	}

	let Some(bearer) = bearer_token(request.headers()) else {
		return AuthRejection::MissingBearer.into_response();
	};

	match state.validator.validate(bearer, &ScopeSet::travel_agent()).await {
		Ok(identity) => {
			request.extensions_mut().insert(identity);

			next.run(request).await
		},
		Err(e) => {
			tracing::info!(
				reason = e.reason_code(),
				path = request.uri().path(),
				"Rejected bearer token."
			);

			AuthRejection::InvalidToken(e).into_response()
		},
	}
}

/// Extracts the token from an `Authorization: Bearer` header; the scheme is case-insensitive.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
	let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
	let (scheme, token) = value.trim().split_once(' ')?;
	let token = token.trim();

	(scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
