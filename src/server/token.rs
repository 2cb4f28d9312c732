//! `POST /oauth/token` endpoint.

// crates.io
use axum::{
	Json,
	body::Bytes,
	extract::State,
	http::{HeaderMap, HeaderValue, StatusCode, header},
	response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
// self
use crate::{_prelude::*, error::IssueError, server::AppState};

/// Token request fields accepted from a form or JSON body.
#[derive(Clone, Debug, Default, Deserialize)]
struct TokenForm {
	#[serde(default)]
	grant_type: Option<String>,
	#[serde(default)]
	client_id: Option<String>,
	#[serde(default)]
	client_secret: Option<String>,
	#[serde(default)]
	scope: Option<String>,
}
impl TokenForm {
	fn from_body(headers: &HeaderMap, body: &[u8]) -> Result<Self, IssueError> {
		let is_json = headers
			.get(header::CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.is_some_and(|value| value.contains("application/json"));

		if is_json {
			return serde_json::from_slice(body)
				.map_err(|_| IssueError::InvalidRequest { reason: "Invalid JSON body" });
		}

		let mut form = Self::default();

		for (key, value) in url::form_urlencoded::parse(body) {
			let slot = match key.as_ref() {
				"grant_type" => &mut form.grant_type,
				"client_id" => &mut form.client_id,
				"client_secret" => &mut form.client_secret,
				"scope" => &mut form.scope,
				_ => continue,
			};

			*slot = Some(value.into_owned());
		}

		Ok(form)
	}

	/// Fills missing credentials from an HTTP Basic `Authorization` header.
	fn with_basic_credentials(mut self, headers: &HeaderMap) -> Self {
		let has_body_credentials = self.client_id.as_deref().is_some_and(|id| !id.is_empty())
			&& self.client_secret.as_deref().is_some_and(|secret| !secret.is_empty());

		if has_body_credentials {
			return self;
		}
		if let Some((client_id, client_secret)) = basic_credentials(headers) {
			self.client_id = Some(client_id);
			self.client_secret = Some(client_secret);
		}

		self
	}
}

impl IntoResponse for IssueError {
	fn into_response(self) -> Response {
		let status = match &self {
			IssueError::InvalidClient => StatusCode::UNAUTHORIZED,
			e if e.is_server_fault() => {
				tracing::error!(error = %e, "Token issuance failed.");

				StatusCode::INTERNAL_SERVER_ERROR
			},
			_ => StatusCode::BAD_REQUEST,
		};
		let description = match &self {
			IssueError::InvalidRequest { reason } => (*reason).to_owned(),
			IssueError::InvalidGrantType { .. } =>
				"Only 'client_credentials' grant type is supported".to_owned(),
			e if e.is_server_fault() => "Access token could not be issued".to_owned(),
			e => e.to_string(),
		};
		let body = Json(serde_json::json!({
			"error": self.oauth_code(),
			"error_description": description,
		}));
		let mut response = (status, body).into_response();

		if status == StatusCode::UNAUTHORIZED {
			response.headers_mut().insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
		}

		no_store(response)
	}
}

/// Issues a client-credentials access token.
pub async fn issue(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
	let form = match TokenForm::from_body(&headers, &body) {
		Ok(form) => form.with_basic_credentials(&headers),
		Err(e) => return e.into_response(),
	};
	let result = state
		.issuer
		.issue(
			form.grant_type.as_deref().unwrap_or_default(),
			form.client_id.as_deref().unwrap_or_default(),
			form.client_secret.as_deref().unwrap_or_default(),
			form.scope.as_deref(),
		)
		.await;

	match result {
		Ok(issued) => no_store(Json(issued).into_response()),
		Err(e) => {
			tracing::info!(reason = e.oauth_code(), "Rejected token request.");

			e.into_response()
		},
	}
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
	let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
	let (scheme, encoded) = value.trim().split_once(' ')?;

	if !scheme.eq_ignore_ascii_case("basic") {
		return None;
	}

	let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
	let (client_id, client_secret) = decoded.split_once(':')?;

	Some((client_id.to_owned(), client_secret.to_owned()))
}

fn no_store(mut response: Response) -> Response {
	let headers = response.headers_mut();

	headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
	headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));

	response
}
