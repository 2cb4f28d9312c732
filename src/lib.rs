//! A2A travel agent served behind an in-process OAuth 2.0 client-credentials issuer.
//!
//! Bearer tokens minted by the service gate its JSON-RPC endpoint. Replies come from a hosted chat
//! model when one is configured and from the built-in rule engine otherwise.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod a2a;
pub mod agent;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod issuer;
pub mod obs;
pub mod server;
pub mod store;
pub mod validator;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// crates.io
	use axum::{Router, body::Body, http::Request};
	// self
	use crate::{
		config::{Config, OAuthConfig, ServerConfig},
		server::{self, AppState},
	};

	/// Client identifier registered by [`test_config`].
	pub const TEST_CLIENT_ID: &str = "travel-agent-client";
	/// Client secret registered by [`test_config`].
	pub const TEST_CLIENT_SECRET: &str = "travel-agent-secret";
	/// Signing secret used by [`test_config`].
	pub const TEST_JWT_SECRET: &str = "test-signing-secret-with-enough-entropy";

	/// Builds a configuration with OAuth2 enabled, the test client registered, and no LLM
	/// upstream (rule-based replies).
	pub fn test_config() -> Config {
		Config {
			server: ServerConfig::default(),
			oauth: OAuthConfig {
				enabled: true,
				client_id: Some(TEST_CLIENT_ID.into()),
				client_secret: Some(TEST_CLIENT_SECRET.into()),
				jwt_secret: Some(TEST_JWT_SECRET.into()),
				token_ttl: Duration::seconds(3_600),
				sweep_interval: Duration::ZERO,
			},
			llm: None,
		}
	}

	/// Builds the application state and router for the provided configuration.
	pub fn build_test_app(config: &Config) -> (Router, AppState) {
		let state = AppState::from_config(config)
			.expect("Test configuration should produce a valid application state.");
		let router = server::router(state.clone());

		(router, state)
	}

	/// Builds a form-encoded token request for the provided credentials and scope.
	pub fn token_request(client_id: &str, client_secret: &str, scope: Option<&str>) -> Request<Body> {
		let mut body = url::form_urlencoded::Serializer::new(String::new());

		body.append_pair("grant_type", "client_credentials")
			.append_pair("client_id", client_id)
			.append_pair("client_secret", client_secret);

		if let Some(scope) = scope {
			body.append_pair("scope", scope);
		}

		Request::post("/oauth/token")
			.header("content-type", "application/x-www-form-urlencoded")
			.body(Body::from(body.finish()))
			.expect("Token request fixture should build.")
	}

	/// Builds a `message/send` JSON-RPC request with an optional bearer token.
	pub fn message_send_request(text: &str, bearer: Option<&str>) -> Request<Body> {
		let payload = serde_json::json!({
			"jsonrpc": "2.0",
			"id": "req-1",
			"method": "message/send",
			"params": {
				"message": {
					"role": "user",
					"messageId": "msg-1",
					"contextId": "ctx-1",
					"taskId": "task-1",
					"parts": [{ "kind": "text", "text": text }],
				},
			},
		});
		let mut builder = Request::post("/").header("content-type", "application/json");

		if let Some(token) = bearer {
			builder = builder.header("authorization", format!("Bearer {token}"));
		}

		builder.body(Body::from(payload.to_string())).expect("JSON-RPC request fixture should build.")
	}

	/// Drains a response body into JSON.
	pub async fn body_json(body: Body) -> serde_json::Value {
		let bytes = axum::body::to_bytes(body, usize::MAX)
			.await
			.expect("Response body should be readable.");

		serde_json::from_slice(&bytes).expect("Response body should be valid JSON.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use url;
#[cfg(test)] use {httpmock as _, tower as _};
use {color_eyre as _, tracing_subscriber as _};
