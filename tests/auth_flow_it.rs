// crates.io
use axum::{
	Router,
	body::Body,
	http::{Request, StatusCode, header},
};
use time::macros;
use tower::ServiceExt;
// self
use a2a_travel_agent::{
	_preludet::*,
	auth::ScopeSet,
	error::ValidationError,
	issuer::{SigningKey, TokenIssuer},
	store::MemoryStore,
	validator::TokenValidator,
};

async fn issue_token(app: &Router) -> String {
	let response = app
		.clone()
		.oneshot(token_request(TEST_CLIENT_ID, TEST_CLIENT_SECRET, None))
		.await
		.expect("Token endpoint should respond.");

	assert_eq!(response.status(), StatusCode::OK);

	body_json(response.into_body()).await["access_token"]
		.as_str()
		.expect("Token response should carry an access token.")
		.to_owned()
}

#[tokio::test]
async fn issued_token_unlocks_json_rpc() {
	let (app, _) = build_test_app(&test_config());
	let token = issue_token(&app).await;
	let response = app
		.oneshot(message_send_request("Plan a trip to Paris", Some(&token)))
		.await
		.expect("JSON-RPC endpoint should respond.");

	assert_eq!(response.status(), StatusCode::OK);

	let body = body_json(response.into_body()).await;

	assert_eq!(body["jsonrpc"], "2.0");
	assert_eq!(body["id"], "req-1");
	assert_eq!(body["result"]["id"], "task-1");
	assert_eq!(body["result"]["contextId"], "ctx-1");
	assert_eq!(body["result"]["status"]["state"], "completed");
}

#[tokio::test]
async fn missing_and_invalid_bearers_are_rejected() {
	let (app, _) = build_test_app(&test_config());
	let missing = app
		.clone()
		.oneshot(message_send_request("hello", None))
		.await
		.expect("Middleware should respond.");

	assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
	assert_eq!(missing.headers()[header::WWW_AUTHENTICATE], "Bearer");
	assert_eq!(body_json(missing.into_body()).await["error"], "unauthorized");

	let invalid = app
		.oneshot(message_send_request("hello", Some("not-a-token")))
		.await
		.expect("Middleware should respond.");

	assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
	assert_eq!(invalid.headers()[header::WWW_AUTHENTICATE], r#"Bearer error="invalid_token""#);

	let body = body_json(invalid.into_body()).await;

	assert_eq!(body["error"], "invalid_token");
	assert_eq!(body["error_description"], "Invalid or expired access token");
}

#[tokio::test]
async fn public_routes_need_no_header() {
	let (app, _) = build_test_app(&test_config());

	for path in ["/.well-known/agent-card.json", "/.well-known/agent.json", "/health", "/"] {
		let response = app
			.clone()
			.oneshot(Request::get(path).body(Body::empty()).expect("Request should build."))
			.await
			.expect("Public route should respond.");

		assert_eq!(response.status(), StatusCode::OK, "`{path}` should be public.");
	}
}

#[tokio::test]
async fn disabled_oauth_serves_protected_routes() {
	let mut config = test_config();

	config.oauth.enabled = false;

	let (app, _) = build_test_app(&config);
	let response = app
		.oneshot(message_send_request("What should I pack?", None))
		.await
		.expect("JSON-RPC endpoint should respond.");

	assert_eq!(response.status(), StatusCode::OK);
	assert!(body_json(response.into_body()).await.get("result").is_some());
}

#[tokio::test]
async fn revoked_token_is_rejected() {
	let (app, state) = build_test_app(&test_config());
	let token = issue_token(&app).await;

	assert!(state.issuer.revoke(&token).await.expect("Revocation should succeed."));

	let response = app
		.oneshot(message_send_request("hello", Some(&token)))
		.await
		.expect("Middleware should respond.");

	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_lifecycle_and_foreign_secrets() {
	let store = Arc::new(MemoryStore::default());
	let config = test_config();
	let key = SigningKey::from_secret(TEST_JWT_SECRET);
	let issuer = TokenIssuer::new(
		config.oauth.registry().expect("Registry should build."),
		store.clone(),
		key.clone(),
		Duration::seconds(3_600),
	);
	let issued_at = macros::datetime!(2025-06-01 12:00 UTC);
	let issued = issuer
		.issue_at("client_credentials", TEST_CLIENT_ID, TEST_CLIENT_SECRET, None, issued_at)
		.await
		.expect("Issuance should succeed.");
	let validator = TokenValidator::new(key).with_store(store.clone());
	let required = ScopeSet::travel_agent();
	let token = issued.access_token.expose();
	let first = validator
		.validate_at(token, &required, macros::datetime!(2025-06-01 12:59:59 UTC))
		.await
		.expect("Token should be valid before expiry.");
	let second = validator
		.validate_at(token, &required, macros::datetime!(2025-06-01 12:59:59 UTC))
		.await
		.expect("Validation should be repeatable.");

	assert_eq!(first, second);
	assert_eq!(&*first.client_id, TEST_CLIENT_ID);
	assert_eq!(store.len(), 1);
	assert_eq!(
		validator.validate_at(token, &required, macros::datetime!(2025-06-01 13:00 UTC)).await,
		Err(ValidationError::ExpiredToken)
	);

	let foreign = TokenValidator::new(SigningKey::from_secret("some-other-secret"));

	assert_eq!(
		foreign.validate_at(token, &required, issued_at).await,
		Err(ValidationError::MalformedToken)
	);
}
