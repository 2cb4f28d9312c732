//! LLM-backed responder talking to a hosted chat-completions deployment.

pub mod credential;

// crates.io
use reqwest::{StatusCode, redirect::Policy};
// self
use crate::{
	_prelude::*,
	agent::{
		AgentError, AgentFuture, AgentHandler, AgentMode, ChatMessage, Conversation,
		RuleBasedHandler, llm::credential::UpstreamCredentials,
	},
	config::LlmConfig,
	error::ConfigError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Instructions pinned as the first message of every request.
pub const SYSTEM_PROMPT: &str = "You are an expert travel agent with extensive knowledge of destinations worldwide.
Your role is to help users plan amazing trips by providing personalized recommendations, detailed itineraries,
and comprehensive travel advice.

CONVERSATION FLOW (follow this strictly):

**PHASE 1 - Ask All Questions (FIRST MESSAGE ONLY):**
When user mentions a destination, respond with ALL questions in ONE message:

\"Great choice! To create your perfect [destination] trip, please share:

1. 📍 Origin city (where you'll fly from)
2. 📅 Travel dates or duration (e.g., '7 days' or 'March 15-22')
3. 👥 Number of travelers
4. 💰 Total budget per person (in USD)
5. 🎯 Interests (pick any): culture, food, adventure, relaxation, nightlife, shopping, nature, history
6. 🏨 Accommodation preference: budget hostel / mid-range hotel / luxury
7. 🚶 Pace preference: relaxed / balanced / action-packed

Answer all at once - I'll create your complete plan immediately!\"

**PHASE 2 - LOCKED-IN BUDGET & ITINERARY (after user answers):**
Once user provides answers, IMMEDIATELY create and present:

🔒 **LOCKED-IN BUDGET**
```
━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
✈️  Flights (round-trip):     $XXX
🏨 Accommodation (X nights):  $XXX
🎭 Activities & Tours:        $XXX
🍽️  Food & Dining:            $XXX
🚇 Local Transportation:      $XXX
💼 Miscellaneous (10%):       $XXX
━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
💰 TOTAL PER PERSON:          $X,XXX
━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
```

📅 **YOUR ITINERARY**

**Day 1: [Theme]**
🌅 Morning: [Activity] - [Location]
🌞 Afternoon: [Activity] - [Location]
🌙 Evening: [Activity] - [Location]

[Continue for all days...]

---
🔒 **This budget and itinerary are now LOCKED IN as your base plan.**

Want to enhance it? Tell me:
- Specific neighborhoods to stay in
- Must-visit restaurants or attractions
- More luxury or budget options
- Different activity preferences

I'll adjust the plan and show you the updated budget!

**PHASE 3 - ENHANCEMENTS (only if user provides more details):**
When user provides additional preferences:
1. Update the itinerary with their specific requests
2. Recalculate and show the NEW budget if costs change
3. Clearly show what changed: \"📝 **Updated based on your preferences:**\"
4. Show the delta: \"Budget change: $X,XXX → $X,XXX (+/- $XXX)\"

**PHASE 4 - CONFIRMATION & CLOSURE:**
When user says: looks good / perfect / confirmed / done / thanks / happy with this / let's go:

✅ **FINAL TRIP SUMMARY**
[Show final itinerary + budget]

📋 **BOOKING CHECKLIST:**
- Flights: Book on Skyscanner, Google Flights, or directly with airlines
- Hotels: Check Booking.com, Hotels.com, or Airbnb
- Activities: Book popular attractions in advance on Viator or GetYourGuide
- Travel Insurance: Recommended for international trips

✅ **Your trip plan is complete!** Safe travels and enjoy [destination]! 🌍✈️

CRITICAL RULES:
- NEVER give blank/empty responses
- Ask ALL questions in ONE message (Phase 1)
- IMMEDIATELY create full locked-in budget + itinerary after user answers (Phase 2)
- Only update budget/itinerary when user asks for changes (Phase 3)
- Show budget in clear table format with totals
- Always show per-person costs in USD";

/// Deployment-name prefixes of models that take `max_completion_tokens` and reject `temperature`.
const COMPLETION_TOKEN_PREFIXES: [&str; 4] = ["gpt-5", "gpt5", "o1", "o3"];

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
	messages: &'a [ChatMessage],
	stream: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	temperature: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	max_tokens: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	max_completion_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
	#[serde(default)]
	choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
	message: Option<ChatChoiceMessage>,
	#[serde(default)]
	finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
	#[serde(default)]
	content: Option<String>,
}

/// Client for one chat-completions deployment.
#[derive(Debug)]
pub struct ChatClient {
	http: ReqwestClient,
	url: Url,
	credentials: UpstreamCredentials,
	deployment: String,
	temperature: f32,
	max_tokens: u32,
}
impl ChatClient {
	/// Builds a client with a redirect-free HTTP transport.
	pub fn from_config(config: &LlmConfig) -> Result<Self, ConfigError> {
		let http = ReqwestClient::builder().redirect(Policy::none()).build()?;

		Self::with_http_client(config, http)
	}

	/// Builds a client on top of a caller-provided HTTP transport.
	pub fn with_http_client(config: &LlmConfig, http: ReqwestClient) -> Result<Self, ConfigError> {
		Ok(Self {
			url: config.chat_completions_url()?,
			credentials: UpstreamCredentials::new(config, http.clone())?,
			http,
			deployment: config.deployment.clone(),
			temperature: config.temperature,
			max_tokens: config.max_tokens,
		})
	}

	/// Returns `true` when the deployment takes `max_completion_tokens` and no `temperature`.
	pub fn uses_completion_tokens(&self) -> bool {
		let deployment = self.deployment.to_lowercase();

		COMPLETION_TOKEN_PREFIXES.iter().any(|prefix| deployment.starts_with(prefix))
	}

	/// Upstream token source.
	pub fn credentials(&self) -> &UpstreamCredentials {
		&self.credentials
	}

	/// Sends `messages` and returns the reply text.
	///
	/// Empty content maps to an apology chosen by the finish reason.
	pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
		const KIND: FlowKind = FlowKind::ChatCompletion;

		let span = FlowSpan::new(KIND, "complete");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.send(messages)).await;

		obs::record_result(KIND, &result);

		result
	}

	async fn send(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
		let bearer = self.credentials.bearer().await?;
		let response = self
			.http
			.post(self.url.clone())
			.bearer_auth(bearer.expose())
			.json(&self.payload(messages))
			.send()
			.await?;
		let status = response.status();

		if !status.is_success() {
			if status == StatusCode::UNAUTHORIZED {
				self.credentials.invalidate().await;
			}

			return Err(AgentError::UpstreamStatus {
				status: status.as_u16(),
				message: self.status_hint(status),
			});
		}

		let bytes = response.bytes().await?;
		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
		let body: ChatResponse = serde_path_to_error::deserialize(&mut deserializer)?;
		let choice =
			body.choices.into_iter().next().ok_or(AgentError::MalformedResponse { missing: "choices" })?;
		let content = choice.message.and_then(|message| message.content).unwrap_or_default();

		if content.trim().is_empty() {
			tracing::warn!(finish_reason = ?choice.finish_reason, "Model returned empty content.");

			return Ok(empty_reply(choice.finish_reason.as_deref()).into());
		}

		Ok(content)
	}

	fn payload<'a>(&self, messages: &'a [ChatMessage]) -> ChatRequest<'a> {
		if self.uses_completion_tokens() {
			ChatRequest {
				messages,
				stream: false,
				temperature: None,
				max_tokens: None,
				max_completion_tokens: Some(self.max_tokens),
			}
		} else {
			ChatRequest {
				messages,
				stream: false,
				temperature: Some(self.temperature),
				max_tokens: Some(self.max_tokens),
				max_completion_tokens: None,
			}
		}
	}

	fn status_hint(&self, status: StatusCode) -> String {
		match status {
			StatusCode::BAD_REQUEST => format!(
				"Bad Request. Check the deployment name '{}' and API version.",
				self.deployment
			),
			StatusCode::UNAUTHORIZED =>
				"Authentication failed. Check CLIENT_ID and CLIENT_SECRET.".into(),
			StatusCode::NOT_FOUND => format!("Deployment '{}' not found.", self.deployment),
			StatusCode::TOO_MANY_REQUESTS => "Rate limit exceeded. Please wait and try again.".into(),
			_ => "Model endpoint request failed.".into(),
		}
	}
}

/// Responder that forwards the conversation to a chat-completions deployment.
///
/// Upstream failures degrade to the rule-based reply; the error is logged, never returned.
#[derive(Debug)]
pub struct LlmBackedHandler {
	client: ChatClient,
	fallback: RuleBasedHandler,
}
impl LlmBackedHandler {
	/// Pairs a chat client with the rule-based fallback.
	pub fn new(client: ChatClient, fallback: RuleBasedHandler) -> Self {
		Self { client, fallback }
	}

	/// Underlying chat client.
	pub fn client(&self) -> &ChatClient {
		&self.client
	}
}
impl AgentHandler for LlmBackedHandler {
	fn mode(&self) -> AgentMode {
		AgentMode::LlmBacked
	}

	fn respond<'a>(
		&'a self,
		conversation: &'a mut Conversation,
		text: &'a str,
	) -> AgentFuture<'a, String> {
		Box::pin(async move {
			self.fallback.extract(text, &mut conversation.trip);

			let prompt = match conversation.trip.summary() {
				Some(summary) => format!("{text}\n\nContext: {summary}"),
				None => text.to_owned(),
			};

			conversation.history.push(ChatMessage::user(prompt));

			let messages = conversation.history.to_messages(SYSTEM_PROMPT);
			let reply = match self.client.complete(&messages).await {
				Ok(reply) => reply,
				Err(e) => {
					tracing::warn!(error = %e, "Chat completion failed; using the rule-based reply.");

					self.fallback.reply_to(&conversation.trip, text)
				},
			};

			conversation.history.push(ChatMessage::assistant(reply.clone()));

			Ok(reply)
		})
	}
}

fn empty_reply(finish_reason: Option<&str>) -> &'static str {
	match finish_reason {
		Some("content_filter") =>
			"I apologize, but I couldn't generate a response due to content filtering. Please try \
			rephrasing your request.",
		Some("length") =>
			"My response was cut off due to length limits. Let me try to be more concise. Could you \
			repeat your question?",
		_ => "I'm sorry, I couldn't generate a response. Please try again.",
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;
	use crate::agent::{ChatRole, TripField};

	const CHAT_PATH: &str = "/openai/deployments/gpt-4/chat/completions";

	fn config(server: &MockServer, deployment: &str) -> LlmConfig {
		LlmConfig {
			endpoint: Url::parse(&server.base_url()).expect("Mock endpoint should parse."),
			client_id: "upstream-client".into(),
			client_secret: "upstream-secret".into(),
			token_url: Url::parse(&server.url("/token")).expect("Mock token URL should parse."),
			token_scope: "api://model/.default".into(),
			deployment: deployment.into(),
			api_version: "2024-02-15-preview".into(),
			temperature: 0.7,
			max_tokens: 2_000,
		}
	}

	async fn mock_token(server: &MockServer) {
		server
			.mock_async(|when, then| {
				when.method(POST).path("/token");
				then.status(200).header("content-type", "application/json").json_body(
					serde_json::json!({
						"access_token": "upstream-token",
						"token_type": "Bearer",
						"expires_in": 3600,
					}),
				);
			})
			.await;
	}

	fn handler(server: &MockServer) -> LlmBackedHandler {
		LlmBackedHandler::new(
			ChatClient::from_config(&config(server, "gpt-4")).expect("Chat client should build."),
			RuleBasedHandler::new().expect("Fallback should build."),
		)
	}

	#[test]
	fn newer_models_use_completion_tokens_without_temperature() {
		let server = MockServer::start();

		for (deployment, completion) in
			[("gpt-4", false), ("GPT-5-mini", true), ("gpt5", true), ("o1-preview", true), ("o3", true)]
		{
			let client = ChatClient::from_config(&config(&server, deployment))
				.expect("Chat client should build.");
			let messages = [ChatMessage::user("hi")];
			let payload = serde_json::to_value(client.payload(&messages))
				.expect("Payload should serialize.");

			assert_eq!(client.uses_completion_tokens(), completion, "{deployment}");
			assert_eq!(payload.get("temperature").is_none(), completion, "{deployment}");
			assert_eq!(payload.get("max_completion_tokens").is_some(), completion, "{deployment}");
			assert_eq!(payload.get("max_tokens").is_some(), !completion, "{deployment}");
		}
	}

	#[test]
	fn empty_content_apology_follows_finish_reason() {
		assert!(empty_reply(Some("content_filter")).contains("content filtering"));
		assert!(empty_reply(Some("length")).contains("cut off due to length limits"));
		assert_eq!(
			empty_reply(Some("stop")),
			"I'm sorry, I couldn't generate a response. Please try again."
		);
	}

	#[tokio::test]
	async fn completion_sends_bearer_and_records_turns() {
		let server = MockServer::start_async().await;

		mock_token(&server).await;

		let chat = server
			.mock_async(|when, then| {
				when.method(POST)
					.path(CHAT_PATH)
					.query_param("api-version", "2024-02-15-preview")
					.header("authorization", "Bearer upstream-token")
					.body_includes("Context: destination: Paris, duration: 5");
				then.status(200).header("content-type", "application/json").json_body(
					serde_json::json!({
						"choices": [{
							"message": { "role": "assistant", "content": "Bonjour! Let's plan Paris." },
							"finish_reason": "stop",
						}],
					}),
				);
			})
			.await;
		let handler = handler(&server);
		let mut conversation = Conversation::default();
		let reply = handler
			.respond(&mut conversation, "Plan 5 days in Paris")
			.await
			.expect("LLM handler should reply.");

		assert_eq!(reply, "Bonjour! Let's plan Paris.");
		assert_eq!(conversation.history.len(), 2);
		assert_eq!(
			conversation.history.iter().map(|m| m.role).collect::<Vec<_>>(),
			[ChatRole::User, ChatRole::Assistant]
		);

		chat.assert_async().await;
	}

	#[tokio::test]
	async fn upstream_failure_falls_back_to_rule_based_reply() {
		let server = MockServer::start_async().await;

		mock_token(&server).await;
		server
			.mock_async(|when, then| {
				when.method(POST).path(CHAT_PATH);
				then.status(429);
			})
			.await;

		let handler = handler(&server);
		let mut conversation = Conversation::default();
		let reply = handler
			.respond(&mut conversation, "I want to plan a trip")
			.await
			.expect("Fallback should still produce a reply.");

		assert_eq!(reply, TripField::Destination.question());
		assert_eq!(conversation.history.len(), 2);
	}

	#[tokio::test]
	async fn status_errors_carry_operator_hints() {
		let server = MockServer::start_async().await;

		mock_token(&server).await;
		server
			.mock_async(|when, then| {
				when.method(POST).path(CHAT_PATH);
				then.status(404);
			})
			.await;

		let client =
			ChatClient::from_config(&config(&server, "gpt-4")).expect("Chat client should build.");
		let err = client
			.complete(&[ChatMessage::user("hi")])
			.await
			.expect_err("A 404 should surface as an error.");

		assert!(matches!(
			err,
			AgentError::UpstreamStatus { status: 404, ref message } if message.contains("gpt-4")
		));
	}

	#[tokio::test]
	async fn malformed_body_reports_decode_error() {
		let server = MockServer::start_async().await;

		mock_token(&server).await;
		server
			.mock_async(|when, then| {
				when.method(POST).path(CHAT_PATH);
				then.status(200)
					.header("content-type", "application/json")
					.json_body(serde_json::json!({ "choices": "nope" }));
			})
			.await;

		let client =
			ChatClient::from_config(&config(&server, "gpt-4")).expect("Chat client should build.");

		assert!(matches!(
			client.complete(&[ChatMessage::user("hi")]).await,
			Err(AgentError::Decode(_))
		));
	}
}
