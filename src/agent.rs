//! Agent handlers that turn inbound text into travel-planning replies.
//!
//! One [`AgentHandler`] is chosen at startup: [`LlmBackedHandler`] when upstream credentials are
//! configured, [`RuleBasedHandler`] otherwise. Per-context state lives in [`ConversationStore`].

pub mod history;
pub mod llm;
pub mod rules;

pub use history::*;
pub use llm::{ChatClient, LlmBackedHandler, SYSTEM_PROMPT, credential::UpstreamCredentials};
pub use rules::*;

// self
use crate::{_prelude::*, auth::ContextId, config::LlmConfig};

/// Boxed future returned by [`AgentHandler`] operations.
pub type AgentFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AgentError>> + 'a + Send>>;

/// Capability shared by the LLM-backed and rule-based responders.
pub trait AgentHandler
where
	Self: Send + Sync,
{
	/// Reports which responder is active.
	fn mode(&self) -> AgentMode;

	/// Produces a reply to `text`, updating the conversation's history and trip facts.
	fn respond<'a>(
		&'a self,
		conversation: &'a mut Conversation,
		text: &'a str,
	) -> AgentFuture<'a, String>;
}

/// Responder variant selected at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
	/// Keyword intent detection with template replies.
	RuleBased,
	/// Hosted chat-completions model.
	LlmBacked,
}
impl AgentMode {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			AgentMode::RuleBased => "rule_based",
			AgentMode::LlmBacked => "llm_backed",
		}
	}
}

/// Failures raised while producing a reply.
#[derive(Debug, ThisError)]
pub enum AgentError {
	/// A built-in extraction pattern failed to compile.
	#[error("Trip extraction pattern is invalid.")]
	Pattern(#[from] regex::Error),
	/// The upstream token endpoint rejected or failed the client-credentials exchange.
	#[error("Upstream token request failed: {message}.")]
	UpstreamToken {
		/// Provider- or transport-supplied message.
		message: String,
	},
	/// Network failure while calling an upstream endpoint.
	#[error("Network error occurred while calling the model endpoint.")]
	Transport(#[from] ReqwestError),
	/// The chat-completions endpoint answered with a non-success status.
	#[error("Model endpoint returned HTTP {status}: {message}")]
	UpstreamStatus {
		/// HTTP status code.
		status: u16,
		/// Operator-facing hint for the status.
		message: String,
	},
	/// An upstream response body could not be decoded.
	#[error("Model endpoint returned malformed JSON.")]
	Decode(#[from] serde_path_to_error::Error<serde_json::error::Error>),
	/// An upstream response decoded but lacked the expected structure.
	#[error("Model endpoint response is missing {missing}.")]
	MalformedResponse {
		/// Description of the missing element.
		missing: &'static str,
	},
}

/// Per-context state: bounded chat history plus the trip facts extracted so far.
#[derive(Clone, Debug, Default)]
pub struct Conversation {
	/// Retained user/assistant turns.
	pub history: ChatHistory,
	/// Facts gathered from every message in the context.
	pub trip: TripContext,
}

/// Default number of conversations kept before the least recently used is evicted.
pub const DEFAULT_CONVERSATION_CAPACITY: usize = 1_000;

type SharedConversation = Arc<AsyncMutex<Conversation>>;

#[derive(Debug, Default)]
struct ConversationSlots {
	slots: HashMap<ContextId, (SharedConversation, u64)>,
	clock: u64,
}

/// Bounded set of conversations keyed by A2A context id.
///
/// Each conversation sits behind its own async mutex, so messages in one context are processed
/// in order while different contexts proceed in parallel. Once full, the least recently used
/// conversation is dropped; a request already holding it finishes undisturbed.
#[derive(Clone, Debug)]
pub struct ConversationStore {
	inner: Arc<Mutex<ConversationSlots>>,
	capacity: usize,
}
impl ConversationStore {
	/// Creates a store holding at most `capacity` conversations (at least one).
	pub fn with_capacity(capacity: usize) -> Self {
		Self { inner: Default::default(), capacity: capacity.max(1) }
	}

	/// Returns the conversation for `context_id`, creating an empty one on first use.
	pub fn get_or_create(&self, context_id: &ContextId) -> SharedConversation {
		let mut inner = self.inner.lock();

		inner.clock += 1;

		let now = inner.clock;

		if let Some((conversation, last_used)) = inner.slots.get_mut(context_id) {
			*last_used = now;

			return conversation.clone();
		}
		if inner.slots.len() >= self.capacity {
			let idle = inner
				.slots
				.iter()
				.min_by_key(|(_, (_, last_used))| *last_used)
				.map(|(id, _)| id.clone());

			if let Some(idle) = idle {
				inner.slots.remove(&idle);
				tracing::debug!(context_id = %idle, "Evicted least recently used conversation.");
			}
		}

		let conversation = Arc::new(AsyncMutex::new(Conversation::default()));

		inner.slots.insert(context_id.clone(), (conversation.clone(), now));

		conversation
	}

	/// Number of tracked conversations.
	pub fn len(&self) -> usize {
		self.inner.lock().slots.len()
	}

	/// Returns `true` when no conversation is tracked.
	pub fn is_empty(&self) -> bool {
		self.inner.lock().slots.is_empty()
	}
}
impl Default for ConversationStore {
	fn default() -> Self {
		Self::with_capacity(DEFAULT_CONVERSATION_CAPACITY)
	}
}

/// Builds the handler for the configured mode.
///
/// The LLM-backed handler is used iff `llm` is present; either way the rule-based responder is
/// available as its fallback.
pub fn select_handler(llm: Option<&LlmConfig>) -> Result<Arc<dyn AgentHandler>> {
	let rules = RuleBasedHandler::new()?;
	let handler: Arc<dyn AgentHandler> = match llm {
		Some(config) => Arc::new(LlmBackedHandler::new(ChatClient::from_config(config)?, rules)),
		None => Arc::new(rules),
	};

	tracing::info!(mode = handler.mode().as_str(), "Selected agent handler.");

	Ok(handler)
}
