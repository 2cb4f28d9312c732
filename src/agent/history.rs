//! Bounded per-conversation chat history.

// self
use crate::_prelude::*;

/// Maximum number of user/assistant turns retained per conversation.
///
/// Together with the pinned system prompt a request never carries more than 20 messages.
pub const HISTORY_CAPACITY: usize = 19;

/// Author of a chat-completions message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
	/// Pinned instructions.
	System,
	/// Caller turn.
	User,
	/// Model or rule-based reply.
	Assistant,
}

/// One chat-completions message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
	/// Author.
	pub role: ChatRole,
	/// Text content.
	pub content: String,
}
impl ChatMessage {
	/// Builds a system message.
	pub fn system(content: impl Into<String>) -> Self {
		Self { role: ChatRole::System, content: content.into() }
	}

	/// Builds a user message.
	pub fn user(content: impl Into<String>) -> Self {
		Self { role: ChatRole::User, content: content.into() }
	}

	/// Builds an assistant message.
	pub fn assistant(content: impl Into<String>) -> Self {
		Self { role: ChatRole::Assistant, content: content.into() }
	}
}

/// Fixed-capacity ring buffer of chat turns; pushing into a full buffer evicts the oldest turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatHistory {
	turns: VecDeque<ChatMessage>,
	capacity: usize,
}
impl ChatHistory {
	/// Creates an empty history holding at most `capacity` turns (minimum one).
	pub fn with_capacity(capacity: usize) -> Self {
		let capacity = capacity.max(1);

		Self { turns: VecDeque::with_capacity(capacity), capacity }
	}

	/// Appends a turn, evicting the oldest one when full.
	pub fn push(&mut self, message: ChatMessage) {
		if self.turns.len() == self.capacity {
			self.turns.pop_front();
		}

		self.turns.push_back(message);
	}

	/// Number of retained turns.
	pub fn len(&self) -> usize {
		self.turns.len()
	}

	/// Returns `true` when no turn has been recorded.
	pub fn is_empty(&self) -> bool {
		self.turns.is_empty()
	}

	/// Maximum number of retained turns.
	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Iterates over retained turns, oldest first.
	pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
		self.turns.iter()
	}

	/// Builds a request payload: the system prompt followed by the retained turns.
	pub fn to_messages(&self, system: &str) -> Vec<ChatMessage> {
		let mut messages = Vec::with_capacity(self.turns.len() + 1);

		messages.push(ChatMessage::system(system));
		messages.extend(self.turns.iter().cloned());

		messages
	}

	/// Drops every retained turn.
	pub fn clear(&mut self) {
		self.turns.clear();
	}
}
impl Default for ChatHistory {
	fn default() -> Self {
		Self::with_capacity(HISTORY_CAPACITY)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn full_history_evicts_oldest_turn() {
		let mut history = ChatHistory::default();

		for i in 0..25 {
			history.push(ChatMessage::user(format!("turn {i}")));
		}

		assert_eq!(history.len(), HISTORY_CAPACITY);
		assert_eq!(history.iter().next().map(|m| m.content.as_str()), Some("turn 6"));
		assert_eq!(history.iter().last().map(|m| m.content.as_str()), Some("turn 24"));
	}

	#[test]
	fn request_payload_pins_system_prompt_first_and_stays_bounded() {
		let mut history = ChatHistory::default();

		for i in 0..40 {
			history.push(ChatMessage::assistant(format!("reply {i}")));
		}

		let messages = history.to_messages("prompt");

		assert_eq!(messages.len(), 20);
		assert_eq!(messages[0], ChatMessage::system("prompt"));
		assert!(messages[1..].iter().all(|m| m.role == ChatRole::Assistant));
	}

	#[test]
	fn roles_serialize_lowercase() {
		let value = serde_json::to_value(ChatMessage::assistant("hi")).expect("Message should serialize.");

		assert_eq!(value, serde_json::json!({ "role": "assistant", "content": "hi" }));
	}

	#[test]
	fn zero_capacity_is_clamped() {
		let mut history = ChatHistory::with_capacity(0);

		history.push(ChatMessage::user("a"));
		history.push(ChatMessage::user("b"));

		assert_eq!(history.capacity(), 1);
		assert_eq!(history.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(), ["b"]);
	}
}
