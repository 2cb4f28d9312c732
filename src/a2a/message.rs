//! A2A messages, parts, and tasks.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{ContextId, TaskId},
};

/// Author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	/// Calling agent or end user.
	User,
	/// This agent.
	Agent,
}

/// Discriminator carried by top-level A2A objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
	/// A [`Message`].
	Message,
	/// A [`Task`].
	Task,
}
impl ObjectKind {
	fn message() -> Self {
		Self::Message
	}

	fn task() -> Self {
		Self::Task
	}
}

/// Content fragment of a message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
	/// Plain text.
	Text {
		/// Text content.
		text: String,
	},
	/// Structured JSON payload.
	Data {
		/// Payload.
		data: Value,
	},
	/// File reference or inline bytes.
	File {
		/// File descriptor as sent by the caller.
		file: Value,
	},
}
impl Part {
	/// Builds a text part.
	pub fn text(text: impl Into<String>) -> Self {
		Self::Text { text: text.into() }
	}
}

/// One conversational turn exchanged over A2A.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
	/// Author.
	pub role: Role,
	/// Content fragments.
	pub parts: Vec<Part>,
	/// Caller-assigned message identifier.
	pub message_id: String,
	/// Conversation the message belongs to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub context_id: Option<ContextId>,
	/// Task the message belongs to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub task_id: Option<TaskId>,
	/// Always [`ObjectKind::Message`].
	#[serde(default = "ObjectKind::message")]
	pub kind: ObjectKind,
}
impl Message {
	/// Builds an agent reply with a fresh message id.
	pub fn agent_text(text: impl Into<String>, context_id: &ContextId, task_id: &TaskId) -> Self {
		Self {
			role: Role::Agent,
			parts: vec![Part::text(text)],
			message_id: uuid::Uuid::new_v4().to_string(),
			context_id: Some(context_id.clone()),
			task_id: Some(task_id.clone()),
			kind: ObjectKind::Message,
		}
	}

	/// Text parts joined by single spaces and trimmed; non-text parts are ignored.
	pub fn text(&self) -> String {
		let joined = self
			.parts
			.iter()
			.filter_map(|part| match part {
				Part::Text { text } => Some(text.as_str()),
				_ => None,
			})
			.collect::<Vec<_>>()
			.join(" ");

		joined.trim().to_owned()
	}
}

/// Task lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
	/// Accepted, not started.
	Submitted,
	/// Running.
	Working,
	/// Waiting for more input from the caller.
	InputRequired,
	/// Finished successfully.
	Completed,
	/// Canceled by the caller.
	Canceled,
	/// Finished with an error.
	Failed,
	/// Refused by the agent.
	Rejected,
	/// Waiting for the caller to authenticate.
	AuthRequired,
	/// State could not be determined.
	Unknown,
}
impl TaskState {
	/// Returns true for states a task never leaves.
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Canceled | Self::Failed | Self::Rejected)
	}
}

/// Current status of a task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
	/// Lifecycle state.
	pub state: TaskState,
	/// Latest agent message.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<Message>,
	/// Instant the status was set.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
}
impl TaskStatus {
	/// Builds a status stamped at `timestamp`.
	pub fn new(state: TaskState, message: Option<Message>, timestamp: OffsetDateTime) -> Self {
		Self { state, message, timestamp }
	}
}

/// Unit of work created by `message/send`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
	/// Task identifier.
	pub id: TaskId,
	/// Conversation identifier.
	pub context_id: ContextId,
	/// Current status.
	pub status: TaskStatus,
	/// Messages exchanged for this task, oldest first.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub history: Vec<Message>,
	/// Always [`ObjectKind::Task`].
	#[serde(default = "ObjectKind::task")]
	pub kind: ObjectKind,
}
impl Task {
	/// Builds a task in the given status with no history.
	pub fn new(id: TaskId, context_id: ContextId, status: TaskStatus) -> Self {
		Self { id, context_id, status, history: Vec::new(), kind: ObjectKind::Task }
	}

	/// Returns a copy whose history keeps only the newest `length` messages.
	pub fn with_history_limit(&self, length: Option<usize>) -> Self {
		let mut task = self.clone();

		if let Some(length) = length {
			let skip = task.history.len().saturating_sub(length);

			task.history.drain(..skip);
		}

		task
	}
}

/// Parameters of `message/send`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendParams {
	/// Inbound message.
	pub message: Message,
	/// Opaque caller metadata.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub metadata: Option<Value>,
}

/// Parameters of `tasks/get`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQueryParams {
	/// Task identifier.
	pub id: TaskId,
	/// Maximum number of history messages to return.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub history_length: Option<usize>,
}

/// Parameters of `tasks/cancel`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskIdParams {
	/// Task identifier.
	pub id: TaskId,
}
