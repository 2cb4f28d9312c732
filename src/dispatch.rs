//! JSON-RPC dispatcher routing A2A methods to the agent handler.

// crates.io
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	a2a::{
		ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse, Message, MessageSendParams,
		RequestId, Task, TaskIdParams, TaskQueryParams, TaskState, TaskStatus,
	},
	agent::{AgentHandler, AgentMode, ConversationStore},
	auth::{ClientIdentity, ContextId, TaskId},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Reply used when an inbound message carries no text.
pub const EMPTY_MESSAGE_REPLY: &str =
	"I didn't receive a message. Please send your travel question or request.";

/// Default number of tasks kept before the oldest is evicted.
pub const DEFAULT_TASK_CAPACITY: usize = 1_000;
/// Messages kept per task; older ones are dropped first.
pub const MAX_TASK_HISTORY: usize = 50;

#[derive(Debug, Default)]
struct TaskSlots {
	tasks: HashMap<TaskId, Task>,
	// Creation order, oldest first.
	order: VecDeque<TaskId>,
}

/// Bounded in-memory table of tasks created by `message/send`.
#[derive(Clone, Debug)]
pub struct TaskTable {
	slots: Arc<RwLock<TaskSlots>>,
	capacity: usize,
}
impl TaskTable {
	/// Creates a table holding at most `capacity` tasks (at least one).
	pub fn with_capacity(capacity: usize) -> Self {
		Self { slots: Default::default(), capacity: capacity.max(1) }
	}

	/// Returns a snapshot of the task.
	pub fn get(&self, id: &TaskId) -> Option<Task> {
		self.slots.read().tasks.get(id).cloned()
	}

	/// Stores `task`, appending its history to an existing task with the same id.
	///
	/// A new task evicts the oldest one once the table is full.
	pub fn upsert(&self, mut task: Task) -> Task {
		let mut slots = self.slots.write();
		let TaskSlots { tasks, order } = &mut *slots;

		if let Some(existing) = tasks.get_mut(&task.id) {
			existing.history.append(&mut task.history);
			existing.status = task.status;
			existing.context_id = task.context_id;

			trim_history(&mut existing.history);

			return existing.clone();
		}

		while tasks.len() >= self.capacity {
			let Some(oldest) = order.pop_front() else { break };

			tasks.remove(&oldest);
			tracing::debug!(task_id = %oldest, "Evicted oldest task.");
		}

		trim_history(&mut task.history);
		order.push_back(task.id.clone());
		tasks.insert(task.id.clone(), task.clone());

		task
	}

	/// Moves a non-terminal task to `canceled`.
	pub fn cancel(&self, id: &TaskId, now: OffsetDateTime) -> Result<Task, JsonRpcError> {
		let mut slots = self.slots.write();
		let task = slots.tasks.get_mut(id).ok_or_else(|| task_not_found(id))?;

		if task.status.state.is_terminal() {
			return Err(JsonRpcError::new(
				ErrorCode::TaskNotCancelable,
				format!("Task `{id}` is already {:?} and cannot be canceled.", task.status.state),
			));
		}

		task.status = TaskStatus::new(TaskState::Canceled, None, now);

		Ok(task.clone())
	}

	/// Number of stored tasks.
	pub fn len(&self) -> usize {
		self.slots.read().tasks.len()
	}

	/// Returns `true` when no task is stored.
	pub fn is_empty(&self) -> bool {
		self.slots.read().tasks.is_empty()
	}
}
impl Default for TaskTable {
	fn default() -> Self {
		Self::with_capacity(DEFAULT_TASK_CAPACITY)
	}
}

/// Routes JSON-RPC requests to the agent handler and the task table.
#[derive(Clone)]
pub struct Dispatcher {
	handler: Arc<dyn AgentHandler>,
	conversations: ConversationStore,
	tasks: TaskTable,
	require_identity: bool,
}
impl Dispatcher {
	/// Creates a dispatcher; with `require_identity` every request must carry a caller identity.
	pub fn new(handler: Arc<dyn AgentHandler>, require_identity: bool) -> Self {
		Self {
			handler,
			conversations: ConversationStore::default(),
			tasks: TaskTable::default(),
			require_identity,
		}
	}

	/// Active responder variant.
	pub fn mode(&self) -> AgentMode {
		self.handler.mode()
	}

	/// Per-context conversations.
	pub fn conversations(&self) -> &ConversationStore {
		&self.conversations
	}

	/// Tasks created so far.
	pub fn tasks(&self) -> &TaskTable {
		&self.tasks
	}

	/// Parses a raw body and dispatches it.
	///
	/// A missing identity is reported before any parse or envelope error, echoing the request id
	/// when it can be read.
	pub async fn handle_bytes(
		&self,
		body: &[u8],
		identity: Option<&ClientIdentity>,
	) -> JsonRpcResponse {
		let value = match serde_json::from_slice::<Value>(body) {
			Ok(value) => value,
			Err(e) => {
				if let Err(error) = self.authorize(identity) {
					return JsonRpcResponse::error(None, error);
				}

				return JsonRpcResponse::error(
					None,
					JsonRpcError::parse_error(format!("Invalid JSON payload: {e}.")),
				);
			},
		};
		let id = value.get("id").cloned().and_then(|id| serde_json::from_value::<RequestId>(id).ok());

		if let Err(error) = self.authorize(identity) {
			return JsonRpcResponse::error(id, error);
		}

		match serde_json::from_value::<JsonRpcRequest>(value) {
			Ok(request) => self.handle(request, identity).await,
			Err(e) => JsonRpcResponse::error(
				id,
				JsonRpcError::invalid_request(format!("Invalid JSON-RPC request: {e}.")),
			),
		}
	}

	/// Dispatches a parsed request.
	pub async fn handle(
		&self,
		request: JsonRpcRequest,
		identity: Option<&ClientIdentity>,
	) -> JsonRpcResponse {
		const KIND: FlowKind = FlowKind::Dispatch;

		let span = FlowSpan::new(KIND, "handle");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let id = request.id.clone();
		let result = span.instrument(self.route(request, identity)).await;

		obs::record_result(KIND, &result);

		match result {
			Ok(value) => JsonRpcResponse::result(id, value),
			Err(error) => JsonRpcResponse::error(id, error),
		}
	}

	async fn route(
		&self,
		request: JsonRpcRequest,
		identity: Option<&ClientIdentity>,
	) -> Result<Value, JsonRpcError> {
		self.authorize(identity)?;
		request.validate()?;

		tracing::info!(
			method = %request.method,
			client_id = identity.map(|identity| &*identity.client_id),
			"Dispatching JSON-RPC request."
		);

		match request.method.as_str() {
			"message/send" => self.message_send(decode_params(request.params)?).await,
			"tasks/get" => self.tasks_get(decode_params(request.params)?),
			"tasks/cancel" => self.tasks_cancel(decode_params(request.params)?),
			"message/stream" | "tasks/resubscribe" => Err(JsonRpcError::new(
				ErrorCode::UnsupportedOperation,
				format!("`{}` is not supported by this agent.", request.method),
			)),
			method => Err(JsonRpcError::method_not_found(method)),
		}
	}

	fn authorize(&self, identity: Option<&ClientIdentity>) -> Result<(), JsonRpcError> {
		if self.require_identity && identity.is_none() {
			return Err(JsonRpcError::unauthorized());
		}

		Ok(())
	}

	async fn message_send(&self, params: MessageSendParams) -> Result<Value, JsonRpcError> {
		let mut inbound = params.message;
		let task_id = inbound.task_id.clone().unwrap_or_else(TaskId::generate);
		let context_id = inbound.context_id.clone().unwrap_or_else(ContextId::generate);

		inbound.task_id = Some(task_id.clone());
		inbound.context_id = Some(context_id.clone());

		let text = inbound.text();
		let reply = if text.is_empty() {
			EMPTY_MESSAGE_REPLY.to_owned()
		} else {
			let conversation = self.conversations.get_or_create(&context_id);
			let mut conversation = conversation.lock().await;

			self.handler.respond(&mut conversation, &text).await.map_err(|e| {
				tracing::error!(
					error = %e,
					task_id = %task_id,
					context_id = %context_id,
					"Agent handler failed."
				);

				JsonRpcError::internal(format!("Agent failed to process the message: {e}"))
					.with_data(serde_json::json!({ "taskId": task_id, "contextId": context_id }))
			})?
		};
		let outbound = Message::agent_text(reply, &context_id, &task_id);
		let mut task = Task::new(
			task_id,
			context_id,
			TaskStatus::new(TaskState::Completed, Some(outbound.clone()), OffsetDateTime::now_utc()),
		);

		task.history = vec![inbound, outbound];

		to_value(&self.tasks.upsert(task))
	}

	fn tasks_get(&self, params: TaskQueryParams) -> Result<Value, JsonRpcError> {
		let task = self.tasks.get(&params.id).ok_or_else(|| task_not_found(&params.id))?;

		to_value(&task.with_history_limit(params.history_length))
	}

	fn tasks_cancel(&self, params: TaskIdParams) -> Result<Value, JsonRpcError> {
		to_value(&self.tasks.cancel(&params.id, OffsetDateTime::now_utc())?)
	}
}
impl Debug for Dispatcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher")
			.field("mode", &self.handler.mode())
			.field("require_identity", &self.require_identity)
			.finish_non_exhaustive()
	}
}

fn decode_params<T>(params: Option<Value>) -> Result<T, JsonRpcError>
where
	T: DeserializeOwned,
{
	let params = params.ok_or_else(|| JsonRpcError::invalid_params("Missing params."))?;

	serde_path_to_error::deserialize(params).map_err(|e| {
		JsonRpcError::invalid_params(format!("Invalid params at `{}`: {}", e.path(), e.inner()))
	})
}

fn trim_history(history: &mut Vec<Message>) {
	let excess = history.len().saturating_sub(MAX_TASK_HISTORY);

	history.drain(..excess);
}

fn to_value(task: &Task) -> Result<Value, JsonRpcError> {
	serde_json::to_value(task)
		.map_err(|e| JsonRpcError::internal(format!("Task could not be serialized: {e}.")))
}

fn task_not_found(id: &TaskId) -> JsonRpcError {
	JsonRpcError::new(ErrorCode::TaskNotFound, format!("Task `{id}` not found."))
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{
		agent::{AgentError, AgentFuture, Conversation, RuleBasedHandler},
		auth::{ClientId, ScopeSet, TokenId},
	};

	struct FailingHandler;
	impl AgentHandler for FailingHandler {
		fn mode(&self) -> AgentMode {
			AgentMode::LlmBacked
		}

		fn respond<'a>(&'a self, _: &'a mut Conversation, _: &'a str) -> AgentFuture<'a, String> {
			Box::pin(async { Err(AgentError::MalformedResponse { missing: "choices" }) })
		}
	}

	fn rules(require_identity: bool) -> Dispatcher {
		Dispatcher::new(
			Arc::new(RuleBasedHandler::new().expect("Rule-based handler should build.")),
			require_identity,
		)
	}

	fn identity() -> ClientIdentity {
		ClientIdentity {
			client_id: ClientId::new("travel-agent-client").expect("Client fixture should be valid."),
			scope: ScopeSet::travel_agent(),
			token_id: TokenId::new("jti-1").expect("Token id fixture should be valid."),
			expires_at: macros::datetime!(2030-01-01 00:00 UTC),
		}
	}

	fn send(text: &str, ids: Option<(&str, &str)>) -> Vec<u8> {
		let mut message = serde_json::json!({
			"role": "user",
			"messageId": "msg-1",
			"parts": [{ "kind": "text", "text": text }],
		});

		if let Some((task_id, context_id)) = ids {
			message["taskId"] = task_id.into();
			message["contextId"] = context_id.into();
		}

		serde_json::json!({
			"jsonrpc": "2.0",
			"id": 7,
			"method": "message/send",
			"params": { "message": message },
		})
		.to_string()
		.into_bytes()
	}

	fn error_code(response: &JsonRpcResponse) -> Option<i32> {
		response.as_error().map(|error| error.code)
	}

	#[tokio::test]
	async fn message_send_echoes_ids_and_completes_task() {
		let dispatcher = rules(true);
		let identity = identity();
		let response =
			dispatcher.handle_bytes(&send("Plan a trip to Tokyo", Some(("task-1", "ctx-1"))), Some(&identity)).await;
		let result = response.as_result().expect("message/send should succeed.");

		assert_eq!(result["kind"], "task");
		assert_eq!(result["id"], "task-1");
		assert_eq!(result["contextId"], "ctx-1");
		assert_eq!(result["status"]["state"], "completed");
		assert_eq!(result["status"]["message"]["role"], "agent");
		assert_eq!(result["status"]["message"]["taskId"], "task-1");
		assert_eq!(result["history"].as_array().map(Vec::len), Some(2));
		assert_eq!(dispatcher.conversations().len(), 1);
	}

	#[tokio::test]
	async fn missing_ids_are_generated() {
		let dispatcher = rules(false);
		let response = dispatcher.handle_bytes(&send("hello", None), None).await;
		let result = response.as_result().expect("message/send should succeed.");
		let task_id = result["id"].as_str().expect("Task id should be a string.");
		let context_id = result["contextId"].as_str().expect("Context id should be a string.");

		assert!(uuid::Uuid::parse_str(task_id).is_ok());
		assert!(uuid::Uuid::parse_str(context_id).is_ok());
		assert_ne!(task_id, context_id);
	}

	#[tokio::test]
	async fn empty_text_completes_with_prompt() {
		let dispatcher = Dispatcher::new(Arc::new(FailingHandler), false);
		let response = dispatcher.handle_bytes(&send("   ", None), None).await;
		let result = response.as_result().expect("Empty messages should not reach the handler.");

		assert_eq!(result["status"]["state"], "completed");
		assert_eq!(result["status"]["message"]["parts"][0]["text"], EMPTY_MESSAGE_REPLY);
		assert!(dispatcher.conversations().is_empty());
	}

	#[tokio::test]
	async fn handler_failure_maps_to_internal_error_with_ids() {
		let dispatcher = Dispatcher::new(Arc::new(FailingHandler), false);
		let response = dispatcher.handle_bytes(&send("hi", Some(("task-9", "ctx-9"))), None).await;
		let error = response.as_error().expect("Handler failure should produce an error.");

		assert!(error.is(ErrorCode::InternalError));
		assert_eq!(
			error.data,
			Some(serde_json::json!({ "taskId": "task-9", "contextId": "ctx-9" }))
		);
		assert!(dispatcher.tasks().is_empty());
	}

	#[tokio::test]
	async fn missing_identity_is_unauthorized_before_other_errors() {
		let dispatcher = rules(true);
		let response = dispatcher.handle_bytes(&send("hi", None), None).await;

		assert_eq!(error_code(&response), Some(-32000));
		assert_eq!(
			serde_json::to_value(&response).expect("Response should serialize.")["id"],
			7
		);
		assert_eq!(error_code(&dispatcher.handle_bytes(b"{not json", None).await), Some(-32000));
	}

	#[tokio::test]
	async fn envelope_errors_use_standard_codes() {
		let dispatcher = rules(false);
		let call = |body: Value| {
			let dispatcher = dispatcher.clone();

			async move { dispatcher.handle_bytes(body.to_string().as_bytes(), None).await }
		};

		assert_eq!(error_code(&dispatcher.handle_bytes(b"{not json", None).await), Some(-32700));
		assert_eq!(error_code(&call(serde_json::json!({ "id": 1 })).await), Some(-32600));
		assert_eq!(
			error_code(&call(serde_json::json!({ "jsonrpc": "1.0", "id": 1, "method": "x" })).await),
			Some(-32600)
		);
		assert_eq!(
			error_code(&call(serde_json::json!({ "jsonrpc": "2.0", "id": 1, "method": "nope" })).await),
			Some(-32601)
		);
		assert_eq!(
			error_code(
				&call(serde_json::json!({ "jsonrpc": "2.0", "id": 1, "method": "message/send", "params": {} }))
					.await
			),
			Some(-32602)
		);
		assert_eq!(
			error_code(
				&call(serde_json::json!({ "jsonrpc": "2.0", "id": 1, "method": "message/stream" }))
					.await
			),
			Some(-32004)
		);
	}

	#[tokio::test]
	async fn tasks_get_and_cancel_follow_task_table() {
		let dispatcher = rules(false);

		dispatcher.handle_bytes(&send("Plan a trip to Rome", Some(("task-1", "ctx-1"))), None).await;
		dispatcher.handle_bytes(&send("5 days", Some(("task-1", "ctx-1"))), None).await;

		let get = JsonRpcRequest::new(2_i64, "tasks/get")
			.with_params(serde_json::json!({ "id": "task-1", "historyLength": 1 }));
		let response = dispatcher.handle(get, None).await;
		let result = response.as_result().expect("Known task should be returned.");

		assert_eq!(result["history"].as_array().map(Vec::len), Some(1));
		assert_eq!(dispatcher.tasks().get(&TaskId::new("task-1").expect("Valid id.")).map(|t| t.history.len()), Some(4));

		let cancel = JsonRpcRequest::new(3_i64, "tasks/cancel").with_params(serde_json::json!({ "id": "task-1" }));

		assert_eq!(error_code(&dispatcher.handle(cancel, None).await), Some(-32002));

		let unknown =
			JsonRpcRequest::new(4_i64, "tasks/get").with_params(serde_json::json!({ "id": "missing" }));

		assert_eq!(error_code(&dispatcher.handle(unknown, None).await), Some(-32001));
	}

	#[tokio::test]
	async fn caller_ids_are_echoed_verbatim() {
		let dispatcher = rules(false);
		let long = "t".repeat(200);
		let response =
			dispatcher.handle_bytes(&send("hello", Some((long.as_str(), "ctx with space"))), None).await;
		let result = response.as_result().expect("Arbitrary caller ids should be accepted.");

		assert_eq!(result["id"], long.as_str());
		assert_eq!(result["contextId"], "ctx with space");

		let response = dispatcher.handle_bytes(&send("hello", Some(("task 1", "ctx-1"))), None).await;

		assert_eq!(response.as_result().map(|result| result["id"].clone()), Some(Value::from("task 1")));
	}

	#[tokio::test]
	async fn invalid_params_message_has_single_period() {
		let dispatcher = rules(false);
		let response = dispatcher.handle_bytes(&send("hello", Some(("", "ctx-1"))), None).await;
		let error = response.as_error().expect("An empty task id should be rejected.");

		assert!(error.is(ErrorCode::InvalidParams));
		assert!(error.message.starts_with("Invalid params at `message.taskId`"));
		assert!(error.message.ends_with("cannot be empty."));
		assert!(!error.message.contains(".."));
	}

	fn task(id: &str, history: usize, now: OffsetDateTime) -> Task {
		let id = TaskId::new(id).expect("Valid id.");
		let context_id = ContextId::new("ctx").expect("Valid id.");
		let mut task =
			Task::new(id.clone(), context_id.clone(), TaskStatus::new(TaskState::Completed, None, now));

		task.history = (0..history)
			.map(|turn| Message::agent_text(format!("turn {turn}"), &context_id, &id))
			.collect();

		task
	}

	#[test]
	fn full_table_evicts_oldest_task() {
		let table = TaskTable::with_capacity(2);
		let now = macros::datetime!(2025-01-01 00:00 UTC);

		table.upsert(task("task-1", 2, now));
		table.upsert(task("task-2", 2, now));
		// Updating an existing task never evicts.
		table.upsert(task("task-1", 2, now));

		assert_eq!(table.len(), 2);

		table.upsert(task("task-3", 2, now));

		assert_eq!(table.len(), 2);
		assert!(table.get(&TaskId::new("task-1").expect("Valid id.")).is_none());
		assert!(table.get(&TaskId::new("task-2").expect("Valid id.")).is_some());
		assert!(table.get(&TaskId::new("task-3").expect("Valid id.")).is_some());
	}

	#[test]
	fn reused_task_keeps_only_latest_history() {
		let table = TaskTable::default();
		let now = macros::datetime!(2025-01-01 00:00 UTC);

		for _ in 0..40 {
			table.upsert(task("task-1", 2, now));
		}

		let stored = table.get(&TaskId::new("task-1").expect("Valid id.")).expect("Task should be stored.");

		assert_eq!(stored.history.len(), MAX_TASK_HISTORY);
		assert_eq!(stored.history.last().map(Message::text).as_deref(), Some("turn 1"));
		assert_eq!(table.upsert(task("task-2", MAX_TASK_HISTORY + 5, now)).history.len(), MAX_TASK_HISTORY);
	}

	#[test]
	fn cancel_moves_working_task_to_canceled() {
		let table = TaskTable::default();
		let id = TaskId::new("task-w").expect("Valid id.");
		let now = macros::datetime!(2025-01-01 00:00 UTC);

		table.upsert(Task::new(
			id.clone(),
			ContextId::new("ctx").expect("Valid id."),
			TaskStatus::new(TaskState::Working, None, now),
		));

		let canceled = table.cancel(&id, now).expect("Working task should be cancelable.");

		assert_eq!(canceled.status.state, TaskState::Canceled);
		assert!(table.cancel(&id, now).is_err());
	}
}
