//! JSON-RPC 2.0 envelopes and the A2A error code table.

// crates.io
use serde_json::Value;
// self
use crate::_prelude::*;

/// Protocol version carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Request identifier; JSON-RPC allows strings and numbers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
	/// String identifier.
	String(String),
	/// Numeric identifier.
	Number(i64),
}
impl From<&str> for RequestId {
	fn from(value: &str) -> Self {
		Self::String(value.to_owned())
	}
}
impl From<i64> for RequestId {
	fn from(value: i64) -> Self {
		Self::Number(value)
	}
}

/// Inbound JSON-RPC request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
	/// Must be [`JSONRPC_VERSION`].
	pub jsonrpc: String,
	/// Absent for notifications.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<RequestId>,
	/// Method name, e.g. `message/send`.
	pub method: String,
	/// Method parameters.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub params: Option<Value>,
}
impl JsonRpcRequest {
	/// Creates a request without parameters.
	pub fn new(id: impl Into<RequestId>, method: impl Into<String>) -> Self {
		Self { jsonrpc: JSONRPC_VERSION.into(), id: Some(id.into()), method: method.into(), params: None }
	}

	/// Attaches parameters.
	pub fn with_params(mut self, params: Value) -> Self {
		self.params = Some(params);

		self
	}

	/// Rejects envelopes that do not declare JSON-RPC 2.0 or carry an empty method.
	pub fn validate(&self) -> Result<(), JsonRpcError> {
		if self.jsonrpc != JSONRPC_VERSION {
			return Err(JsonRpcError::invalid_request(format!(
				"Unsupported JSON-RPC version `{}`.",
				self.jsonrpc
			)));
		}
		if self.method.is_empty() {
			return Err(JsonRpcError::invalid_request("Method must not be empty."));
		}

		Ok(())
	}
}

/// Error codes emitted by the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
	/// Body is not valid JSON.
	ParseError = -32700,
	/// Body is JSON but not a valid request object.
	InvalidRequest = -32600,
	/// Unknown method.
	MethodNotFound = -32601,
	/// Parameters do not match the method.
	InvalidParams = -32602,
	/// Handler failure.
	InternalError = -32603,
	/// Caller identity is required but absent.
	Unauthorized = -32000,
	/// Task id is unknown.
	TaskNotFound = -32001,
	/// Task is already in a terminal state.
	TaskNotCancelable = -32002,
	/// Method is recognized but not offered by this agent.
	UnsupportedOperation = -32004,
}
impl ErrorCode {
	/// Numeric code placed on the wire.
	pub const fn code(self) -> i32 {
		self as i32
	}
}

/// JSON-RPC error object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
	/// Numeric error code.
	pub code: i32,
	/// Short description.
	pub message: String,
	/// Structured detail.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}
impl JsonRpcError {
	/// Creates an error with the given code.
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self { code: code.code(), message: message.into(), data: None }
	}

	/// Attaches structured detail.
	pub fn with_data(mut self, data: Value) -> Self {
		self.data = Some(data);

		self
	}

	/// `-32700`.
	pub fn parse_error(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::ParseError, message)
	}

	/// `-32600`.
	pub fn invalid_request(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::InvalidRequest, message)
	}

	/// `-32601`.
	pub fn method_not_found(method: &str) -> Self {
		Self::new(ErrorCode::MethodNotFound, format!("Method `{method}` not found."))
	}

	/// `-32602`.
	pub fn invalid_params(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::InvalidParams, message)
	}

	/// `-32603`.
	pub fn internal(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::InternalError, message)
	}

	/// `-32000`.
	pub fn unauthorized() -> Self {
		Self::new(ErrorCode::Unauthorized, "Authentication required.")
	}

	/// Returns true when the code matches.
	pub fn is(&self, code: ErrorCode) -> bool {
		self.code == code.code()
	}
}

/// Successful response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResultResponse {
	/// Always [`JSONRPC_VERSION`].
	pub jsonrpc: String,
	/// Echo of the request id.
	pub id: Option<RequestId>,
	/// Method result.
	pub result: Value,
}

/// Error response; `id` is `null` when the request id could not be read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorResponse {
	/// Always [`JSONRPC_VERSION`].
	pub jsonrpc: String,
	/// Echo of the request id.
	pub id: Option<RequestId>,
	/// Error detail.
	pub error: JsonRpcError,
}

/// JSON-RPC response, success or error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponse {
	/// Success.
	Result(JsonRpcResultResponse),
	/// Failure.
	Error(JsonRpcErrorResponse),
}
impl JsonRpcResponse {
	/// Builds a success response.
	pub fn result(id: Option<RequestId>, result: Value) -> Self {
		Self::Result(JsonRpcResultResponse { jsonrpc: JSONRPC_VERSION.into(), id, result })
	}

	/// Builds an error response.
	pub fn error(id: Option<RequestId>, error: JsonRpcError) -> Self {
		Self::Error(JsonRpcErrorResponse { jsonrpc: JSONRPC_VERSION.into(), id, error })
	}

	/// Error detail, if this is an error response.
	pub fn as_error(&self) -> Option<&JsonRpcError> {
		match self {
			Self::Result(_) => None,
			Self::Error(response) => Some(&response.error),
		}
	}

	/// Result payload, if this is a success response.
	pub fn as_result(&self) -> Option<&Value> {
		match self {
			Self::Result(response) => Some(&response.result),
			Self::Error(_) => None,
		}
	}
}
