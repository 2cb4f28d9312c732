//! Observability helpers shared by the issuer, validator, dispatcher, and upstream clients.
//!
//! # Feature Flags
//!
//! - Spans named `a2a_travel_agent.flow` carry the `flow` and `stage` (call site) fields and are
//!   always emitted through `tracing`.
//! - Enable `metrics` to increment the `a2a_travel_agent_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Client-credentials token issuance.
	Issue,
	/// Bearer token validation.
	Validate,
	/// JSON-RPC dispatch to the agent handler.
	Dispatch,
	/// Upstream client-credentials token acquisition for the LLM API.
	UpstreamToken,
	/// Upstream chat-completions call.
	ChatCompletion,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Issue => "issue",
			FlowKind::Validate => "validate",
			FlowKind::Dispatch => "dispatch",
			FlowKind::UpstreamToken => "upstream_token",
			FlowKind::ChatCompletion => "chat_completion",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records the terminal outcome of a flow from its result.
pub fn record_result<T, E>(kind: FlowKind, result: &Result<T, E>) {
	match result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(_) => record_flow_outcome(kind, FlowOutcome::Failure),
	}
}
