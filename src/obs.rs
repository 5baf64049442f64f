//! Observability helpers shared by every provider and the push registry.
//!
//! # Feature Flags
//!
//! - `tracing` (default): network flows run inside `encore_broker.flow` spans carrying the
//!   `flow` and `stage` fields, and notable events (decryption failures, ephemeral VAPID keys,
//!   pruned push subscriptions) are logged. Secret values are never recorded.
//! - `metrics`: increments the `encore_broker_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Provider A client-credentials exchange.
	ClientCredentials,
	/// Provider B authorization-code exchange.
	AuthorizationCode,
	/// Provider B refresh.
	Refresh,
	/// Provider C catalog search.
	Search,
	/// Push fan-out through the send collaborator.
	PushFanOut,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ClientCredentials => "client_credentials",
			Self::AuthorizationCode => "authorization_code",
			Self::Refresh => "refresh",
			Self::Search => "search",
			Self::PushFanOut => "push_fan_out",
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
			Self::Attempt => "attempt",
			Self::Success => "success",
			Self::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a flow span, recording attempt and outcome around it.
pub(crate) async fn observe<T, Fut>(kind: FlowKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(err) => {
			record_flow_outcome(kind, FlowOutcome::Failure);
			flow_failed(kind, stage, err);
		},
	}

	result
}
