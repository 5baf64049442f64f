// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span wrapper used by broker flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("encore_broker.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

// Event helpers. Callers pass labels and counts only, never secret values.

pub(crate) fn flow_failed(kind: FlowKind, stage: &'static str, err: &Error) {
	#[cfg(feature = "tracing")]
	{
		if err.is_retryable() {
			tracing::info!(flow = kind.as_str(), stage, error = %err, "provider temporarily unavailable");
		} else {
			tracing::warn!(flow = kind.as_str(), stage, error = %err, "flow failed");
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, stage, err);
	}
}

pub(crate) fn stored_secret_unreadable(provider: &str, err: &crate::error::DecryptionError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(provider, error = %err, "stored refresh token could not be decrypted");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (provider, err);
	}
}

pub(crate) fn ephemeral_vapid_keys() {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			"no VAPID keys configured; generated an ephemeral pair, push subscriptions will not survive a restart"
		);
	}
}

pub(crate) fn subscriptions_pruned(count: usize) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(count, "pruned expired push subscriptions");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = count;
	}
}

pub(crate) fn search_results_skipped(count: usize) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(count, "skipped search results that are not usable tracks");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = count;
	}
}

pub(crate) fn registry_cleared(count: usize) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(count, "push subscription registry cleared by operator");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = count;
	}
}
