//! Uniform probe surface over every provider.
//!
//! Each provider implements [`CredentialProvider`], so [`Diagnostics`] can interrogate all of
//! them without provider-specific branching. A [`Diagnosis`] never carries secret values: only
//! presence, length, and (for non-secret identifiers) a short prefix.

// std
use std::time::Duration as StdDuration;
// crates.io
use futures::future;
// self
use crate::{
	_prelude::*,
	access::OperatorGrant,
	auth::{ProviderId, TokenSecret},
};

/// Boxed future returned by [`CredentialProvider`] operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a + Send>>;

const SUMMARY_LIMIT: usize = 256;
const IDENTIFIER_PREFIX_LEN: usize = 4;

/// Capability set shared by every provider.
pub trait CredentialProvider
where
	Self: Send + Sync,
{
	/// Provider identifier.
	fn provider_id(&self) -> &ProviderId;

	/// Returns the bearer secret callers should present upstream, if the provider uses one.
	fn credential(&self) -> ProviderFuture<'_, Result<Option<TokenSecret>>>;

	/// Checks the provider end to end.
	fn probe(&self) -> ProviderFuture<'_, Result<ProbeReport, Diagnosis>>;

	/// Presence hints for the provider's configured secrets.
	fn secret_hints(&self) -> Vec<SecretHint>;
}

/// Successful probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeReport {
	/// Probed provider.
	pub provider: ProviderId,
	/// Wall time spent in the probe.
	pub latency: StdDuration,
	/// Short, secret-free description.
	pub detail: String,
}
impl ProbeReport {
	/// Creates a report.
	pub fn new(provider: ProviderId, latency: StdDuration, detail: impl Into<String>) -> Self {
		Self { provider, latency, detail: detail.into() }
	}
}

/// Failure category reported by a [`Diagnosis`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
	/// Missing or malformed configuration.
	Configuration,
	/// Provider rejected the client or request.
	UpstreamAuth,
	/// Provider rejected the grant; re-authorization is required.
	InvalidGrant,
	/// Network failure, timeout, or provider outage.
	Unavailable,
	/// Stored secret failed its integrity check.
	Decryption,
	/// Secret could not be sealed.
	Encryption,
	/// Durable store failure.
	Storage,
	/// Operator access was denied.
	AccessDenied,
}
impl From<&Error> for FailureKind {
	fn from(err: &Error) -> Self {
		match err {
			Error::Config(_) => Self::Configuration,
			Error::UpstreamAuth { .. } => Self::UpstreamAuth,
			Error::InvalidGrant { .. } => Self::InvalidGrant,
			Error::Unavailable(_) => Self::Unavailable,
			Error::Decryption(_) => Self::Decryption,
			Error::Encryption(_) => Self::Encryption,
			Error::Storage(_) => Self::Storage,
			Error::AccessDenied => Self::AccessDenied,
		}
	}
}

/// Failed probe, safe to show to operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnosis {
	/// Probed provider.
	pub provider: ProviderId,
	/// Failure category.
	pub kind: FailureKind,
	/// Error message truncated to a bounded length.
	pub summary: String,
	/// Presence hints for the provider's secrets.
	pub hints: Vec<SecretHint>,
}
impl Diagnosis {
	/// Builds a diagnosis from a broker error.
	pub fn from_error(provider: ProviderId, err: &Error, hints: Vec<SecretHint>) -> Self {
		Self { provider, kind: err.into(), summary: truncate(&err.to_string()), hints }
	}
}
impl Display for Diagnosis {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} ({:?}): {}", self.provider, self.kind, self.summary)
	}
}

/// Redacted view of one configured value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SecretHint {
	/// Setting name.
	pub name: &'static str,
	/// Whether the value is configured.
	pub present: bool,
	/// Length in bytes, when known.
	pub length: Option<usize>,
	/// Leading characters; only ever set for non-secret identifiers.
	pub prefix: Option<String>,
}
impl SecretHint {
	/// Hint for a secret: presence and length only.
	pub fn secret(name: &'static str, value: Option<&TokenSecret>) -> Self {
		Self { name, present: value.is_some(), length: value.map(TokenSecret::len), prefix: None }
	}

	/// Hint for a non-secret identifier such as a client id: presence, length, short prefix.
	pub fn identifier(name: &'static str, value: Option<&str>) -> Self {
		Self {
			name,
			present: value.is_some(),
			length: value.map(str::len),
			prefix: value.map(|value| value.chars().take(IDENTIFIER_PREFIX_LEN).collect()),
		}
	}

	/// Hint for a setting whose value is not retained (e.g. a parsed key).
	pub fn flag(name: &'static str, present: bool) -> Self {
		Self { name, present, length: None, prefix: None }
	}
}

/// Operator-facing diagnostics over a set of providers.
#[derive(Clone, Default)]
pub struct Diagnostics {
	providers: Vec<Arc<dyn CredentialProvider>>,
}
impl Diagnostics {
	/// Creates an empty facade.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a provider.
	pub fn register(&mut self, provider: Arc<dyn CredentialProvider>) {
		self.providers.push(provider);
	}

	/// Registered provider identifiers, in registration order.
	pub fn provider_ids(&self) -> Vec<ProviderId> {
		self.providers.iter().map(|provider| provider.provider_id().clone()).collect()
	}

	/// Probes every provider concurrently; results follow registration order.
	pub async fn probe_all(&self, _grant: &OperatorGrant) -> Vec<Result<ProbeReport, Diagnosis>> {
		future::join_all(self.providers.iter().map(|provider| provider.probe())).await
	}

	/// Secret hints for every provider.
	pub fn secret_hints(&self, _grant: &OperatorGrant) -> Vec<(ProviderId, Vec<SecretHint>)> {
		self.providers
			.iter()
			.map(|provider| (provider.provider_id().clone(), provider.secret_hints()))
			.collect()
	}
}
impl Debug for Diagnostics {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Diagnostics").field("providers", &self.provider_ids()).finish()
	}
}

fn truncate(message: &str) -> String {
	if message.chars().count() <= SUMMARY_LIMIT {
		return message.to_owned();
	}

	let mut buf = message.chars().take(SUMMARY_LIMIT).collect::<String>();

	buf.push('…');

	buf
}
