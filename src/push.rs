//! Volatile web-push subscription registry and the VAPID keypair used to sign pushes.
//!
//! Subscriptions live in process memory only and are lost on restart. Delivering a notification
//! is delegated to a [`PushTransport`]; the registry snapshots subscriptions, sends outside its
//! lock, and prunes the ones the transport reports as gone.

pub mod registry;
pub mod vapid;

pub use registry::*;
pub use vapid::*;

// self
use crate::_prelude::*;

/// Boxed future returned by [`PushTransport`] operations.
pub type PushFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a + Send>>;

/// Validation failures for [`PushSubscription`] values.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SubscriptionError {
	/// Endpoint is not an absolute URL.
	#[error("Push endpoint is not a valid URL.")]
	InvalidEndpoint,
	/// Endpoint does not use HTTPS.
	#[error("Push endpoint must use https.")]
	InsecureEndpoint,
	/// One of the client keys is empty.
	#[error("Push subscription key `{0}` is empty.")]
	EmptyKey(&'static str),
}

/// Client keys published by the browser for payload encryption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
	/// Client P-256 public key, base64url.
	pub p256dh: String,
	/// Client authentication secret, base64url.
	pub auth: String,
}

/// Browser push subscription, as produced by `PushManager.subscribe()`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSubscription", rename_all = "camelCase")]
pub struct PushSubscription {
	endpoint: Url,
	keys: SubscriptionKeys,
	#[serde(skip_serializing_if = "Option::is_none")]
	expiration_time: Option<u64>,
}
impl PushSubscription {
	/// Validates and builds a subscription.
	pub fn new(
		endpoint: &str,
		p256dh: impl Into<String>,
		auth: impl Into<String>,
	) -> Result<Self, SubscriptionError> {
		Self::try_from(RawSubscription {
			endpoint: endpoint.to_owned(),
			keys: SubscriptionKeys { p256dh: p256dh.into(), auth: auth.into() },
			expiration_time: None,
		})
	}

	/// Sets the browser-reported expiration, in milliseconds since the Unix epoch.
	pub fn with_expiration_time(mut self, expiration_time: Option<u64>) -> Self {
		self.expiration_time = expiration_time;

		self
	}

	/// Push service endpoint.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	/// Client keys.
	pub fn keys(&self) -> &SubscriptionKeys {
		&self.keys
	}

	/// Browser-reported expiration, if any.
	pub fn expiration_time(&self) -> Option<u64> {
		self.expiration_time
	}
}
impl TryFrom<RawSubscription> for PushSubscription {
	type Error = SubscriptionError;

	fn try_from(raw: RawSubscription) -> Result<Self, Self::Error> {
		let endpoint =
			Url::parse(raw.endpoint.trim()).map_err(|_| SubscriptionError::InvalidEndpoint)?;

		if endpoint.scheme() != "https" {
			return Err(SubscriptionError::InsecureEndpoint);
		}
		if endpoint.host_str().is_none() {
			return Err(SubscriptionError::InvalidEndpoint);
		}
		if raw.keys.p256dh.trim().is_empty() {
			return Err(SubscriptionError::EmptyKey("p256dh"));
		}
		if raw.keys.auth.trim().is_empty() {
			return Err(SubscriptionError::EmptyKey("auth"));
		}

		Ok(Self { endpoint, keys: raw.keys, expiration_time: raw.expiration_time })
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSubscription {
	endpoint: String,
	keys: SubscriptionKeys,
	#[serde(default)]
	expiration_time: Option<u64>,
}

/// Result reported by a [`PushTransport`] for one delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushDelivery {
	/// Push service accepted the message.
	Delivered,
	/// Subscription no longer exists upstream (HTTP 404/410) and should be pruned.
	Gone,
}

/// Message handed to a [`PushTransport`].
#[derive(Clone, Copy, Debug)]
pub struct PushMessage<'a> {
	/// Target subscription.
	pub subscription: &'a PushSubscription,
	/// Value for the `Authorization` header (`vapid t=..., k=...`).
	pub authorization: &'a str,
	/// Plaintext payload; the transport encrypts it for the subscription's keys.
	pub payload: &'a [u8],
}

/// Push-send collaborator.
pub trait PushTransport
where
	Self: Send + Sync,
{
	/// Delivers one message.
	fn send<'a>(&'a self, message: PushMessage<'a>) -> PushFuture<'a, Result<PushDelivery>>;
}
