//! Broker-level error types shared across providers, the codec, stores, and the push registry.
//!
//! Every error is `Clone` so a single in-flight token exchange can hand the same failure to
//! each caller that joined it. Sources are therefore held behind [`Arc`].

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shared, cloneable error source.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Durable store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Missing or malformed static configuration.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Network failure, timeout, or a provider that is temporarily unable to answer.
	#[error(transparent)]
	Unavailable(#[from] UnavailableError),
	/// Stored secret failed its integrity check or could not be decoded.
	#[error(transparent)]
	Decryption(#[from] DecryptionError),
	/// Secret could not be sealed.
	#[error(transparent)]
	Encryption(#[from] EncryptionError),

	/// Provider rejected the authorization code or refresh token.
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Provider rejected the client credentials or the request itself.
	#[error("Provider rejected the request: {reason}.")]
	UpstreamAuth {
		/// Provider- or broker-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Operator-only operation invoked without a valid grant.
	#[error("Operator access denied.")]
	AccessDenied,
}
impl Error {
	/// Returns `true` when retrying the same call later may succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Unavailable(_))
	}

	/// Returns `true` when the caller must re-run the authorization sequence.
	pub fn requires_reauthorization(&self) -> bool {
		matches!(self, Self::InvalidGrant { .. })
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// HTTP request construction failed.
	#[error("HTTP request could not be constructed.")]
	HttpRequest {
		/// Underlying request builder failure.
		#[source]
		source: SharedError,
	},
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Descriptor does not enable the requested grant.
	#[error("Descriptor `{descriptor}` does not enable the {grant} grant.")]
	UnsupportedGrant {
		/// Provider identifier string.
		descriptor: String,
		/// Disabled grant label.
		grant: &'static str,
	},

	/// Provider requires PKCE but the request carried no challenge or verifier.
	#[error("Provider `{provider}` requires PKCE; the {field} is missing.")]
	PkceRequired {
		/// Provider identifier string.
		provider: String,
		/// Missing PKCE value.
		field: &'static str,
	},
	/// Client id or secret for a provider is absent.
	#[error("Provider `{provider}` is missing its {field}.")]
	MissingCredentials {
		/// Provider identifier string.
		provider: String,
		/// Missing configuration field.
		field: &'static str,
	},
	/// Required setting is absent.
	#[error("Required setting `{name}` is not configured.")]
	MissingSetting {
		/// Setting name.
		name: &'static str,
	},
	/// Setting is present but cannot be used.
	#[error("Setting `{name}` is invalid: {reason}.")]
	InvalidSetting {
		/// Setting name.
		name: &'static str,
		/// Human-readable validation failure.
		reason: String,
	},
	/// Configuration document could not be parsed.
	#[error("Configuration document is invalid: {message}.")]
	InvalidDocument {
		/// Parser message.
		message: String,
	},
	/// Symmetric encryption key is absent.
	#[error("Encryption key is not configured.")]
	MissingEncryptionKey,
	/// Symmetric encryption key is malformed or has the wrong length.
	#[error("Encryption key is invalid: {reason}.")]
	InvalidEncryptionKey {
		/// Validation failure; never contains key material.
		reason: &'static str,
	},
	/// VAPID key material is malformed or inconsistent.
	#[error("VAPID key material is invalid: {reason}.")]
	InvalidVapidKey {
		/// Validation failure; never contains key material.
		reason: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}

	/// Wraps a request builder failure inside [`ConfigError`].
	pub fn http_request(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpRequest { source: Arc::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
impl From<oauth2::http::Error> for ConfigError {
	fn from(e: oauth2::http::Error) -> Self {
		Self::http_request(e)
	}
}

/// Upstream failures that are safe to retry later.
#[derive(Clone, Debug, ThisError)]
pub enum UnavailableError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Provider endpoint returned an unexpected response: {message}.")]
	Endpoint {
		/// Provider- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Provider responded with JSON that could not be parsed.
	#[error("Provider endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Request exceeded the configured timeout.
	#[error("Request to the {endpoint} endpoint timed out.")]
	Timeout {
		/// Endpoint label.
		endpoint: &'static str,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint label.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling a provider endpoint.")]
	Io(#[source] Arc<std::io::Error>),
}
impl UnavailableError {
	/// Wraps a transport-specific network error.
	pub fn network(endpoint: &'static str, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { endpoint, source: Arc::new(src) }
	}

	/// Wraps a JSON parsing failure.
	pub fn parse(
		source: serde_path_to_error::Error<serde_json::Error>,
		status: Option<u16>,
	) -> Self {
		Self::ResponseParse { source: Arc::new(source), status }
	}

	/// HTTP status attached to the failure, when known.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Endpoint { status, .. } | Self::ResponseParse { status, .. } => *status,
			_ => None,
		}
	}
}
impl From<std::io::Error> for UnavailableError {
	fn from(e: std::io::Error) -> Self {
		Self::Io(Arc::new(e))
	}
}

/// Integrity or decoding failure while opening an encrypted secret.
///
/// Variants carry no payload so neither ciphertext nor plaintext can leak through logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum DecryptionError {
	/// Payload is not valid base64.
	#[error("Encrypted secret is not valid base64.")]
	Encoding,
	/// Payload is shorter than nonce plus authentication tag.
	#[error("Encrypted secret is truncated.")]
	Truncated,
	/// Authentication tag mismatch: tampered payload or a different key.
	#[error("Encrypted secret failed its integrity check.")]
	Integrity,
	/// Decrypted bytes are not valid UTF-8.
	#[error("Decrypted secret is not valid UTF-8.")]
	NotUtf8,
}

/// Secret could not be sealed by the codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
#[error("Secret could not be encrypted.")]
pub struct EncryptionError;
