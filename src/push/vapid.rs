//! VAPID (RFC 8292) application server keys.
//!
//! The keypair is P-256. Keys are loaded once from configuration as base64url (the public key
//! as an uncompressed SEC1 point, the private key as the raw 32-byte scalar). When neither half
//! is configured an ephemeral pair is generated, which means browsers subscribed against it must
//! re-subscribe after a restart.
//!
//! Token signing goes through `web-push`: the signed token's `aud` is the push endpoint's origin
//! and it expires twelve hours after issue.

// crates.io
use base64::{
	Engine as _,
	engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD},
};
use p256::{ecdsa::SigningKey, elliptic_curve::rand_core::OsRng};
use web_push::{SubscriptionInfo, VapidSignature, VapidSignatureBuilder};
use zeroize::Zeroizing;
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError, obs};

/// Process-wide VAPID keypair; immutable once built.
#[derive(Clone)]
pub struct VapidKeys {
	signing: SigningKey,
	public_key: String,
	subject: Option<String>,
	ephemeral: bool,
}
impl VapidKeys {
	/// Loads a keypair from base64url material, rejecting a public key that does not belong to
	/// the private key.
	pub fn from_base64(public_key: &str, private_key: &TokenSecret) -> Result<Self, ConfigError> {
		let private_bytes = decode(private_key.expose())
			.ok_or(ConfigError::InvalidVapidKey { reason: "private key is not valid base64url" })?;
		let signing = SigningKey::from_slice(&private_bytes)
			.map_err(|_| ConfigError::InvalidVapidKey { reason: "private key is not a P-256 scalar" })?;
		let public_bytes = decode(public_key)
			.ok_or(ConfigError::InvalidVapidKey { reason: "public key is not valid base64url" })?;
		let expected = signing.verifying_key().to_encoded_point(false);

		if expected.as_bytes() != public_bytes.as_slice() {
			return Err(ConfigError::InvalidVapidKey {
				reason: "public key does not match the private key",
			});
		}

		Ok(Self::from_signing_key(signing, false))
	}

	/// Generates a fresh keypair.
	pub fn generate() -> Self {
		Self::from_signing_key(SigningKey::random(&mut OsRng), true)
	}

	/// Builds the keypair from the configured settings.
	///
	/// Both halves present loads them; both absent generates an ephemeral pair; anything else is
	/// a configuration error.
	pub fn from_settings(
		public_key: Option<&str>,
		private_key: Option<&TokenSecret>,
	) -> Result<Self, ConfigError> {
		let public_key = public_key.filter(|value| !value.trim().is_empty());
		let private_key = private_key.filter(|value| !value.expose().trim().is_empty());

		match (public_key, private_key) {
			(Some(public_key), Some(private_key)) => Self::from_base64(public_key, private_key),
			(None, None) => {
				obs::ephemeral_vapid_keys();

				Ok(Self::generate())
			},
			(Some(_), None) => Err(ConfigError::InvalidVapidKey {
				reason: "public key is configured without a private key",
			}),
			(None, Some(_)) => Err(ConfigError::InvalidVapidKey {
				reason: "private key is configured without a public key",
			}),
		}
	}

	/// Sets the `sub` claim (a `mailto:` or `https:` contact URI).
	pub fn with_subject(mut self, subject: Option<impl Into<String>>) -> Self {
		self.subject = subject.map(Into::into).filter(|subject: &String| !subject.trim().is_empty());

		self
	}

	/// Public key as base64url, the value browsers pass as `applicationServerKey`.
	pub fn public_key(&self) -> &str {
		&self.public_key
	}

	/// Private key as base64url, for persisting a generated pair.
	pub fn private_key_base64(&self) -> TokenSecret {
		TokenSecret::new(URL_SAFE_NO_PAD.encode(self.signing.to_bytes()))
	}

	/// Configured `sub` claim.
	pub fn subject(&self) -> Option<&str> {
		self.subject.as_deref()
	}

	/// Returns `true` when the pair was generated for this process only.
	pub fn is_ephemeral(&self) -> bool {
		self.ephemeral
	}

	/// Signs an ES256 token for a push to `endpoint`.
	pub fn signature(&self, endpoint: &Url) -> Result<VapidSignature, ConfigError> {
		// Only the endpoint feeds the token; the subscriber keys are not part of the signature.
		let target = SubscriptionInfo::new(endpoint.as_str(), "", "");
		let private_key = Zeroizing::new(URL_SAFE_NO_PAD.encode(self.signing.to_bytes()));
		let mut builder = VapidSignatureBuilder::from_base64(&private_key, web_push::URL_SAFE_NO_PAD, &target).map_err(|_| {
			ConfigError::InvalidVapidKey { reason: "private key was rejected by the signer" }
		})?;

		if let Some(subject) = self.subject.as_deref() {
			builder.add_claim("sub", subject);
		}

		builder
			.build()
			.map_err(|_| ConfigError::InvalidVapidKey { reason: "token could not be signed" })
	}

	/// Builds the `Authorization` header value for a push to `endpoint`.
	pub fn authorization(&self, endpoint: &Url) -> Result<String, ConfigError> {
		let signature = self.signature(endpoint)?;

		Ok(format!("vapid t={}, k={}", signature.auth_t, URL_SAFE_NO_PAD.encode(&signature.auth_k)))
	}

	fn from_signing_key(signing: SigningKey, ephemeral: bool) -> Self {
		let public_key =
			URL_SAFE_NO_PAD.encode(signing.verifying_key().to_encoded_point(false).as_bytes());

		Self { signing, public_key, subject: None, ephemeral }
	}
}
impl Debug for VapidKeys {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("VapidKeys")
			.field("public_key", &self.public_key)
			.field("private_key", &"<redacted>")
			.field("subject", &self.subject)
			.field("ephemeral", &self.ephemeral)
			.finish()
	}
}

// Operators paste keys from various generators; accept every base64 flavor.
fn decode(value: &str) -> Option<Vec<u8>> {
	let trimmed = value.trim();

	URL_SAFE_NO_PAD
		.decode(trimmed.trim_end_matches('='))
		.or_else(|_| URL_SAFE.decode(trimmed))
		.or_else(|_| STANDARD.decode(trimmed))
		.ok()
}
