//! Authenticated symmetric encryption for secrets stored outside the process.
//!
//! [`SecretCodec`] seals payloads with ChaCha20-Poly1305 under a single 256-bit key read once
//! from configuration. Every sealed payload is `nonce (12 bytes) || ciphertext || tag (16 bytes)`
//! with a fresh random nonce, so encrypting the same plaintext twice yields different blobs.
//! Tampered payloads and payloads sealed under another key fail with
//! [`DecryptionError::Integrity`]; the codec never returns unauthenticated plaintext.

// crates.io
use base64::{
	Engine as _,
	engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use chacha20poly1305::{
	ChaCha20Poly1305, Nonce,
	aead::{Aead, AeadCore, KeyInit, OsRng},
};
use serde::{Deserializer, Serializer, de::Error as DeError};
use zeroize::Zeroizing;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, DecryptionError, EncryptionError},
};

/// Key length in bytes.
pub const KEY_LEN: usize = 32;
/// Nonce length in bytes.
pub const NONCE_LEN: usize = 12;
/// Poly1305 tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Opaque sealed payload; serializes as standard base64.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedSecret(Vec<u8>);
impl EncryptedSecret {
	/// Wraps raw sealed bytes loaded from storage.
	pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
		Self(bytes.into())
	}

	/// Decodes a base64 blob produced by [`EncryptedSecret::to_base64`].
	pub fn from_base64(encoded: &str) -> Result<Self, DecryptionError> {
		STANDARD.decode(encoded.trim()).map(Self).map_err(|_| DecryptionError::Encoding)
	}

	/// Encodes the sealed bytes as standard base64.
	pub fn to_base64(&self) -> String {
		STANDARD.encode(&self.0)
	}

	/// Raw sealed bytes.
	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	/// Length of the sealed payload in bytes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when the payload is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl Debug for EncryptedSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "EncryptedSecret({} bytes)", self.0.len())
	}
}
impl Serialize for EncryptedSecret {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.to_base64())
	}
}
impl<'de> Deserialize<'de> for EncryptedSecret {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		Self::from_base64(&raw).map_err(DeError::custom)
	}
}

/// ChaCha20-Poly1305 codec keyed once at startup.
///
/// Holds no mutable state; share it behind an [`Arc`] and call it from any task.
#[derive(Clone)]
pub struct SecretCodec {
	key: Zeroizing<[u8; KEY_LEN]>,
}
impl SecretCodec {
	/// Builds a codec from raw key bytes.
	pub fn new(key: &[u8]) -> Result<Self, ConfigError> {
		let key: [u8; KEY_LEN] = key
			.try_into()
			.map_err(|_| ConfigError::InvalidEncryptionKey { reason: "key must be 32 bytes" })?;

		Ok(Self { key: Zeroizing::new(key) })
	}

	/// Builds a codec from a base64 (standard or URL-safe) encoded key.
	pub fn from_base64(encoded: &str) -> Result<Self, ConfigError> {
		let trimmed = encoded.trim();
		let bytes = Zeroizing::new(
			STANDARD
				.decode(trimmed)
				.or_else(|_| URL_SAFE_NO_PAD.decode(trimmed.trim_end_matches('=')))
				.map_err(|_| ConfigError::InvalidEncryptionKey { reason: "key is not valid base64" })?,
		);

		Self::new(&bytes)
	}

	/// Builds a codec from the configured key setting.
	pub fn from_setting(key: Option<&TokenSecret>) -> Result<Self, ConfigError> {
		match key {
			Some(secret) if !secret.expose().trim().is_empty() => Self::from_base64(secret.expose()),
			_ => Err(ConfigError::MissingEncryptionKey),
		}
	}

	/// Generates a fresh random key encoded as standard base64, for operator provisioning.
	pub fn generate_key_base64() -> TokenSecret {
		let key = ChaCha20Poly1305::generate_key(&mut OsRng);

		TokenSecret::new(STANDARD.encode(key.as_slice()))
	}

	/// Seals `plaintext` under a fresh random nonce.
	pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedSecret, EncryptionError> {
		let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
		let ciphertext = self.cipher().encrypt(&nonce, plaintext).map_err(|_| EncryptionError)?;
		let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());

		sealed.extend_from_slice(nonce.as_slice());
		sealed.extend_from_slice(&ciphertext);

		Ok(EncryptedSecret(sealed))
	}

	/// Opens a sealed payload, enforcing the authentication tag.
	pub fn decrypt(&self, sealed: &EncryptedSecret) -> Result<Vec<u8>, DecryptionError> {
		let bytes = sealed.as_bytes();

		if bytes.len() < NONCE_LEN + TAG_LEN {
			return Err(DecryptionError::Truncated);
		}

		let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);

		self.cipher()
			.decrypt(Nonce::from_slice(nonce), ciphertext)
			.map_err(|_| DecryptionError::Integrity)
	}

	/// Seals a secret string.
	pub fn seal_secret(&self, secret: &TokenSecret) -> Result<EncryptedSecret, EncryptionError> {
		self.encrypt(secret.expose().as_bytes())
	}

	/// Opens a sealed secret string.
	pub fn open_secret(&self, sealed: &EncryptedSecret) -> Result<TokenSecret, DecryptionError> {
		let plaintext = Zeroizing::new(self.decrypt(sealed)?);
		let text = std::str::from_utf8(&plaintext).map_err(|_| DecryptionError::NotUtf8)?;

		Ok(TokenSecret::new(text))
	}

	fn cipher(&self) -> ChaCha20Poly1305 {
		ChaCha20Poly1305::new((&*self.key).into())
	}
}
impl Debug for SecretCodec {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("SecretCodec(<redacted>)")
	}
}
