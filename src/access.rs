//! Operator gate for administrative operations.
//!
//! Destructive or secret-adjacent operations (clearing the push registry, running diagnostics)
//! take an [`OperatorGrant`], which can only be obtained from [`OperatorGate::authorize`].
//! The gate stores a SHA-256 digest of the configured token, never the token itself, and denies
//! everything when no token is configured.

// crates.io
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::TokenSecret};

type TokenDigest = [u8; 32];

/// Proof that the caller presented the operator token.
#[derive(Debug)]
pub struct OperatorGrant {
	_private: (),
}

/// Validates operator tokens.
#[derive(Clone, Default)]
pub struct OperatorGate {
	digest: Option<TokenDigest>,
}
impl OperatorGate {
	/// Builds a gate from the configured operator token; blank tokens disable the gate.
	pub fn new(token: Option<&TokenSecret>) -> Self {
		let digest = token
			.map(TokenSecret::expose)
			.filter(|token| !token.trim().is_empty())
			.map(|token| digest(token.as_bytes()));

		Self { digest }
	}

	/// Gate that denies every request.
	pub fn deny_all() -> Self {
		Self::default()
	}

	/// Returns `true` when an operator token is configured.
	pub fn is_enabled(&self) -> bool {
		self.digest.is_some()
	}

	/// Checks `presented` against the configured token.
	pub fn authorize(&self, presented: &str) -> Result<OperatorGrant> {
		let Some(expected) = &self.digest else {
			return Err(Error::AccessDenied);
		};

		if constant_time_eq(expected, &digest(presented.as_bytes())) {
			Ok(OperatorGrant { _private: () })
		} else {
			Err(Error::AccessDenied)
		}
	}
}
impl Debug for OperatorGate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OperatorGate").field("enabled", &self.is_enabled()).finish()
	}
}

fn digest(bytes: &[u8]) -> TokenDigest {
	Sha256::digest(bytes).into()
}

// Both inputs are fixed-size digests, so only the fold over the bytes needs to avoid branching.
fn constant_time_eq(a: &TokenDigest, b: &TokenDigest) -> bool {
	a.iter().zip(b.iter()).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
