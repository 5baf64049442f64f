// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::TokenSecret};

const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::S256 => "S256",
		}
	}
}

/// Verifier/challenge pair for one authorization attempt.
///
/// The caller keeps the verifier (in memory or a short-lived session store) until the
/// redirect arrives; only the challenge travels in the authorization URL.
#[derive(Clone)]
pub struct PkceChallenge {
	verifier: TokenSecret,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkceChallenge {
	/// Generates a fresh random verifier and its S256 challenge.
	pub fn generate() -> Self {
		let verifier: String =
			rand::rng().sample_iter(Alphanumeric).take(PKCE_VERIFIER_LEN).map(char::from).collect();

		Self::from_verifier(verifier)
	}

	/// Rebuilds a pair from a stored verifier.
	pub fn from_verifier(verifier: impl Into<String>) -> Self {
		let verifier = TokenSecret::new(verifier);
		let challenge = compute_challenge(verifier.expose());

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}

	/// Secret verifier presented at the code exchange.
	pub fn verifier(&self) -> &TokenSecret {
		&self.verifier
	}

	/// Challenge derived from the verifier.
	pub fn challenge(&self) -> &str {
		&self.challenge
	}

	/// Challenge method (always `S256`).
	pub fn method(&self) -> PkceCodeChallengeMethod {
		self.method
	}
}
impl Debug for PkceChallenge {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkceChallenge")
			.field("verifier", &self.verifier)
			.field("challenge", &self.challenge)
			.field("method", &self.method)
			.finish()
	}
}

/// Inputs for composing an authorization URL.
pub(crate) struct AuthorizationRequest<'a> {
	pub(crate) endpoint: &'a Url,
	pub(crate) client_id: &'a str,
	pub(crate) redirect_uri: &'a Url,
	pub(crate) scope: Option<&'a str>,
	pub(crate) state: &'a str,
	pub(crate) challenge: Option<&'a str>,
}

pub(crate) fn build_authorize_url(request: AuthorizationRequest<'_>) -> Url {
	let mut url = request.endpoint.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", request.client_id);
	pairs.append_pair("redirect_uri", request.redirect_uri.as_str());

	if let Some(scope) = request.scope {
		pairs.append_pair("scope", scope);
	}

	pairs.append_pair("state", request.state);

	if let Some(challenge) = request.challenge {
		pairs.append_pair("code_challenge", challenge);
		pairs.append_pair("code_challenge_method", PkceCodeChallengeMethod::S256.as_str());
	}

	drop(pairs);

	url
}

pub(crate) fn compute_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
