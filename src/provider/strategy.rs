//! Classification hooks mapping token-endpoint failures into the broker error taxonomy.
//!
//! Strategies see only primitive data (status code, OAuth fields, a body preview) so they
//! stay independent of the HTTP client that produced the failure.

// self
use crate::{_prelude::*, provider::descriptor::GrantType};

/// Strategy hook classifying failed token requests.
pub trait ProviderStrategy
where
	Self: Send + Sync,
{
	/// Maps a failed token request onto a [`ProviderErrorKind`].
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;
}

/// Canonical failure categories produced by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// The authorization code or refresh token is expired, reused, or revoked.
	InvalidGrant,
	/// Any other rejection of the client or the request.
	UpstreamAuth,
	/// Temporary failure; the caller may retry later.
	Unavailable,
}

/// Context passed to strategies when classifying token errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant type associated with the failing request.
	pub grant_type: GrantType,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of the response body for non-JSON payloads.
	pub body_preview: Option<String>,
	/// The failure happened below HTTP (connect, TLS, timeout).
	pub network_error: bool,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context scoped to the provided grant type.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
			network_error: false,
		}
	}

	/// Context for transport-level failures.
	pub fn network_failure(grant_type: GrantType) -> Self {
		Self { network_error: true, ..Self::new(grant_type) }
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth `error` code returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a truncated preview of a non-JSON body.
	pub fn with_body_preview(mut self, body: impl AsRef<str>) -> Self {
		self.body_preview =
			Some(body.as_ref().chars().take(Self::BODY_PREVIEW_LIMIT).collect::<String>());

		self
	}
}

/// Default strategy shared by the OAuth-backed providers.
///
/// Precedence: transport failures, then the OAuth `error` code, then throttling and server
/// statuses, then hints in the body. Anything left is an upstream rejection.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-provider-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.network_error {
			return ProviderErrorKind::Unavailable;
		}
		if let Some(kind) = ctx.oauth_error.as_deref().and_then(classify_oauth_code) {
			return kind;
		}
		if matches!(ctx.http_status, Some(429 | 500..=599)) {
			return ProviderErrorKind::Unavailable;
		}

		[ctx.error_description.as_deref(), ctx.body_preview.as_deref()]
			.into_iter()
			.flatten()
			.find_map(classify_hint)
			.unwrap_or(ProviderErrorKind::UpstreamAuth)
	}
}

fn classify_oauth_code(code: &str) -> Option<ProviderErrorKind> {
	if code.eq_ignore_ascii_case("invalid_grant") {
		Some(ProviderErrorKind::InvalidGrant)
	} else if code.eq_ignore_ascii_case("temporarily_unavailable")
		|| code.eq_ignore_ascii_case("server_error")
	{
		Some(ProviderErrorKind::Unavailable)
	} else {
		None
	}
}

fn classify_hint(text: &str) -> Option<ProviderErrorKind> {
	let lowered = text.to_ascii_lowercase();

	if lowered.contains("invalid_grant") {
		Some(ProviderErrorKind::InvalidGrant)
	} else if lowered.contains("temporarily_unavailable") {
		Some(ProviderErrorKind::Unavailable)
	} else {
		None
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn classify(ctx: ProviderErrorContext) -> ProviderErrorKind {
		DefaultProviderStrategy.classify_token_error(&ctx)
	}

	#[test]
	fn invalid_grant_wins_over_status() {
		assert_eq!(
			classify(
				ProviderErrorContext::new(GrantType::RefreshToken)
					.with_http_status(400)
					.with_oauth_error("invalid_grant")
			),
			ProviderErrorKind::InvalidGrant
		);
		assert_eq!(
			classify(
				ProviderErrorContext::new(GrantType::AuthorizationCode)
					.with_http_status(400)
					.with_body_preview("<html>invalid_grant: code reused</html>")
			),
			ProviderErrorKind::InvalidGrant
		);
	}

	#[test]
	fn throttling_and_server_errors_are_unavailable() {
		for status in [429_u16, 500, 502, 503] {
			assert_eq!(
				classify(ProviderErrorContext::new(GrantType::ClientCredentials).with_http_status(status)),
				ProviderErrorKind::Unavailable
			);
		}

		assert_eq!(
			classify(
				ProviderErrorContext::new(GrantType::ClientCredentials)
					.with_http_status(400)
					.with_oauth_error("temporarily_unavailable")
			),
			ProviderErrorKind::Unavailable
		);
		assert_eq!(
			classify(ProviderErrorContext::network_failure(GrantType::RefreshToken)),
			ProviderErrorKind::Unavailable
		);
	}

	#[test]
	fn other_rejections_are_upstream_auth() {
		for code in ["invalid_client", "unauthorized_client", "invalid_request", "invalid_scope"] {
			assert_eq!(
				classify(
					ProviderErrorContext::new(GrantType::ClientCredentials)
						.with_http_status(400)
						.with_oauth_error(code)
				),
				ProviderErrorKind::UpstreamAuth
			);
		}

		assert_eq!(
			classify(ProviderErrorContext::new(GrantType::ClientCredentials).with_http_status(401)),
			ProviderErrorKind::UpstreamAuth
		);
	}

	#[test]
	fn body_preview_is_truncated() {
		let ctx = ProviderErrorContext::new(GrantType::ClientCredentials)
			.with_body_preview("x".repeat(1_000));

		assert_eq!(ctx.body_preview.map(|body| body.len()), Some(256));
	}
}
