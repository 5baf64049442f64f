//! Short-lived access credentials cached in memory by each provider.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, token::secret::TokenSecret},
};

/// Lifecycle status for a credential at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// The issued-at instant is in the future.
	Pending,
	/// Credential is valid and outside the expiry safety margin.
	Active,
	/// Credential is within the safety margin of its expiry.
	Expiring,
	/// Credential exceeded its expiry instant.
	Expired,
}

/// Errors produced by [`CredentialBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when the relative expiry overflows the representable date range.
	#[error("Expiry lies outside the supported date range.")]
	ExpiryOutOfRange,
}

/// Bearer credential minted by a provider.
///
/// Owned by the provider's cache and replaced on every refresh.
#[derive(Clone)]
pub struct Credential {
	/// Provider that minted the credential.
	pub provider: ProviderId,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Scope string echoed by the provider, if any.
	pub scope: Option<String>,
	/// Instant the broker received the credential.
	pub issued_at: OffsetDateTime,
	/// Expiry instant derived from issued_at plus expires_in.
	pub expires_at: OffsetDateTime,
}
impl Credential {
	/// Returns a builder for the provided provider.
	pub fn builder(provider: ProviderId) -> CredentialBuilder {
		CredentialBuilder::new(provider)
	}

	/// Computes the lifecycle status at `instant`, treating the last `margin` as expiring.
	pub fn status_at(&self, instant: OffsetDateTime, margin: Duration) -> CredentialStatus {
		if instant < self.issued_at {
			return CredentialStatus::Pending;
		}
		if instant >= self.expires_at {
			return CredentialStatus::Expired;
		}
		if self.expires_at - instant <= margin {
			return CredentialStatus::Expiring;
		}

		CredentialStatus::Active
	}

	/// Returns `true` if the credential can be handed out at `instant`.
	///
	/// Credentials inside the safety margin are treated as already expired.
	pub fn is_usable_at(&self, instant: OffsetDateTime, margin: Duration) -> bool {
		matches!(self.status_at(instant, margin), CredentialStatus::Active)
	}

	/// Returns `true` if the credential has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Remaining lifetime at `instant`, clamped to zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("provider", &self.provider)
			.field("access_token", &"<redacted>")
			.field("scope", &self.scope)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`Credential`].
#[derive(Clone, Debug)]
pub struct CredentialBuilder {
	provider: ProviderId,
	access_token: Option<TokenSecret>,
	scope: Option<String>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl CredentialBuilder {
	fn new(provider: ProviderId) -> Self {
		Self {
			provider,
			access_token: None,
			scope: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Records the scope string returned by the provider.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Consumes the builder and produces a [`Credential`].
	pub fn build(self) -> Result<Credential, CredentialBuilderError> {
		let access_token = self.access_token.ok_or(CredentialBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) =>
				issued_at.checked_add(delta).ok_or(CredentialBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(CredentialBuilderError::MissingExpiry),
		};

		Ok(Credential { provider: self.provider, access_token, scope: self.scope, issued_at, expires_at })
	}
}
