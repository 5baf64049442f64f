//! Provider B: Authorization Code + PKCE with encrypted refresh tokens.
//!
//! One attempt runs Start ([`PkceProvider::start_authorization`]), Authorize
//! ([`PkceProvider::build_authorization_url`]), then Exchange ([`PkceProvider::exchange_code`]).
//! Attempts share no mutable state, so concurrent users never interfere. Refresh tokens leave
//! the flow only after being sealed by the [`SecretCodec`]; see [`refresh`](crate::flows::refresh)
//! for the renewal path and the cached access credential.

mod session;

pub use session::{PkceChallenge, PkceCodeChallengeMethod};

// self
use crate::{
	_prelude::*,
	auth::{Credential, ProviderId, RefreshRecord, TokenSecret},
	codec::{EncryptedSecret, SecretCodec},
	error::ConfigError,
	flows::{DEFAULT_EXPIRY_MARGIN, ProviderClient, RefreshMetrics},
	health::{CredentialProvider, Diagnosis, ProbeReport, ProviderFuture, SecretHint},
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{OAuth2Facade, ReqwestTransportErrorMapper, TokenGrant, TransportErrorMapper},
	obs::{self, FlowKind},
	provider::GrantType,
	store::RefreshStore,
};

/// Token response whose refresh token has already been sealed.
#[derive(Clone, Debug)]
pub struct SealedGrant {
	/// Access credential with its computed expiry.
	pub credential: Credential,
	/// Refresh token sealed by the codec; `None` when the provider issued (or rotated) none.
	pub encrypted_refresh_token: Option<EncryptedSecret>,
}

/// Authorization Code + PKCE provider.
pub struct PkceProvider<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) client: ProviderClient<C, M>,
	pub(crate) redirect_uri: Option<Url>,
	pub(crate) scopes: Vec<String>,
	pub(crate) margin: Duration,
	pub(crate) codec: Result<Arc<SecretCodec>, ConfigError>,
	pub(crate) store: Arc<dyn RefreshStore>,
	pub(crate) cache: Mutex<Option<Credential>>,
	pub(crate) guard: AsyncMutex<()>,
	pub(crate) refresh_metrics: RefreshMetrics,
}
impl<C, M> PkceProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a provider.
	///
	/// `codec` is the outcome of loading the encryption key; a failure is kept and returned by
	/// every operation that needs the codec, before any network I/O.
	pub fn new(
		client: ProviderClient<C, M>,
		codec: Result<Arc<SecretCodec>, ConfigError>,
		store: Arc<dyn RefreshStore>,
	) -> Self {
		Self {
			client,
			redirect_uri: None,
			scopes: Vec::new(),
			margin: DEFAULT_EXPIRY_MARGIN,
			codec,
			store,
			cache: Mutex::new(None),
			guard: AsyncMutex::new(()),
			refresh_metrics: RefreshMetrics::default(),
		}
	}

	/// Sets the redirect URI registered with the provider.
	pub fn with_redirect_uri(mut self, redirect_uri: Option<Url>) -> Self {
		self.redirect_uri = redirect_uri;

		self
	}

	/// Scopes requested in the authorization URL.
	pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the expiry safety margin. Negative values are clamped to zero.
	pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
		self.margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Provider identifier.
	pub fn id(&self) -> &ProviderId {
		&self.client.descriptor.id
	}

	/// Start: generates a fresh verifier/challenge pair. No side effects.
	pub fn start_authorization(&self) -> PkceChallenge {
		PkceChallenge::generate()
	}

	/// Authorize: composes the provider's authorization URL.
	///
	/// Pure; `state` is the caller's opaque anti-forgery value and `challenge` the S256
	/// challenge from [`PkceProvider::start_authorization`]. The verifier never appears here.
	/// A blank challenge is rejected for providers that require PKCE and omitted otherwise.
	pub fn build_authorization_url(&self, state: &str, challenge: &str) -> Result<Url, ConfigError> {
		self.client.ensure_supported(GrantType::AuthorizationCode)?;

		let challenge = self.pkce_value(challenge, "code challenge")?;

		let endpoint = self.client.descriptor.authorization_endpoint()?;
		let client_id = self.client_id()?;
		let redirect_uri = self.redirect_uri()?;
		let scope = self.client.descriptor.quirks.join_scopes(&self.scopes);

		Ok(session::build_authorize_url(session::AuthorizationRequest {
			endpoint,
			client_id,
			redirect_uri,
			scope: scope.as_deref(),
			state,
			challenge,
		}))
	}

	fn pkce_value<'a>(
		&self,
		value: &'a str,
		field: &'static str,
	) -> Result<Option<&'a str>, ConfigError> {
		let value = Some(value).filter(|value| !value.trim().is_empty());

		if value.is_none() && self.client.descriptor.quirks.requires_pkce() {
			return Err(ConfigError::PkceRequired { provider: self.id().to_string(), field });
		}

		Ok(value)
	}

	/// Exchange: trades an authorization code plus its verifier for tokens.
	///
	/// The refresh token, when issued, is sealed before this returns.
	pub async fn exchange_code(&self, code: &str, verifier: &str) -> Result<SealedGrant> {
		obs::observe(FlowKind::AuthorizationCode, "exchange_code", async {
			self.client.ensure_supported(GrantType::AuthorizationCode)?;

			let verifier = self.pkce_value(verifier, "code verifier")?;
			let codec = self.codec()?;
			let redirect_uri = self.redirect_uri()?;
			let facade = self.client.facade()?;
			let strategy = self.client.strategy.as_ref();
			let grant =
				facade.exchange_authorization_code(strategy, code, verifier, redirect_uri).await?;

			seal(codec, grant)
		})
		.await
	}

	/// Exchanges the code, persists the sealed refresh token, and caches the access credential.
	pub async fn complete_authorization(&self, code: &str, verifier: &str) -> Result<Credential> {
		let _singleflight = self.guard.lock().await;
		let grant = self.exchange_code(code, verifier).await?;

		if let Some(sealed) = grant.encrypted_refresh_token {
			self.store.save(RefreshRecord::new(self.id().clone(), sealed)).await?;
		}

		*self.cache.lock() = Some(grant.credential.clone());

		Ok(grant.credential)
	}

	/// Refresh-flow counters.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.refresh_metrics
	}

	pub(crate) fn codec(&self) -> Result<&SecretCodec, ConfigError> {
		self.codec.as_deref().map_err(ConfigError::clone)
	}

	fn client_id(&self) -> Result<&str, ConfigError> {
		self.client.client_id.as_deref().ok_or_else(|| ConfigError::MissingCredentials {
			provider: self.id().to_string(),
			field: "client id",
		})
	}

	fn redirect_uri(&self) -> Result<&Url, ConfigError> {
		self.redirect_uri.as_ref().ok_or(ConfigError::MissingSetting { name: "redirect_uri" })
	}
}
impl<C, M> CredentialProvider for PkceProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn provider_id(&self) -> &ProviderId {
		self.id()
	}

	fn credential(&self) -> ProviderFuture<'_, Result<Option<TokenSecret>>> {
		Box::pin(async move { self.access_token().await.map(Some) })
	}

	fn probe(&self) -> ProviderFuture<'_, Result<ProbeReport, Diagnosis>> {
		Box::pin(async move {
			let started = std::time::Instant::now();

			match PkceProvider::credential(self).await {
				Ok(credential) => {
					let remaining = credential.remaining_at(OffsetDateTime::now_utc());

					Ok(ProbeReport::new(
						self.id().clone(),
						started.elapsed(),
						format!("token valid for {}s", remaining.whole_seconds()),
					))
				},
				Err(err) => Err(Diagnosis::from_error(self.id().clone(), &err, self.secret_hints())),
			}
		})
	}

	fn secret_hints(&self) -> Vec<SecretHint> {
		vec![
			SecretHint::identifier("client_id", self.client.client_id.as_deref()),
			SecretHint::secret("client_secret", self.client.client_secret.as_ref()),
			SecretHint::flag("token_encryption_key", self.codec.is_ok()),
			SecretHint::flag("redirect_uri", self.redirect_uri.is_some()),
		]
	}
}
impl<C, M> Debug for PkceProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkceProvider")
			.field("client", &self.client)
			.field("redirect_uri", &self.redirect_uri)
			.field("scopes", &self.scopes)
			.field("codec_ready", &self.codec.is_ok())
			.finish()
	}
}

/// Seals any refresh token in `grant`; the plaintext is dropped (and zeroized) here.
pub(crate) fn seal(codec: &SecretCodec, grant: TokenGrant) -> Result<SealedGrant> {
	let encrypted_refresh_token =
		grant.refresh_token.as_ref().map(|token| codec.seal_secret(token)).transpose()?;

	Ok(SealedGrant { credential: grant.credential, encrypted_refresh_token })
}
