//! Provider implementations.
//!
//! - [`ClientCredentialsProvider`] (Provider A): cached app token with a single-flight refresh.
//! - [`PkceProvider`] (Provider B): Authorization Code + PKCE with encrypted refresh tokens.
//! - [`SearchClient`] (Provider C): stateless catalog search.
//!
//! The two OAuth-backed providers share a [`ProviderClient`] holding the transport, descriptor,
//! classification strategy, and client credentials.

pub mod auth_code_pkce;
pub mod client_credentials;
pub mod refresh;
pub mod search;

pub use auth_code_pkce::*;
pub use client_credentials::*;
pub use refresh::*;
pub use search::*;

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ConfigError,
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{BasicFacade, ReqwestTransportErrorMapper, TransportErrorMapper},
	provider::{ClientAuthMethod, GrantType, ProviderDescriptor, ProviderStrategy},
};

/// Default safety margin: credentials this close to expiry are treated as expired.
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::seconds(60);

/// Transport, descriptor, strategy, and client credentials for one OAuth-backed provider.
pub struct ProviderClient<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Provider descriptor that defines endpoints and quirks.
	pub descriptor: ProviderDescriptor,
	/// Strategy classifying token-endpoint failures.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// OAuth client identifier; absent when not configured.
	pub client_id: Option<String>,
	/// Client secret for confidential authentication methods.
	pub client_secret: Option<TokenSecret>,
}
impl<C, M> ProviderClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			descriptor,
			strategy,
			client_id: None,
			client_secret: None,
		}
	}

	/// Sets the client identifier. Blank values count as absent.
	pub fn with_client_id(mut self, client_id: Option<impl Into<String>>) -> Self {
		self.client_id = client_id.map(Into::into).filter(|id| !id.trim().is_empty());

		self
	}

	/// Sets the client secret. Blank values count as absent.
	pub fn with_client_secret(mut self, secret: Option<TokenSecret>) -> Self {
		self.client_secret = secret.filter(|secret| !secret.expose().trim().is_empty());

		self
	}

	pub(crate) fn ensure_supported(&self, grant: GrantType) -> Result<(), ConfigError> {
		if self.descriptor.supports(grant) {
			Ok(())
		} else {
			Err(ConfigError::UnsupportedGrant {
				descriptor: self.descriptor.id.to_string(),
				grant: grant.as_str(),
			})
		}
	}

	/// Builds the token facade, failing before any network I/O when credentials are absent.
	pub(crate) fn facade(&self) -> Result<BasicFacade<C, M>, ConfigError> {
		let client_id = self.client_id.as_deref().ok_or_else(|| ConfigError::MissingCredentials {
			provider: self.descriptor.id.to_string(),
			field: "client id",
		})?;

		if self.client_secret.is_none()
			&& !matches!(self.descriptor.preferred_client_auth_method, ClientAuthMethod::NoneWithPkce)
		{
			return Err(ConfigError::MissingCredentials {
				provider: self.descriptor.id.to_string(),
				field: "client secret",
			});
		}

		BasicFacade::from_descriptor(
			&self.descriptor,
			client_id,
			self.client_secret.as_ref(),
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)
	}
}
impl<C, M> Clone for ProviderClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			descriptor: self.descriptor.clone(),
			strategy: self.strategy.clone(),
			client_id: self.client_id.clone(),
			client_secret: self.client_secret.clone(),
		}
	}
}
impl<C, M> Debug for ProviderClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderClient")
			.field("descriptor", &self.descriptor)
			.field("client_id_set", &self.client_id.is_some())
			.field("client_secret_set", &self.client_secret.is_some())
			.finish()
	}
}
