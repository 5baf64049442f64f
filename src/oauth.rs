//! Token-endpoint facade over the `oauth2` crate.
//!
//! [`BasicFacade`] owns a configured `oauth2` client plus the HTTP transport and turns every
//! token response into a [`Credential`] (and, when issued, a plaintext refresh token that
//! callers must seal before it leaves the flow). Failures are classified through the
//! provider's [`ProviderStrategy`].

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{Credential, ProviderId, TokenSecret},
	error::{ConfigError, UnavailableError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{
		ClientAuthMethod, GrantType, ProviderDescriptor, ProviderErrorContext, ProviderErrorKind,
		ProviderQuirks, ProviderStrategy,
	},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(
		&self,
		strategy: &dyn ProviderStrategy,
		grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		strategy: &dyn ProviderStrategy,
		grant: GrantType,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(strategy, grant, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => UnavailableError::from(inner).into(),
			HttpClientError::Other(message) => UnavailableError::Endpoint {
				message: format!("HTTP client error while calling the token endpoint: {message}"),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
			_ => UnavailableError::Endpoint {
				message: "HTTP client error while calling the token endpoint".into(),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
		}
	}
}

/// Successful token response: the access credential plus any issued refresh token.
pub(crate) struct TokenGrant {
	pub(crate) credential: Credential,
	/// Plaintext refresh token; sealed by the caller and never returned outward.
	pub(crate) refresh_token: Option<TokenSecret>,
}

pub(crate) trait OAuth2Facade
where
	Self: Send + Sync,
{
	fn exchange_client_credentials<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		scopes: &'a [String],
	) -> FacadeFuture<'a, Credential>;

	fn exchange_authorization_code<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		code: &'a str,
		pkce_verifier: Option<&'a str>,
		redirect_uri: &'a Url,
	) -> FacadeFuture<'a, TokenGrant>;

	fn refresh_token<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		refresh_token: &'a TokenSecret,
	) -> FacadeFuture<'a, TokenGrant>;
}

pub(crate) struct BasicFacade<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	provider: ProviderId,
	quirks: ProviderQuirks,
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		client_id: &str,
		client_secret: Option<&TokenSecret>,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self, ConfigError> {
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let mut oauth_client =
			BasicClient::new(ClientId::new(client_id.to_owned())).set_token_uri(token_url);

		match (descriptor.preferred_client_auth_method, client_secret) {
			(ClientAuthMethod::NoneWithPkce, _) | (_, None) => {},
			(ClientAuthMethod::ClientSecretBasic, Some(secret)) => {
				oauth_client =
					oauth_client.set_client_secret(ClientSecret::new(secret.expose().to_owned()));
			},
			(ClientAuthMethod::ClientSecretPost, Some(secret)) => {
				oauth_client = oauth_client
					.set_client_secret(ClientSecret::new(secret.expose().to_owned()))
					.set_auth_type(AuthType::RequestBody);
			},
		}

		Ok(Self {
			provider: descriptor.id.clone(),
			quirks: descriptor.quirks,
			oauth_client,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}
}
impl<C, M> OAuth2Facade for BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_client_credentials<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		scopes: &'a [String],
	) -> FacadeFuture<'a, Credential> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let mut request = self.oauth_client.exchange_client_credentials();

			if let Some(scope) = self.quirks.join_scopes(scopes) {
				request = request.add_extra_param("scope", scope);
			}

			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(
					strategy,
					GrantType::ClientCredentials,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

			map_token_response(&self.provider, response).map(|grant| grant.credential)
		})
	}

	fn exchange_authorization_code<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		code: &'a str,
		pkce_verifier: Option<&'a str>,
		redirect_uri: &'a Url,
	) -> FacadeFuture<'a, TokenGrant> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let redirect_url = RedirectUrl::new(redirect_uri.to_string())
				.map_err(|source| ConfigError::InvalidRedirect { source })?;
			let mut request = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url));

			if let Some(verifier) = pkce_verifier {
				request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_owned()));
			}

			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(
					strategy,
					GrantType::AuthorizationCode,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

			map_token_response(&self.provider, response)
		})
	}

	fn refresh_token<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		refresh_token: &'a TokenSecret,
	) -> FacadeFuture<'a, TokenGrant> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let request = self.oauth_client.exchange_refresh_token(&refresh_secret);
			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(
					strategy,
					GrantType::RefreshToken,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

			map_token_response(&self.provider, response)
		})
	}
}

fn map_token_response(provider: &ProviderId, response: BasicTokenResponse) -> Result<TokenGrant> {
	let expires_in = response
		.expires_in()
		.ok_or_else(|| malformed_token_response("expires_in is missing"))?
		.as_secs();
	let expires_in = i64::try_from(expires_in)
		.map_err(|_| malformed_token_response("expires_in exceeds the supported range"))?;

	if expires_in <= 0 {
		return Err(malformed_token_response("expires_in must be positive"));
	}

	let mut builder = Credential::builder(provider.clone())
		.access_token(response.access_token().secret().to_owned())
		.issued_at(OffsetDateTime::now_utc())
		.expires_in(Duration::seconds(expires_in));

	if let Some(scopes) = response.scopes() {
		builder = builder
			.scope(scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" "));
	}

	let credential = builder.build().map_err(|e| malformed_token_response(&e.to_string()))?;
	let refresh_token = response.refresh_token().map(|token| TokenSecret::new(token.secret()));

	Ok(TokenGrant { credential, refresh_token })
}

fn malformed_token_response(reason: &str) -> Error {
	UnavailableError::Endpoint {
		message: format!("token response is unusable: {reason}"),
		status: None,
		retry_after: None,
	}
	.into()
}

fn map_request_error<E, M>(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, grant, response, meta),
		RequestTokenError::Request(error) => mapper.map_transport_error(strategy, grant, meta, error),
		RequestTokenError::Parse(error, body) => match meta_status(meta) {
			Some(status) if !(200..300).contains(&status) => {
				let ctx = ProviderErrorContext::new(grant)
					.with_http_status(status)
					.with_body_preview(String::from_utf8_lossy(&body));

				classified_error(
					strategy.classify_token_error(&ctx),
					format!("token endpoint answered HTTP {status}"),
					meta,
				)
			},
			status => UnavailableError::parse(error, status).into(),
		},
		RequestTokenError::Other(message) => match meta_status(meta) {
			Some(status) if !(200..300).contains(&status) => {
				let ctx = ProviderErrorContext::new(grant).with_http_status(status);

				classified_error(
					strategy.classify_token_error(&ctx),
					format!("token endpoint answered HTTP {status}"),
					meta,
				)
			},
			status => UnavailableError::Endpoint {
				message: format!("token endpoint returned an unexpected response: {message}"),
				status,
				retry_after: meta_retry_after(meta),
			}
			.into(),
		},
	}
}

fn map_server_response_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let code = response.error().as_ref().to_owned();
	let mut ctx = ProviderErrorContext::new(grant).with_oauth_error(code.clone());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	let message = match response.error_description() {
		Some(description) => format!("{code}: {description}"),
		None => code,
	};

	classified_error(strategy.classify_token_error(&ctx), message, meta)
}

fn classified_error(
	kind: ProviderErrorKind,
	message: String,
	meta: Option<&ResponseMetadata>,
) -> Error {
	match kind {
		ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason: message },
		ProviderErrorKind::UpstreamAuth =>
			Error::UpstreamAuth { reason: message, status: meta_status(meta) },
		ProviderErrorKind::Unavailable => UnavailableError::Endpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_reqwest_error(strategy: &dyn ProviderStrategy, grant: GrantType, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return UnavailableError::Timeout { endpoint: "token" }.into();
	}

	match strategy.classify_token_error(&ProviderErrorContext::network_failure(grant)) {
		ProviderErrorKind::Unavailable => UnavailableError::network("token", err).into(),
		kind => classified_error(kind, "token endpoint transport failure".into(), None),
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
