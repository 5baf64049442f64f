//! Top-level facade wiring every component from a [`BrokerConfig`].
//!
//! [`Broker::from_config`] only fails for problems that make the broker unusable as a whole:
//! the HTTP client cannot be built or an endpoint is malformed. Missing credentials, a malformed
//! encryption key, or bad VAPID material are kept and surface from the operations that need
//! them, before any network I/O.

// self
use crate::{
	_prelude::*,
	access::{OperatorGate, OperatorGrant},
	auth::ProviderId,
	codec::SecretCodec,
	config::BrokerConfig,
	error::ConfigError,
	flows::{ClientCredentialsProvider, PkceProvider, ProviderClient, SearchClient},
	health::{Diagnosis, Diagnostics, ProbeReport},
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	provider::{
		ClientAuthMethod, DefaultProviderStrategy, GrantType, ProviderDescriptor, ProviderQuirks,
		ProviderStrategy,
	},
	push::{FanOutReport, PushRegistry, PushTransport, VapidKeys},
	store::RefreshStore,
};

/// Provider A identifier.
pub const SPOTIFY: &str = "spotify";
/// Provider B identifier.
pub const TIDAL: &str = "tidal";
/// Provider C identifier.
pub const DEEZER: &str = "deezer";

/// Every broker component, constructed once and shared across request handlers.
#[derive(Debug)]
pub struct Broker {
	spotify: Arc<ClientCredentialsProvider>,
	tidal: Arc<PkceProvider>,
	deezer: Arc<SearchClient>,
	push: Arc<PushRegistry>,
	vapid: Result<Arc<VapidKeys>, ConfigError>,
	gate: OperatorGate,
	diagnostics: Diagnostics,
}
impl Broker {
	/// Builds the broker with a fresh HTTP client honoring `config.http`.
	pub fn from_config(config: &BrokerConfig, store: Arc<dyn RefreshStore>) -> Result<Self> {
		let http = ReqwestHttpClient::new(config.http.timeout())?;

		Self::with_http_client(config, store, http)
	}

	/// Builds the broker around a caller-supplied HTTP client.
	pub fn with_http_client(
		config: &BrokerConfig,
		store: Arc<dyn RefreshStore>,
		http: ReqwestHttpClient,
	) -> Result<Self> {
		let http = Arc::new(http);
		let mapper = Arc::new(ReqwestTransportErrorMapper);
		let strategy: Arc<dyn ProviderStrategy> = Arc::new(DefaultProviderStrategy);
		let margin = config.http.expiry_margin();
		let spotify_client = ProviderClient::with_http_client(
			spotify_descriptor(config)?,
			strategy.clone(),
			http.clone(),
			mapper.clone(),
		)
		.with_client_id(config.spotify.client_id.clone())
		.with_client_secret(config.spotify.client_secret.clone());
		let spotify = Arc::new(
			ClientCredentialsProvider::new(spotify_client)
				.with_scopes(config.spotify.scopes.clone())
				.with_expiry_margin(margin),
		);
		let codec =
			SecretCodec::from_setting(config.security.token_encryption_key.as_ref()).map(Arc::new);
		let tidal_client =
			ProviderClient::with_http_client(tidal_descriptor(config)?, strategy, http.clone(), mapper)
				.with_client_id(config.tidal.client_id.clone())
				.with_client_secret(config.tidal.client_secret.clone());
		let tidal = Arc::new(
			PkceProvider::new(tidal_client, codec, store)
				.with_redirect_uri(config.tidal.redirect_uri.clone())
				.with_scopes(config.tidal.scopes.clone())
				.with_expiry_margin(margin),
		);
		let deezer = Arc::new(
			SearchClient::new(provider_id(DEEZER)?, (*http).clone(), config.deezer.search_url()?)
				.with_access_token(config.deezer.access_token.clone())
				.with_max_limit(config.deezer.max_limit),
		);
		let vapid = VapidKeys::from_settings(
			config.vapid.public_key.as_deref(),
			config.vapid.private_key.as_ref(),
		)
		.map(|keys| Arc::new(keys.with_subject(config.vapid.subject.clone())));
		let mut diagnostics = Diagnostics::new();

		diagnostics.register(spotify.clone());
		diagnostics.register(tidal.clone());
		diagnostics.register(deezer.clone());

		Ok(Self {
			spotify,
			tidal,
			deezer,
			push: Arc::new(PushRegistry::new()),
			vapid,
			gate: OperatorGate::new(config.security.operator_token.as_ref()),
			diagnostics,
		})
	}

	/// Provider A.
	pub fn spotify(&self) -> &Arc<ClientCredentialsProvider> {
		&self.spotify
	}

	/// Provider B.
	pub fn tidal(&self) -> &Arc<PkceProvider> {
		&self.tidal
	}

	/// Provider C.
	pub fn deezer(&self) -> &Arc<SearchClient> {
		&self.deezer
	}

	/// Push subscription registry.
	pub fn push_registry(&self) -> &Arc<PushRegistry> {
		&self.push
	}

	/// VAPID keypair, or the configuration error raised while loading it.
	pub fn vapid(&self) -> Result<&Arc<VapidKeys>, ConfigError> {
		self.vapid.as_ref().map_err(ConfigError::clone)
	}

	/// Checks an operator token.
	pub fn authorize_operator(&self, presented: &str) -> Result<OperatorGrant> {
		self.gate.authorize(presented)
	}

	/// Diagnostics facade over all three providers.
	pub fn diagnostics(&self) -> &Diagnostics {
		&self.diagnostics
	}

	/// Probes every provider.
	pub async fn probe_all(&self, grant: &OperatorGrant) -> Vec<Result<ProbeReport, Diagnosis>> {
		self.diagnostics.probe_all(grant).await
	}

	/// Sends `payload` to every registered subscriber.
	pub async fn notify_all(
		&self,
		transport: &dyn PushTransport,
		payload: &[u8],
	) -> Result<FanOutReport> {
		let vapid = self.vapid()?;

		Ok(self.push.fan_out(transport, vapid, payload).await)
	}

	/// Drops every push subscription.
	pub fn clear_push_subscriptions(&self, grant: &OperatorGrant) -> usize {
		self.push.clear_all(grant)
	}
}

fn provider_id(name: &'static str) -> Result<ProviderId, ConfigError> {
	ProviderId::new(name)
		.map_err(|e| ConfigError::InvalidSetting { name: "provider_id", reason: e.to_string() })
}

fn spotify_descriptor(config: &BrokerConfig) -> Result<ProviderDescriptor, ConfigError> {
	Ok(ProviderDescriptor::builder(provider_id(SPOTIFY)?)
		.token_endpoint(config.spotify.token_url()?)
		.support_grant(GrantType::ClientCredentials)
		.preferred_client_auth_method(ClientAuthMethod::ClientSecretBasic)
		.build()?)
}

fn tidal_descriptor(config: &BrokerConfig) -> Result<ProviderDescriptor, ConfigError> {
	// Confidential clients post their secret; public clients rely on PKCE alone.
	let auth_method = match &config.tidal.client_secret {
		Some(secret) if !secret.expose().trim().is_empty() => ClientAuthMethod::ClientSecretPost,
		_ => ClientAuthMethod::NoneWithPkce,
	};

	Ok(ProviderDescriptor::builder(provider_id(TIDAL)?)
		.authorization_endpoint(config.tidal.authorization_url()?)
		.token_endpoint(config.tidal.token_url()?)
		.support_grant(GrantType::AuthorizationCode)
		.support_grant(GrantType::RefreshToken)
		.preferred_client_auth_method(auth_method)
		.quirks(ProviderQuirks::pkce_required())
		.build()?)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		health::{CredentialProvider, FailureKind},
		store::MemoryRefreshStore,
	};

	fn broker(config: &BrokerConfig) -> Broker {
		Broker::from_config(config, Arc::new(MemoryRefreshStore::default()))
			.expect("Broker should build from defaults.")
	}

	#[test]
	fn defaults_build_without_credentials() {
		let broker = broker(&BrokerConfig::default());

		assert_eq!(broker.diagnostics().provider_ids().len(), 3);
		assert!(broker.vapid().expect("Absent keys should generate.").is_ephemeral());
		assert!(matches!(broker.authorize_operator(""), Err(Error::AccessDenied)));
		assert!(broker.tidal().codec().is_err());
	}

	#[test]
	fn malformed_vapid_material_is_deferred_to_push_operations() {
		let mut config = BrokerConfig::default();

		config.vapid.public_key = Some("BAAA".into());

		let broker = broker(&config);

		assert!(matches!(broker.vapid(), Err(ConfigError::InvalidVapidKey { .. })));
	}

	#[tokio::test]
	async fn missing_credentials_fail_before_network() {
		let mut config = BrokerConfig::default();

		config.security.operator_token = Some(crate::auth::TokenSecret::new("ops"));

		let broker = broker(&config);
		let grant = broker.authorize_operator("ops").expect("Operator token should be accepted.");
		let results = broker.diagnostics().secret_hints(&grant);

		assert_eq!(results.len(), 3);
		assert!(results.iter().flat_map(|(_, hints)| hints).all(|hint| hint.prefix.is_none()));
		assert!(matches!(
			broker.spotify().access_token().await,
			Err(Error::Config(ConfigError::MissingCredentials { field: "client id", .. }))
		));

		let diagnosis = match CredentialProvider::probe(broker.tidal().as_ref()).await {
			Err(diagnosis) => diagnosis,
			Ok(_) => panic!("Tidal probe should fail without configuration."),
		};

		assert_eq!(diagnosis.kind, FailureKind::Configuration);
	}
}
