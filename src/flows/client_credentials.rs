//! Provider A: client-credentials token cache with a single-flight refresh.
//!
//! A cache hit (credential outside the expiry safety margin) returns without touching the
//! network. On a miss the first caller registers a shared exchange future; every caller that
//! misses while it is pending awaits that same future, so N concurrent misses produce one token
//! request and all N observe the same credential or the same failure. No lock is held across the
//! network call. A failed exchange is dropped from the cache state so the next call retries; an
//! exchange that panics is reported as a failure to every joined caller and dropped the same way.

// std
use std::panic::AssertUnwindSafe;
// crates.io
use futures::{
	FutureExt,
	future::{BoxFuture, Shared},
};
// self
use crate::{
	_prelude::*,
	auth::{Credential, ProviderId, TokenSecret},
	error::UnavailableError,
	flows::{DEFAULT_EXPIRY_MARGIN, ProviderClient},
	health::{CredentialProvider, Diagnosis, ProbeReport, ProviderFuture, SecretHint},
	http::{ReqwestHttpClient, TokenHttpClient},
	obs::{self, FlowKind},
	oauth::{OAuth2Facade, ReqwestTransportErrorMapper, TransportErrorMapper},
	provider::GrantType,
};

type SharedExchange = Shared<BoxFuture<'static, Result<Credential>>>;

#[derive(Default)]
struct CacheState {
	current: Option<Credential>,
	in_flight: Option<(u64, SharedExchange)>,
	generation: u64,
}

/// Cached app-only access token for a client-credentials provider.
pub struct ClientCredentialsProvider<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	client: ProviderClient<C, M>,
	scopes: Vec<String>,
	margin: Duration,
	state: Arc<Mutex<CacheState>>,
}
impl<C, M> ClientCredentialsProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a provider with an empty cache and the default safety margin.
	pub fn new(client: ProviderClient<C, M>) -> Self {
		Self {
			client,
			scopes: Vec::new(),
			margin: DEFAULT_EXPIRY_MARGIN,
			state: Default::default(),
		}
	}

	/// Requests the provided scopes with every exchange.
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

	/// Returns a usable access token, exchanging client credentials on a cache miss.
	pub async fn access_token(&self) -> Result<TokenSecret> {
		self.credential().await.map(|credential| credential.access_token)
	}

	/// Returns the full cached credential, exchanging client credentials on a cache miss.
	pub async fn credential(&self) -> Result<Credential> {
		let (generation, exchange) = {
			let mut state = self.state.lock();

			if let Some(current) = state
				.current
				.as_ref()
				.filter(|credential| credential.is_usable_at(OffsetDateTime::now_utc(), self.margin))
			{
				return Ok(current.clone());
			}

			match state.in_flight.as_ref() {
				Some((generation, exchange)) => (*generation, exchange.clone()),
				None => {
					let exchange = self.start_exchange()?;

					state.generation += 1;
					state.in_flight = Some((state.generation, exchange.clone()));

					(state.generation, exchange)
				},
			}
		};
		let result = exchange.await;
		let mut state = self.state.lock();

		if state.in_flight.as_ref().is_some_and(|(current, _)| *current == generation) {
			state.in_flight = None;

			if let Ok(credential) = &result {
				state.current = Some(credential.clone());
			}
		}

		result
	}

	/// Returns the cached credential without contacting the provider.
	pub fn cached(&self) -> Option<Credential> {
		self.state.lock().current.clone()
	}

	/// Drops the cached credential, e.g. after a downstream API rejected it.
	pub fn invalidate(&self) {
		self.state.lock().current = None;
	}

	fn start_exchange(&self) -> Result<SharedExchange> {
		self.client.ensure_supported(GrantType::ClientCredentials)?;

		let facade = self.client.facade()?;
		let strategy = self.client.strategy.clone();
		let scopes = self.scopes.clone();

		Ok(contain_panics(async move {
			obs::observe(FlowKind::ClientCredentials, "exchange", async {
				facade.exchange_client_credentials(strategy.as_ref(), &scopes).await
			})
			.await
		}))
	}
}
// Joined callers never re-poll an exchange that panicked.
fn contain_panics<F>(exchange: F) -> SharedExchange
where
	F: 'static + Send + Future<Output = Result<Credential>>,
{
	AssertUnwindSafe(exchange)
		.catch_unwind()
		.map(|outcome| {
			outcome.unwrap_or_else(|_| {
				Err(UnavailableError::Endpoint {
					message: "token exchange aborted unexpectedly".into(),
					status: None,
					retry_after: None,
				}
				.into())
			})
		})
		.boxed()
		.shared()
}

impl<C, M> CredentialProvider for ClientCredentialsProvider<C, M>
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

			match ClientCredentialsProvider::credential(self).await {
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
		]
	}
}
impl<C, M> Debug for ClientCredentialsProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentialsProvider")
			.field("client", &self.client)
			.field("scopes", &self.scopes)
			.field("margin", &self.margin)
			.finish()
	}
}
