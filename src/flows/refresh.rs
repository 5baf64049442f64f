//! Provider B renewal: refresh with a sealed token and the cached access credential.
//!
//! [`PkceProvider::refresh`] opens the sealed refresh token, calls the token endpoint, and seals
//! any rotated token before returning. [`PkceProvider::credential`] serves the cached access
//! credential while it is outside the safety margin; otherwise it loads the stored
//! [`RefreshRecord`], refreshes, and persists the rotated token. Concurrent callers queue on a
//! singleflight guard and re-check the cache once they hold it. A rejected refresh token leaves
//! the stored record untouched for operator inspection.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{Credential, RefreshRecord, TokenSecret},
	codec::EncryptedSecret,
	flows::{PkceProvider, SealedGrant, auth_code_pkce},
	http::TokenHttpClient,
	oauth::{OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind},
	provider::GrantType,
};

impl<C, M> PkceProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Refresh: renews the access credential from a sealed refresh token.
	///
	/// Fails with [`Error::Decryption`] when the sealed token cannot be opened and with
	/// [`Error::InvalidGrant`] when the provider revoked it.
	pub async fn refresh(&self, encrypted_refresh_token: &EncryptedSecret) -> Result<SealedGrant> {
		obs::observe(FlowKind::Refresh, "refresh", async {
			self.client.ensure_supported(GrantType::RefreshToken)?;

			let codec = self.codec()?;
			let refresh_token = codec
				.open_secret(encrypted_refresh_token)
				.inspect_err(|err| obs::stored_secret_unreadable(self.id(), err))?;
			let facade = self.client.facade()?;
			let grant = facade.refresh_token(self.client.strategy.as_ref(), &refresh_token).await?;

			auth_code_pkce::seal(codec, grant)
		})
		.await
	}

	/// Returns a usable access token, refreshing from the stored record when needed.
	pub async fn access_token(&self) -> Result<TokenSecret> {
		self.credential().await.map(|credential| credential.access_token)
	}

	/// Returns the cached access credential, refreshing from the stored record when needed.
	///
	/// Without a stored record this fails with [`Error::InvalidGrant`]: the user must authorize.
	pub async fn credential(&self) -> Result<Credential> {
		if let Some(current) = self.usable_cached() {
			return Ok(current);
		}

		let _singleflight = self.guard.lock().await;

		if let Some(current) = self.usable_cached() {
			return Ok(current);
		}

		self.codec()?;
		self.refresh_metrics.record_attempt();

		match self.refresh_from_store().await {
			Ok(credential) => {
				self.refresh_metrics.record_success();

				Ok(credential)
			},
			Err(err) => {
				self.refresh_metrics.record_failure();

				Err(err)
			},
		}
	}

	/// Returns the cached credential without contacting the provider.
	pub fn cached(&self) -> Option<Credential> {
		self.cache.lock().clone()
	}

	/// Drops the cached access credential; the stored refresh token is kept.
	pub fn invalidate(&self) {
		*self.cache.lock() = None;
	}

	async fn refresh_from_store(&self) -> Result<Credential> {
		let record = self.store.load(self.id()).await?.ok_or_else(|| Error::InvalidGrant {
			reason: "no refresh token is stored; authorization is required".into(),
		})?;
		let grant = self.refresh(&record.encrypted_refresh_token).await?;

		if let Some(rotated) = grant.encrypted_refresh_token {
			self.store.save(RefreshRecord::new(self.id().clone(), rotated)).await?;
		}

		*self.cache.lock() = Some(grant.credential.clone());

		Ok(grant.credential)
	}

	fn usable_cached(&self) -> Option<Credential> {
		self.cache
			.lock()
			.as_ref()
			.filter(|credential| credential.is_usable_at(OffsetDateTime::now_utc(), self.margin))
			.cloned()
	}
}
