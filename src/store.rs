//! Durable storage contract for encrypted refresh tokens, plus the built-in stores.
//!
//! The broker only needs `save`/`load` semantics keyed by provider; records arrive already
//! sealed by the [`SecretCodec`](crate::codec::SecretCodec), so stores never see plaintext.

pub mod file;
pub mod memory;

pub use file::FileRefreshStore;
pub use memory::MemoryRefreshStore;

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, RefreshRecord},
};

/// Boxed future returned by [`RefreshStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend for [`RefreshRecord`] values.
pub trait RefreshStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the record for `record.provider`.
	fn save(&self, record: RefreshRecord) -> StoreFuture<'_, ()>;

	/// Loads the record stored for `provider`, if any.
	fn load<'a>(&'a self, provider: &'a ProviderId) -> StoreFuture<'a, Option<RefreshRecord>>;
}

/// Error type produced by [`RefreshStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Records could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_broker_error_with_source() {
		let store_error = StoreError::Backend { message: "disk unavailable".into() };
		let broker_error: Error = store_error.clone().into();

		assert!(matches!(broker_error, Error::Storage(_)));
		assert!(broker_error.to_string().contains("disk unavailable"));

		let source = StdError::source(&broker_error)
			.expect("Broker error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}
