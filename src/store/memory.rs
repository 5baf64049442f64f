//! In-process [`RefreshStore`] for tests and single-process deployments.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, RefreshRecord},
	store::{RefreshStore, StoreFuture},
};

/// Keeps refresh records in memory; contents vanish with the process.
#[derive(Clone, Debug, Default)]
pub struct MemoryRefreshStore(Arc<RwLock<HashMap<ProviderId, RefreshRecord>>>);
impl MemoryRefreshStore {
	/// Number of stored records.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl RefreshStore for MemoryRefreshStore {
	fn save(&self, record: RefreshRecord) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(record.provider.clone(), record);

			Ok(())
		})
	}

	fn load<'a>(&'a self, provider: &'a ProviderId) -> StoreFuture<'a, Option<RefreshRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(provider).cloned()) })
	}
}
