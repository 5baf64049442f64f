//! JSON-file [`RefreshStore`] for single-host deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{ProviderId, RefreshRecord},
	store::{RefreshStore, StoreError, StoreFuture},
};

/// Persists refresh records to a JSON file after each save.
///
/// Writes go to a sibling `.tmp` file that is synced and renamed over the target, so a crash
/// mid-write leaves the previous snapshot intact. The in-memory view only changes once the
/// snapshot reached disk.
#[derive(Clone, Debug)]
pub struct FileRefreshStore {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<ProviderId, RefreshRecord>>>,
}
impl FileRefreshStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let snapshot = load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn persist_locked(&self, contents: &HashMap<ProviderId, RefreshRecord>) -> Result<(), StoreError> {
		let mut records = contents.values().collect::<Vec<_>>();

		records.sort_by(|a, b| a.provider.cmp(&b.provider));

		let serialized =
			serde_json::to_vec_pretty(&records).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let tmp_path = self.path.with_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl RefreshStore for FileRefreshStore {
	fn save(&self, record: RefreshRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut next = guard.clone();

			next.insert(record.provider.clone(), record);
			self.persist_locked(&next)?;

			*guard = next;

			Ok(())
		})
	}

	fn load<'a>(&'a self, provider: &'a ProviderId) -> StoreFuture<'a, Option<RefreshRecord>> {
		Box::pin(async move { Ok(self.inner.read().get(provider).cloned()) })
	}
}

fn load_snapshot(path: &Path) -> Result<HashMap<ProviderId, RefreshRecord>, StoreError> {
	if !path.exists() {
		return Ok(HashMap::new());
	}

	let bytes = fs::read(path).map_err(|e| StoreError::Backend {
		message: format!("Failed to read {}: {e}", path.display()),
	})?;

	if bytes.is_empty() {
		return Ok(HashMap::new());
	}

	let records: Vec<RefreshRecord> =
		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})?;

	Ok(records.into_iter().map(|record| (record.provider.clone(), record)).collect())
}

fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
			message: format!("Failed to create store directory {}: {e}", parent.display()),
		})?;
	}

	Ok(())
}
