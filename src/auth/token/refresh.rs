//! Durable refresh-token record persisted through a [`RefreshStore`](crate::store::RefreshStore).

// self
use crate::{_prelude::*, auth::ProviderId, codec::EncryptedSecret};

/// Encrypted refresh token plus bookkeeping; the only entity that outlives the process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
	/// Provider that issued the refresh token.
	pub provider: ProviderId,
	/// Refresh token sealed by the [`SecretCodec`](crate::codec::SecretCodec).
	pub encrypted_refresh_token: EncryptedSecret,
	/// Instant the record was last written.
	pub updated_at: OffsetDateTime,
}
impl RefreshRecord {
	/// Creates a record stamped with the current clock.
	pub fn new(provider: ProviderId, encrypted_refresh_token: EncryptedSecret) -> Self {
		Self { provider, encrypted_refresh_token, updated_at: OffsetDateTime::now_utc() }
	}
}
