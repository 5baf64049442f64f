//! Provider C: stateless catalog search.
//!
//! Each call issues one `GET` with the query passed through untouched and the result count
//! clamped to the provider's page size. Results are never cached. The response is consumed
//! opportunistically: a `{ "data": [...] }` envelope or a bare list, tracks missing optional
//! fields or carrying `null` in them, and ids given as numbers or strings are all accepted.
//! Items that cannot be read as a track (no id, wrong shape) are skipped; the rest of the page
//! is still returned.

// crates.io
use serde::{Deserializer, de::Error as DeError};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{ProviderId, TokenSecret},
	error::UnavailableError,
	health::{CredentialProvider, Diagnosis, ProbeReport, ProviderFuture, SecretHint},
	http::{self, ReqwestHttpClient},
	obs::{self, FlowKind},
};

/// Default (and maximum) page size accepted by the search endpoint.
pub const DEFAULT_MAX_LIMIT: u32 = 100;

const PROBE_QUERY: &str = "a";

/// Track-like search result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
	/// Provider-side identifier, normalized to a string.
	#[serde(deserialize_with = "id_from_number_or_string")]
	pub id: String,
	/// Track title.
	#[serde(default, deserialize_with = "null_as_default")]
	pub title: String,
	/// Duration in seconds.
	#[serde(default)]
	pub duration: Option<u32>,
	/// Explicit-lyrics flag.
	#[serde(default)]
	pub explicit_lyrics: Option<bool>,
	/// Preview clip URL.
	#[serde(default)]
	pub preview: Option<String>,
	/// Provider page URL.
	#[serde(default)]
	pub link: Option<String>,
	/// Primary artist.
	#[serde(default)]
	pub artist: Option<TrackArtist>,
	/// Album the track belongs to.
	#[serde(default)]
	pub album: Option<TrackAlbum>,
}

/// Artist attached to a [`Track`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackArtist {
	/// Artist identifier.
	#[serde(default, deserialize_with = "optional_id")]
	pub id: Option<String>,
	/// Display name.
	#[serde(default, deserialize_with = "null_as_default")]
	pub name: String,
}

/// Album attached to a [`Track`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackAlbum {
	/// Album identifier.
	#[serde(default, deserialize_with = "optional_id")]
	pub id: Option<String>,
	/// Album title.
	#[serde(default, deserialize_with = "null_as_default")]
	pub title: String,
	/// Medium-size cover art URL.
	#[serde(default)]
	pub cover_medium: Option<String>,
}

// Bare lists are tried first; derived struct visitors would otherwise accept a one-element list.
#[derive(Deserialize)]
#[serde(untagged)]
enum SearchPayload {
	List(Vec<Value>),
	Failure { error: Value },
	Page { data: Vec<Value> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
	Number(serde_json::Number),
	Text(String),
}
impl From<RawId> for String {
	fn from(value: RawId) -> Self {
		match value {
			RawId::Number(number) => number.to_string(),
			RawId::Text(text) => text,
		}
	}
}

/// Stateless search client.
#[derive(Clone)]
pub struct SearchClient {
	id: ProviderId,
	http: ReqwestHttpClient,
	search_url: Url,
	access_token: Option<TokenSecret>,
	max_limit: u32,
}
impl SearchClient {
	/// Creates a client for `search_url`.
	pub fn new(id: ProviderId, http: ReqwestHttpClient, search_url: Url) -> Self {
		Self { id, http, search_url, access_token: None, max_limit: DEFAULT_MAX_LIMIT }
	}

	/// Appends an app access token to every request.
	pub fn with_access_token(mut self, token: Option<TokenSecret>) -> Self {
		self.access_token = token.filter(|token| !token.expose().trim().is_empty());

		self
	}

	/// Overrides the provider's maximum page size (at least 1).
	pub fn with_max_limit(mut self, max_limit: u32) -> Self {
		self.max_limit = max_limit.max(1);

		self
	}

	/// Provider identifier.
	pub fn id(&self) -> &ProviderId {
		&self.id
	}

	/// Searches the catalog, returning tracks in provider order.
	///
	/// `limit` is clamped into `1..=max_limit`.
	pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<Track>> {
		obs::observe(FlowKind::Search, "search", self.fetch(query, limit.clamp(1, self.max_limit)))
			.await
	}

	/// Health probe: a minimal search expecting a structurally valid, possibly empty, page.
	pub async fn probe(&self) -> Result<usize> {
		self.search(PROBE_QUERY, 1).await.map(|tracks| tracks.len())
	}

	async fn fetch(&self, query: &str, limit: u32) -> Result<Vec<Track>> {
		let mut url = self.search_url.clone();

		{
			let mut pairs = url.query_pairs_mut();

			pairs.append_pair("q", query);
			pairs.append_pair("limit", &limit.to_string());

			if let Some(token) = self.access_token.as_ref() {
				pairs.append_pair("access_token", token.expose());
			}
		}

		let response = self.http.get(url).send().await.map_err(transport_error)?;
		let status = response.status();

		if !status.is_success() {
			return Err(UnavailableError::Endpoint {
				message: format!("search endpoint answered HTTP {}", status.as_u16()),
				status: Some(status.as_u16()),
				retry_after: http::parse_retry_after(response.headers()),
			}
			.into());
		}

		let body = response.bytes().await.map_err(transport_error)?;
		let payload: SearchPayload =
			serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(&body))
				.map_err(|e| UnavailableError::parse(e, Some(status.as_u16())))?;

		match payload {
			SearchPayload::List(items) | SearchPayload::Page { data: items } => Ok(usable_tracks(items)),
			SearchPayload::Failure { error } => Err(UnavailableError::Endpoint {
				message: format!("search endpoint reported an error: {}", describe_failure(&error)),
				status: Some(status.as_u16()),
				retry_after: None,
			}
			.into()),
		}
	}
}
impl CredentialProvider for SearchClient {
	fn provider_id(&self) -> &ProviderId {
		&self.id
	}

	fn credential(&self) -> ProviderFuture<'_, Result<Option<TokenSecret>>> {
		Box::pin(async move { Ok(self.access_token.clone()) })
	}

	fn probe(&self) -> ProviderFuture<'_, Result<ProbeReport, Diagnosis>> {
		Box::pin(async move {
			let started = std::time::Instant::now();

			match SearchClient::probe(self).await {
				Ok(count) => Ok(ProbeReport::new(
					self.id.clone(),
					started.elapsed(),
					format!("search returned {count} result(s)"),
				)),
				Err(err) => Err(Diagnosis::from_error(self.id.clone(), &err, self.secret_hints())),
			}
		})
	}

	fn secret_hints(&self) -> Vec<SecretHint> {
		vec![SecretHint::secret("access_token", self.access_token.as_ref())]
	}
}
impl Debug for SearchClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SearchClient")
			.field("id", &self.id)
			.field("search_url", &self.search_url.as_str())
			.field("access_token", &self.access_token)
			.field("max_limit", &self.max_limit)
			.finish()
	}
}

// Drops the URL from reqwest errors; it may carry the access token.
fn transport_error(err: ReqwestError) -> Error {
	if err.is_timeout() {
		UnavailableError::Timeout { endpoint: "search" }.into()
	} else {
		UnavailableError::network("search", err.without_url()).into()
	}
}

fn usable_tracks(items: Vec<Value>) -> Vec<Track> {
	let total = items.len();
	let tracks: Vec<Track> =
		items.into_iter().filter_map(|item| serde_json::from_value(item).ok()).collect();

	if tracks.len() < total {
		obs::search_results_skipped(total - tracks.len());
	}

	tracks
}

fn describe_failure(error: &Value) -> String {
	let text = match error {
		Value::String(message) => message.clone(),
		Value::Object(fields) => fields
			.get("message")
			.or_else(|| fields.get("type"))
			.and_then(Value::as_str)
			.unwrap_or("unknown error")
			.to_owned(),
		_ => "unknown error".to_owned(),
	};

	text.chars().take(200).collect()
}

fn id_from_number_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	let id = String::from(RawId::deserialize(deserializer)?);

	if id.is_empty() { Err(DeError::custom("track id is empty")) } else { Ok(id) }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}
