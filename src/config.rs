//! Broker configuration, read once at startup.
//!
//! [`BrokerConfig`] deserializes from TOML (every section optional) and can be layered with
//! environment overrides. Absent credentials never fail loading; the operation that needs them
//! fails instead. Malformed URLs and numbers fail loading with [`ConfigError`].
//!
//! ```toml
//! [http]
//! timeout_secs = 10
//! expiry_margin_secs = 60
//!
//! [spotify]
//! client_id = "..."
//! client_secret = "..."
//!
//! [tidal]
//! client_id = "..."
//! redirect_uri = "https://encore.example.com/tidal/callback"
//! scopes = ["user.read", "search.read"]
//!
//! [security]
//! token_encryption_key = "<base64, 32 bytes>"
//! operator_token = "..."
//! ```

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError, flows::DEFAULT_MAX_LIMIT};

/// Default Provider A token endpoint.
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
/// Default Provider B authorization endpoint.
pub const TIDAL_AUTHORIZATION_URL: &str = "https://login.tidal.com/authorize";
/// Default Provider B token endpoint.
pub const TIDAL_TOKEN_URL: &str = "https://auth.tidal.com/v1/oauth2/token";
/// Default Provider C search endpoint.
pub const DEEZER_SEARCH_URL: &str = "https://api.deezer.com/search";

/// Root configuration document.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
	/// Transport settings.
	pub http: HttpConfig,
	/// Provider A (client credentials).
	pub spotify: SpotifyConfig,
	/// Provider B (authorization code + PKCE).
	pub tidal: TidalConfig,
	/// Provider C (search).
	pub deezer: DeezerConfig,
	/// Push signing keys.
	pub vapid: VapidConfig,
	/// Encryption key and operator token.
	pub security: SecurityConfig,
}
impl BrokerConfig {
	/// Parses a TOML document.
	pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
		let config = toml::from_str::<Self>(document)
			.map_err(|e| ConfigError::InvalidDocument { message: e.message().to_owned() })?;

		config.validate()?;

		Ok(config)
	}

	/// Builds a configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Builds a configuration from defaults plus the values `lookup` returns for each variable.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		Self::default().with_overrides(lookup)
	}

	/// Applies environment-style overrides on top of this configuration.
	pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
		let secret = |name: &str| get(name).map(TokenSecret::new);

		if let Some(value) = get("SPOTIFY_CLIENT_ID") {
			self.spotify.client_id = Some(value);
		}
		if let Some(value) = secret("SPOTIFY_CLIENT_SECRET") {
			self.spotify.client_secret = Some(value);
		}
		if let Some(value) = get("SPOTIFY_TOKEN_URL") {
			self.spotify.token_url = Some(parse_url("SPOTIFY_TOKEN_URL", &value)?);
		}
		if let Some(value) = get("TIDAL_CLIENT_ID") {
			self.tidal.client_id = Some(value);
		}
		if let Some(value) = secret("TIDAL_CLIENT_SECRET") {
			self.tidal.client_secret = Some(value);
		}
		if let Some(value) = get("TIDAL_REDIRECT_URI") {
			self.tidal.redirect_uri = Some(
				Url::parse(value.trim()).map_err(|source| ConfigError::InvalidRedirect { source })?,
			);
		}
		if let Some(value) = get("TIDAL_SCOPES") {
			self.tidal.scopes = split_scopes(&value);
		}
		if let Some(value) = get("TIDAL_AUTHORIZATION_URL") {
			self.tidal.authorization_url = Some(parse_url("TIDAL_AUTHORIZATION_URL", &value)?);
		}
		if let Some(value) = get("TIDAL_TOKEN_URL") {
			self.tidal.token_url = Some(parse_url("TIDAL_TOKEN_URL", &value)?);
		}
		if let Some(value) = get("DEEZER_SEARCH_URL") {
			self.deezer.search_url = Some(parse_url("DEEZER_SEARCH_URL", &value)?);
		}
		if let Some(value) = secret("DEEZER_ACCESS_TOKEN") {
			self.deezer.access_token = Some(value);
		}
		if let Some(value) = secret("TOKEN_ENCRYPTION_KEY") {
			self.security.token_encryption_key = Some(value);
		}
		if let Some(value) = secret("BROKER_OPERATOR_TOKEN") {
			self.security.operator_token = Some(value);
		}
		if let Some(value) = get("VAPID_PUBLIC_KEY") {
			self.vapid.public_key = Some(value);
		}
		if let Some(value) = secret("VAPID_PRIVATE_KEY") {
			self.vapid.private_key = Some(value);
		}
		if let Some(value) = get("VAPID_SUBJECT") {
			self.vapid.subject = Some(value);
		}
		if let Some(value) = get("BROKER_HTTP_TIMEOUT_SECS") {
			self.http.timeout_secs = parse_secs("BROKER_HTTP_TIMEOUT_SECS", &value)?;
		}
		if let Some(value) = get("BROKER_EXPIRY_MARGIN_SECS") {
			self.http.expiry_margin_secs = parse_secs("BROKER_EXPIRY_MARGIN_SECS", &value)?;
		}

		self.validate()?;

		Ok(self)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.http.timeout_secs == 0 {
			return Err(ConfigError::InvalidSetting {
				name: "timeout_secs",
				reason: "must be greater than zero".into(),
			});
		}
		if self.deezer.max_limit == 0 {
			return Err(ConfigError::InvalidSetting {
				name: "max_limit",
				reason: "must be greater than zero".into(),
			});
		}

		Ok(())
	}
}

/// Transport settings shared by every provider.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
	/// Per-request timeout in seconds.
	pub timeout_secs: u64,
	/// Credentials this close to expiry are treated as expired.
	pub expiry_margin_secs: u64,
}
impl HttpConfig {
	/// Request timeout.
	pub fn timeout(&self) -> StdDuration {
		StdDuration::from_secs(self.timeout_secs)
	}

	/// Expiry safety margin.
	pub fn expiry_margin(&self) -> Duration {
		Duration::seconds(i64::try_from(self.expiry_margin_secs).unwrap_or(i64::MAX))
	}
}
impl Default for HttpConfig {
	fn default() -> Self {
		Self { timeout_secs: 10, expiry_margin_secs: 60 }
	}
}

/// Provider A settings.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpotifyConfig {
	/// OAuth client identifier.
	pub client_id: Option<String>,
	/// OAuth client secret.
	pub client_secret: Option<TokenSecret>,
	/// Token endpoint override.
	pub token_url: Option<Url>,
	/// Scopes requested with the client-credentials grant.
	pub scopes: Vec<String>,
}
impl SpotifyConfig {
	/// Effective token endpoint.
	pub fn token_url(&self) -> Result<Url, ConfigError> {
		endpoint_or_default(self.token_url.as_ref(), SPOTIFY_TOKEN_URL)
	}
}

/// Provider B settings.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TidalConfig {
	/// OAuth client identifier.
	pub client_id: Option<String>,
	/// Optional client secret; PKCE works without one.
	pub client_secret: Option<TokenSecret>,
	/// Redirect URI registered with the provider.
	pub redirect_uri: Option<Url>,
	/// Scopes requested during authorization.
	pub scopes: Vec<String>,
	/// Authorization endpoint override.
	pub authorization_url: Option<Url>,
	/// Token endpoint override.
	pub token_url: Option<Url>,
}
impl TidalConfig {
	/// Effective authorization endpoint.
	pub fn authorization_url(&self) -> Result<Url, ConfigError> {
		endpoint_or_default(self.authorization_url.as_ref(), TIDAL_AUTHORIZATION_URL)
	}

	/// Effective token endpoint.
	pub fn token_url(&self) -> Result<Url, ConfigError> {
		endpoint_or_default(self.token_url.as_ref(), TIDAL_TOKEN_URL)
	}
}

/// Provider C settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeezerConfig {
	/// Search endpoint override.
	pub search_url: Option<Url>,
	/// Optional app access token appended to search requests.
	pub access_token: Option<TokenSecret>,
	/// Largest page size the endpoint accepts.
	pub max_limit: u32,
}
impl DeezerConfig {
	/// Effective search endpoint.
	pub fn search_url(&self) -> Result<Url, ConfigError> {
		endpoint_or_default(self.search_url.as_ref(), DEEZER_SEARCH_URL)
	}
}
impl Default for DeezerConfig {
	fn default() -> Self {
		Self { search_url: None, access_token: None, max_limit: DEFAULT_MAX_LIMIT }
	}
}

/// VAPID key material.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VapidConfig {
	/// Uncompressed P-256 public key, base64url.
	pub public_key: Option<String>,
	/// P-256 private scalar, base64url.
	pub private_key: Option<TokenSecret>,
	/// Contact URI placed in the `sub` claim.
	pub subject: Option<String>,
}

/// Secrets guarding stored tokens and operator tooling.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
	/// Base64 ChaCha20-Poly1305 key for refresh tokens at rest.
	pub token_encryption_key: Option<TokenSecret>,
	/// Token operators present to reach administrative operations.
	pub operator_token: Option<TokenSecret>,
}

fn endpoint_or_default(configured: Option<&Url>, default: &str) -> Result<Url, ConfigError> {
	match configured {
		Some(url) => Ok(url.clone()),
		None => Url::parse(default).map_err(|source| ConfigError::InvalidDescriptor { source }),
	}
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
	Url::parse(value.trim())
		.map_err(|e| ConfigError::InvalidSetting { name, reason: e.to_string() })
}

fn parse_secs(name: &'static str, value: &str) -> Result<u64, ConfigError> {
	value
		.trim()
		.parse()
		.map_err(|_| ConfigError::InvalidSetting { name, reason: "expected whole seconds".into() })
}

fn split_scopes(value: &str) -> Vec<String> {
	value
		.split(|c: char| c == ',' || c.is_whitespace())
		.filter(|scope| !scope.is_empty())
		.map(str::to_owned)
		.collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map = pairs
			.iter()
			.map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
			.collect::<HashMap<_, _>>();

		move |name| map.get(name).cloned()
	}

	#[test]
	fn defaults_point_at_real_endpoints() {
		let config = BrokerConfig::from_lookup(|_| None).expect("Defaults should load.");

		assert_eq!(config.http.timeout(), StdDuration::from_secs(10));
		assert_eq!(config.http.expiry_margin(), Duration::seconds(60));
		assert_eq!(config.deezer.max_limit, 100);
		assert_eq!(
			config.spotify.token_url().expect("Default URL should parse.").as_str(),
			SPOTIFY_TOKEN_URL
		);
		assert!(config.tidal.redirect_uri.is_none());
		assert!(config.security.token_encryption_key.is_none());
	}

	#[test]
	fn environment_overrides_apply_and_blank_values_are_absent() {
		let config = BrokerConfig::from_lookup(lookup(&[
			("SPOTIFY_CLIENT_ID", "spotify-id"),
			("SPOTIFY_CLIENT_SECRET", "   "),
			("TIDAL_SCOPES", "user.read, search.read playlists.read"),
			("TIDAL_REDIRECT_URI", "https://encore.example.com/callback"),
			("BROKER_HTTP_TIMEOUT_SECS", "3"),
			("TOKEN_ENCRYPTION_KEY", "a2V5"),
		]))
		.expect("Overrides should load.");

		assert_eq!(config.spotify.client_id.as_deref(), Some("spotify-id"));
		assert!(config.spotify.client_secret.is_none());
		assert_eq!(config.tidal.scopes, ["user.read", "search.read", "playlists.read"]);
		assert_eq!(config.http.timeout(), StdDuration::from_secs(3));
		assert!(!format!("{config:?}").contains("a2V5"));
	}

	#[test]
	fn malformed_values_fail_loading() {
		assert!(matches!(
			BrokerConfig::from_lookup(lookup(&[("BROKER_HTTP_TIMEOUT_SECS", "ten")])),
			Err(ConfigError::InvalidSetting { name: "BROKER_HTTP_TIMEOUT_SECS", .. })
		));
		assert!(matches!(
			BrokerConfig::from_lookup(lookup(&[("BROKER_HTTP_TIMEOUT_SECS", "0")])),
			Err(ConfigError::InvalidSetting { name: "timeout_secs", .. })
		));
		assert!(matches!(
			BrokerConfig::from_lookup(lookup(&[("TIDAL_REDIRECT_URI", "not a url")])),
			Err(ConfigError::InvalidRedirect { .. })
		));
		assert!(matches!(
			BrokerConfig::from_toml_str("[spotify]\ntoken_url = \"::\"\n"),
			Err(ConfigError::InvalidDocument { .. })
		));
		assert!(matches!(
			BrokerConfig::from_toml_str("[unknown]\n"),
			Err(ConfigError::InvalidDocument { .. })
		));
	}

	#[test]
	fn toml_document_layers_with_environment() {
		let config = BrokerConfig::from_toml_str(
			r#"
			[http]
			expiry_margin_secs = 30

			[tidal]
			client_id = "tidal-id"
			scopes = ["user.read"]

			[deezer]
			max_limit = 50
			"#,
		)
		.expect("Document should parse.")
		.with_overrides(lookup(&[("TIDAL_CLIENT_ID", "from-env")]))
		.expect("Overrides should apply.");

		assert_eq!(config.http.expiry_margin(), Duration::seconds(30));
		assert_eq!(config.http.timeout_secs, 10);
		assert_eq!(config.tidal.client_id.as_deref(), Some("from-env"));
		assert_eq!(config.tidal.scopes, ["user.read"]);
		assert_eq!(config.deezer.max_limit, 50);
	}
}
