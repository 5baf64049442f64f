//! Shared helpers for integration tests.

#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use httpmock::MockServer;
// self
use encore_broker::{
	Broker,
	auth::TokenSecret,
	config::BrokerConfig,
	http::ReqwestHttpClient,
	reqwest::Client,
	store::{MemoryRefreshStore, RefreshStore},
	url::Url,
};

pub const SPOTIFY_CLIENT_ID: &str = "spotify-client";
pub const SPOTIFY_CLIENT_SECRET: &str = "spotify-secret";
pub const TIDAL_CLIENT_ID: &str = "tidal-client";
pub const REDIRECT_URI: &str = "https://encore.example.com/tidal/callback";
pub const OPERATOR_TOKEN: &str = "operator-token";

/// Reqwest client that accepts the self-signed certificates `httpmock` serves.
pub fn test_http_client() -> ReqwestHttpClient {
	test_http_client_with_timeout(std::time::Duration::from_secs(5))
}

pub fn test_http_client_with_timeout(timeout: std::time::Duration) -> ReqwestHttpClient {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.timeout(timeout)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

pub fn mock_url(server: &MockServer, path: &str) -> Url {
	Url::parse(&server.url(path)).expect("Mock endpoint should parse.")
}

pub fn encryption_key(byte: u8) -> TokenSecret {
	TokenSecret::new(STANDARD.encode([byte; 32]))
}

/// Configuration with every provider pointed at `server` and all credentials present.
pub fn config_for(server: &MockServer) -> BrokerConfig {
	let mut config = BrokerConfig::default();

	config.spotify.client_id = Some(SPOTIFY_CLIENT_ID.into());
	config.spotify.client_secret = Some(TokenSecret::new(SPOTIFY_CLIENT_SECRET));
	config.spotify.token_url = Some(mock_url(server, "/api/token"));
	config.tidal.client_id = Some(TIDAL_CLIENT_ID.into());
	config.tidal.redirect_uri = Some(Url::parse(REDIRECT_URI).expect("Redirect should parse."));
	config.tidal.scopes = vec!["user.read".into(), "search.read".into()];
	config.tidal.authorization_url = Some(mock_url(server, "/authorize"));
	config.tidal.token_url = Some(mock_url(server, "/v1/oauth2/token"));
	config.deezer.search_url = Some(mock_url(server, "/search"));
	config.security.token_encryption_key = Some(encryption_key(7));
	config.security.operator_token = Some(TokenSecret::new(OPERATOR_TOKEN));

	config
}

pub fn build_broker(config: &BrokerConfig) -> (Broker, Arc<MemoryRefreshStore>) {
	build_broker_with(config, test_http_client())
}

pub fn build_broker_with(
	config: &BrokerConfig,
	http_client: ReqwestHttpClient,
) -> (Broker, Arc<MemoryRefreshStore>) {
	let store = Arc::new(MemoryRefreshStore::default());
	let broker =
		Broker::with_http_client(config, store.clone() as Arc<dyn RefreshStore>, http_client)
			.expect("Broker should build for tests.");

	(broker, store)
}

pub fn token_body(access_token: &str, refresh_token: Option<&str>, expires_in: i64) -> String {
	match refresh_token {
		Some(refresh) => format!(
			"{{\"access_token\":\"{access_token}\",\"refresh_token\":\"{refresh}\",\"token_type\":\"Bearer\",\"expires_in\":{expires_in}}}"
		),
		None => format!(
			"{{\"access_token\":\"{access_token}\",\"token_type\":\"Bearer\",\"expires_in\":{expires_in}}}"
		),
	}
}
