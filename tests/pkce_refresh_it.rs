mod common;

// crates.io
use httpmock::prelude::*;
// self
use common::*;
use encore_broker::{
	Error,
	auth::{ProviderId, RefreshRecord, TokenSecret},
	codec::{EncryptedSecret, SecretCodec},
	error::{ConfigError, DecryptionError},
	store::{MemoryRefreshStore, RefreshStore},
};

const TOKEN_PATH: &str = "/v1/oauth2/token";

fn tidal() -> ProviderId {
	ProviderId::new("tidal").expect("Provider identifier should be valid.")
}

fn codec() -> SecretCodec {
	SecretCodec::from_setting(Some(&encryption_key(7))).expect("Test key should be valid.")
}

async fn seed_refresh_token(store: &MemoryRefreshStore, refresh_token: &str) -> RefreshRecord {
	let sealed =
		codec().seal_secret(&TokenSecret::new(refresh_token)).expect("Sealing should succeed.");
	let record = RefreshRecord::new(tidal(), sealed);

	store.save(record.clone()).await.expect("Seeding the store should succeed.");

	record
}

async fn stored_record(store: &MemoryRefreshStore) -> Option<RefreshRecord> {
	store.load(&tidal()).await.expect("Store load should succeed.")
}

#[tokio::test]
async fn authorization_url_carries_challenge_but_never_the_verifier() {
	let server = MockServer::start_async().await;
	let (broker, _store) = build_broker(&config_for(&server));
	let challenge = broker.tidal().start_authorization();
	let url = broker
		.tidal()
		.build_authorization_url("csrf-state", challenge.challenge())
		.expect("Authorization URL should build.");
	let pairs = url.query_pairs().into_owned().collect::<Vec<_>>();
	let get = |key: &str| {
		pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str()).unwrap_or_default()
	};

	assert_eq!(url.path(), "/authorize");
	assert_eq!(get("client_id"), TIDAL_CLIENT_ID);
	assert_eq!(get("redirect_uri"), REDIRECT_URI);
	assert_eq!(get("response_type"), "code");
	assert_eq!(get("state"), "csrf-state");
	assert_eq!(get("code_challenge"), challenge.challenge());
	assert_eq!(get("code_challenge_method"), "S256");
	assert_eq!(get("scope"), "user.read search.read");
	assert!(!url.as_str().contains(challenge.verifier().expose()));
}

#[tokio::test]
async fn missing_redirect_uri_fails_url_construction() {
	let server = MockServer::start_async().await;
	let mut config = config_for(&server);

	config.tidal.redirect_uri = None;

	let (broker, _store) = build_broker(&config);

	assert!(matches!(
		broker.tidal().build_authorization_url("state", "challenge"),
		Err(ConfigError::MissingSetting { name: "redirect_uri" })
	));
}

#[tokio::test]
async fn pkce_is_enforced_before_any_request() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("unused", Some("unused"), 3600));
		})
		.await;
	let (broker, _store) = build_broker(&config_for(&server));

	assert!(matches!(
		broker.tidal().build_authorization_url("state", "  "),
		Err(ConfigError::PkceRequired { field: "code challenge", .. })
	));
	assert!(matches!(
		broker.tidal().complete_authorization("code", "").await,
		Err(Error::Config(ConfigError::PkceRequired { field: "code verifier", .. }))
	));

	token.assert_calls_async(0).await;
}

#[tokio::test]
async fn completing_authorization_persists_only_ciphertext() {
	let server = MockServer::start_async().await;
	let challenge_pair = encore_broker::flows::PkceChallenge::generate();
	let verifier = challenge_pair.verifier().expose().to_owned();
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "auth-code")
				.form_urlencoded_tuple("code_verifier", &verifier)
				.form_urlencoded_tuple("redirect_uri", REDIRECT_URI)
				.form_urlencoded_tuple("client_id", TIDAL_CLIENT_ID);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-1", Some("refresh-1"), 3600));
		})
		.await;
	let (broker, store) = build_broker(&config_for(&server));
	let credential = broker
		.tidal()
		.complete_authorization("auth-code", &verifier)
		.await
		.expect("Code exchange should succeed.");

	assert_eq!(credential.access_token.expose(), "access-1");

	let record = stored_record(&store).await.expect("Refresh record should be stored.");

	assert!(!record.encrypted_refresh_token.to_base64().contains("refresh-1"));
	assert_eq!(
		codec()
			.open_secret(&record.encrypted_refresh_token)
			.expect("Stored token should decrypt.")
			.expose(),
		"refresh-1"
	);
	assert_eq!(
		broker.tidal().access_token().await.expect("Cached token should be served.").expose(),
		"access-1"
	);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn reused_code_surfaces_invalid_grant_and_stores_nothing() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"code already used\"}");
		})
		.await;
	let (broker, store) = build_broker(&config_for(&server));
	let err = broker
		.tidal()
		.complete_authorization("reused", "verifier")
		.await
		.expect_err("Reused code should fail.");

	assert!(err.requires_reauthorization());
	assert!(store.is_empty());
}

#[tokio::test]
async fn refresh_rotates_and_reseals_the_stored_token() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-1")
				.form_urlencoded_tuple("client_id", TIDAL_CLIENT_ID);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-2", Some("refresh-2"), 3600));
		})
		.await;
	let (broker, store) = build_broker(&config_for(&server));
	let seeded = seed_refresh_token(&store, "refresh-1").await;
	let token = broker.tidal().access_token().await.expect("Refresh should succeed.");

	assert_eq!(token.expose(), "access-2");

	let rotated = stored_record(&store).await.expect("Rotated record should be stored.");

	assert_ne!(rotated.encrypted_refresh_token, seeded.encrypted_refresh_token);
	assert_eq!(
		codec()
			.open_secret(&rotated.encrypted_refresh_token)
			.expect("Rotated token should decrypt.")
			.expose(),
		"refresh-2"
	);
	assert_eq!(broker.tidal().refresh_metrics().successes(), 1);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn refresh_without_rotation_keeps_existing_record() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-2", None, 3600));
		})
		.await;
	let (broker, store) = build_broker(&config_for(&server));
	let seeded = seed_refresh_token(&store, "refresh-1").await;
	let grant = broker
		.tidal()
		.refresh(&seeded.encrypted_refresh_token)
		.await
		.expect("Refresh should succeed.");

	assert!(grant.encrypted_refresh_token.is_none());
	assert_eq!(stored_record(&store).await, Some(seeded));
}

#[tokio::test]
async fn revoked_refresh_token_leaves_record_untouched() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"token revoked\"}");
		})
		.await;
	let (broker, store) = build_broker(&config_for(&server));
	let seeded = seed_refresh_token(&store, "revoked").await;
	let err = broker.tidal().access_token().await.expect_err("Revoked token should fail.");

	assert!(matches!(err, Error::InvalidGrant { .. }));
	assert_eq!(stored_record(&store).await, Some(seeded));
	assert_eq!(broker.tidal().refresh_metrics().failures(), 1);
}

#[tokio::test]
async fn concurrent_refreshes_hit_the_provider_once() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(100))
				.body(token_body("access-shared", Some("refresh-2"), 3600));
		})
		.await;
	let (broker, store) = build_broker(&config_for(&server));

	seed_refresh_token(&store, "refresh-1").await;

	let tidal = broker.tidal();
	let results = futures::future::join_all((0..4).map(|_| tidal.access_token())).await;

	for result in results {
		assert_eq!(result.expect("Every caller should succeed.").expose(), "access-shared");
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn missing_record_requires_authorization_without_network() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).body(token_body("unused", None, 3600));
		})
		.await;
	let (broker, _store) = build_broker(&config_for(&server));
	let err = broker.tidal().access_token().await.expect_err("No record should fail.");

	assert!(err.requires_reauthorization());

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn tampered_record_fails_decryption_and_is_kept() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).body(token_body("unused", None, 3600));
		})
		.await;
	let (broker, store) = build_broker(&config_for(&server));
	let seeded = seed_refresh_token(&store, "refresh-1").await;
	let mut bytes = seeded.encrypted_refresh_token.as_bytes().to_vec();
	let last = bytes.len() - 1;

	bytes[last] ^= 0xff;

	let tampered = RefreshRecord::new(tidal(), EncryptedSecret::from_bytes(bytes));

	store.save(tampered.clone()).await.expect("Saving the tampered record should succeed.");

	let err = broker.tidal().access_token().await.expect_err("Tampered record should fail.");

	assert!(matches!(err, Error::Decryption(DecryptionError::Integrity)));
	assert_eq!(stored_record(&store).await, Some(tampered));

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn malformed_key_fails_before_any_network_io() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).body(token_body("unused", Some("unused"), 3600));
		})
		.await;
	let mut config = config_for(&server);

	config.security.token_encryption_key = Some(TokenSecret::new("definitely not a key"));

	let (broker, store) = build_broker(&config);

	seed_refresh_token(&store, "refresh-1").await;

	assert!(matches!(
		broker.tidal().access_token().await,
		Err(Error::Config(ConfigError::InvalidEncryptionKey { .. }))
	));
	assert!(matches!(
		broker.tidal().complete_authorization("code", "verifier").await,
		Err(Error::Config(ConfigError::InvalidEncryptionKey { .. }))
	));

	let sealed = codec().seal_secret(&TokenSecret::new("x")).expect("Sealing should succeed.");

	assert!(matches!(
		broker.tidal().refresh(&sealed).await,
		Err(Error::Config(ConfigError::InvalidEncryptionKey { .. }))
	));

	mock.assert_calls_async(0).await;
}
