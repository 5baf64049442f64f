mod common;

// std
use std::{env, fs, path::PathBuf, process, sync::Arc};
// crates.io
use httpmock::prelude::*;
use time::OffsetDateTime;
// self
use common::*;
use encore_broker::{Broker, store::FileRefreshStore};

fn temp_path(label: &str) -> PathBuf {
	env::temp_dir().join(format!(
		"encore_broker_it_{label}_{}_{}.json",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	))
}

#[tokio::test]
async fn sealed_refresh_token_survives_a_restart() {
	let server = MockServer::start_async().await;
	let path = temp_path("restart");
	let config = config_for(&server);
	let exchange = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/v1/oauth2/token")
				.form_urlencoded_tuple("grant_type", "authorization_code");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-1", Some("refresh-1"), 3600));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/v1/oauth2/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-1");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-2", None, 3600));
		})
		.await;

	{
		let store = Arc::new(FileRefreshStore::open(&path).expect("Store should open."));
		let broker = Broker::with_http_client(&config, store, test_http_client())
			.expect("Broker should build.");

		broker
			.tidal()
			.complete_authorization("code", "verifier")
			.await
			.expect("Authorization should complete.");
	}

	let snapshot = fs::read_to_string(&path).expect("Snapshot should exist.");

	assert!(!snapshot.contains("refresh-1"));

	let store = Arc::new(FileRefreshStore::open(&path).expect("Store should reopen."));
	let broker =
		Broker::with_http_client(&config, store, test_http_client()).expect("Broker should build.");
	let token = broker.tidal().access_token().await.expect("Refresh after restart should work.");

	assert_eq!(token.expose(), "access-2");

	exchange.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;

	let _ = fs::remove_file(&path);
}
