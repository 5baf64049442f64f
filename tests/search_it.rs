mod common;

// std
use std::time::Duration as StdDuration;
// crates.io
use httpmock::prelude::*;
// self
use common::*;
use encore_broker::{Error, auth::TokenSecret, error::UnavailableError};

#[tokio::test]
async fn search_passes_query_through_and_clamps_limit() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/search")
				.query_param("q", "daft punk \"one more time\"")
				.query_param("limit", "100");
			then.status(200).header("content-type", "application/json").body(
				r#"{"data":[
					{"id":3135556,"title":"One More Time","duration":320,"artist":{"id":27,"name":"Daft Punk"},"album":{"id":302127,"title":"Discovery"}},
					{"id":"67238732","title":"One More Time (Radio Edit)"}
				],"total":2}"#,
			);
		})
		.await;
	let (broker, _store) = build_broker(&config_for(&server));
	let tracks = broker
		.deezer()
		.search("daft punk \"one more time\"", 5_000)
		.await
		.expect("Search should succeed.");

	assert_eq!(tracks.len(), 2);
	assert_eq!(tracks[0].id, "3135556");
	assert_eq!(tracks[0].artist.as_ref().map(|artist| artist.name.as_str()), Some("Daft Punk"));
	assert_eq!(tracks[1].id, "67238732");
	assert!(tracks[1].album.is_none());

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn zero_limit_is_raised_to_one_and_empty_pages_are_valid() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/search").query_param("limit", "1");
			then.status(200).header("content-type", "application/json").body(r#"{"data":[]}"#);
		})
		.await;
	let (broker, _store) = build_broker(&config_for(&server));

	assert!(broker.deezer().search("nothing", 0).await.expect("Search should succeed.").is_empty());

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn app_token_is_appended_when_configured() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/search").query_param("access_token", "app-token");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let mut config = config_for(&server);

	config.deezer.access_token = Some(TokenSecret::new("app-token"));

	let (broker, _store) = build_broker(&config);

	broker.deezer().search("q", 10).await.expect("Search should succeed.");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn upstream_failures_are_unavailable() {
	let server = MockServer::start_async().await;
	let _error_body = server
		.mock_async(|when, then| {
			when.method(GET).path("/search").query_param("q", "quota");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"error":{"type":"Exception","message":"Quota limit exceeded","code":4}}"#);
		})
		.await;
	let _outage = server
		.mock_async(|when, then| {
			when.method(GET).path("/search").query_param("q", "outage");
			then.status(502).body("bad gateway");
		})
		.await;
	let _garbage = server
		.mock_async(|when, then| {
			when.method(GET).path("/search").query_param("q", "garbage");
			then.status(200).header("content-type", "application/json").body(r#"{"items":1}"#);
		})
		.await;
	let (broker, _store) = build_broker(&config_for(&server));
	let quota = broker.deezer().search("quota", 10).await.expect_err("Error body should fail.");

	assert!(quota.to_string().contains("Quota limit exceeded"));
	assert!(quota.is_retryable());
	assert!(matches!(
		broker.deezer().search("outage", 10).await,
		Err(Error::Unavailable(UnavailableError::Endpoint { status: Some(502), .. }))
	));
	assert!(matches!(
		broker.deezer().search("garbage", 10).await,
		Err(Error::Unavailable(UnavailableError::ResponseParse { .. }))
	));
}

#[tokio::test]
async fn null_fields_and_unusable_items_do_not_fail_the_page() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/search").query_param("q", "sparse");
			then.status(200).header("content-type", "application/json").body(
				r#"{"data":[
					{"id":1,"title":"ok"},
					{"id":2,"title":null,"artist":{"name":null}},
					{"title":"no id"}
				]}"#,
			);
		})
		.await;
	let (broker, _store) = build_broker(&config_for(&server));
	let tracks = broker.deezer().search("sparse", 10).await.expect("Sparse page should succeed.");

	assert_eq!(tracks.len(), 2);
	assert_eq!(tracks[0].title, "ok");
	assert_eq!(tracks[1].id, "2");
	assert_eq!(tracks[1].title, "");
	assert_eq!(tracks[1].artist.as_ref().map(|artist| artist.name.as_str()), Some(""));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn slow_search_endpoint_times_out_as_unavailable() {
	let server = MockServer::start_async().await;
	let _slow = server
		.mock_async(|when, then| {
			when.method(GET).path("/search");
			then.status(200)
				.header("content-type", "application/json")
				.delay(StdDuration::from_millis(1_500))
				.body(r#"{"data":[]}"#);
		})
		.await;
	let (broker, _store) = build_broker_with(
		&config_for(&server),
		test_http_client_with_timeout(StdDuration::from_millis(200)),
	);
	let err = broker.deezer().search("late", 10).await.expect_err("Slow search should time out.");

	assert!(err.is_retryable());
	assert!(matches!(err, Error::Unavailable(UnavailableError::Timeout { endpoint: "search" })));
}
