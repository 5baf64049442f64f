mod common;

// std
use std::{collections::HashMap, sync::Mutex};
// crates.io
use httpmock::MockServer;
// self
use common::*;
use encore_broker::{
	Error,
	auth::SubscriberId,
	push::{PushDelivery, PushFuture, PushMessage, PushRegistry, PushSubscription, PushTransport},
};

/// Transport fake keyed by endpoint path.
#[derive(Default)]
struct RecordingTransport {
	outcomes: HashMap<String, PushDelivery>,
	sent: Mutex<Vec<(String, String)>>,
}
impl PushTransport for RecordingTransport {
	fn send<'a>(&'a self, message: PushMessage<'a>) -> PushFuture<'a, Result<PushDelivery, Error>> {
		Box::pin(async move {
			let path = message.subscription.endpoint().path().to_owned();

			self.sent
				.lock()
				.expect("Recording lock should not be poisoned.")
				.push((path.clone(), message.authorization.to_owned()));

			self.outcomes
				.get(&path)
				.copied()
				.ok_or_else(|| Error::UpstreamAuth { reason: "unknown endpoint".into(), status: Some(403) })
		})
	}
}

fn subscriber(id: &str) -> SubscriberId {
	SubscriberId::new(id).expect("Subscriber fixture should be valid.")
}

fn subscription(path: &str) -> PushSubscription {
	PushSubscription::new(&format!("https://push.example.com{path}"), "client-p256dh", "client-auth")
		.expect("Subscription fixture should be valid.")
}

#[test]
fn registry_upsert_unsubscribe_and_clear() {
	let registry = PushRegistry::new();

	registry.subscribe(subscriber("a"), subscription("/a1"));
	registry.subscribe(subscriber("a"), subscription("/a2"));
	registry.subscribe(subscriber("b"), subscription("/b"));

	assert_eq!(registry.get("a"), Some(subscription("/a2")));
	assert_eq!(registry.len(), 2);

	registry.unsubscribe("b");

	assert!(registry.list_all().iter().all(|(id, _)| id.to_string() != "b"));
}

#[tokio::test]
async fn fan_out_signs_each_push_and_prunes_gone_subscribers() {
	let server = MockServer::start_async().await;
	let (broker, _store) = build_broker(&config_for(&server));
	let registry = broker.push_registry();

	registry.subscribe(subscriber("live"), subscription("/live"));
	registry.subscribe(subscriber("gone"), subscription("/gone"));
	registry.subscribe(subscriber("broken"), subscription("/broken"));

	let transport = RecordingTransport {
		outcomes: HashMap::from([
			("/live".to_owned(), PushDelivery::Delivered),
			("/gone".to_owned(), PushDelivery::Gone),
		]),
		..RecordingTransport::default()
	};
	let report = broker.notify_all(&transport, b"{\"title\":\"Now playing\"}").await.expect("Fan-out should run.");

	assert_eq!(report.delivered, 1);
	assert_eq!(report.pruned, vec![subscriber("gone")]);
	assert_eq!(report.failed.len(), 1);
	assert_eq!(report.failed[0].0, subscriber("broken"));
	assert!(registry.get("gone").is_none());
	assert!(registry.get("broken").is_some());

	let public_key = broker.vapid().expect("VAPID keys should be available.").public_key().to_owned();
	let sent = transport.sent.lock().expect("Recording lock should not be poisoned.");

	assert_eq!(sent.len(), 3);
	assert!(
		sent.iter()
			.all(|(_, header)| header.starts_with("vapid t=") && header.ends_with(&format!("k={public_key}")))
	);
}

#[tokio::test]
async fn clear_all_is_operator_gated() {
	let server = MockServer::start_async().await;
	let (broker, _store) = build_broker(&config_for(&server));

	broker.push_registry().subscribe(subscriber("a"), subscription("/a"));

	assert!(matches!(broker.authorize_operator("guess"), Err(Error::AccessDenied)));

	let grant = broker.authorize_operator(OPERATOR_TOKEN).expect("Operator token should be accepted.");

	assert_eq!(broker.clear_push_subscriptions(&grant), 1);
	assert!(broker.push_registry().is_empty());
}
