//! In-memory push subscription registry.

// crates.io
use futures::future;
// self
use crate::{
	_prelude::*,
	access::OperatorGrant,
	auth::SubscriberId,
	obs::{self, FlowKind},
	push::{PushDelivery, PushMessage, PushSubscription, PushTransport, VapidKeys},
};

/// Summary of a [`PushRegistry::fan_out`] run.
#[derive(Debug, Default)]
pub struct FanOutReport {
	/// Messages accepted by the push service.
	pub delivered: usize,
	/// Subscribers removed because the push service reported them gone.
	pub pruned: Vec<SubscriberId>,
	/// Subscribers whose delivery failed; they stay registered.
	pub failed: Vec<(SubscriberId, Error)>,
}

/// Process-wide push subscription registry keyed by subscriber.
///
/// Mutations take the write lock; reads and fan-out snapshots share the read lock, so a
/// fan-out never observes a half-applied mutation.
#[derive(Debug, Default)]
pub struct PushRegistry {
	entries: RwLock<HashMap<SubscriberId, PushSubscription>>,
}
impl PushRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or replaces the subscription for `id`, returning the previous one.
	pub fn subscribe(
		&self,
		id: SubscriberId,
		subscription: PushSubscription,
	) -> Option<PushSubscription> {
		self.entries.write().insert(id, subscription)
	}

	/// Removes the subscription for `id`.
	pub fn unsubscribe(&self, id: &str) -> Option<PushSubscription> {
		self.entries.write().remove(id)
	}

	/// Subscription registered for `id`.
	pub fn get(&self, id: &str) -> Option<PushSubscription> {
		self.entries.read().get(id).cloned()
	}

	/// Snapshot of every subscription, ordered by subscriber.
	pub fn list_all(&self) -> Vec<(SubscriberId, PushSubscription)> {
		let mut entries = self
			.entries
			.read()
			.iter()
			.map(|(id, subscription)| (id.clone(), subscription.clone()))
			.collect::<Vec<_>>();

		entries.sort_by(|(a, _), (b, _)| a.cmp(b));

		entries
	}

	/// Number of registered subscriptions.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when nothing is registered.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	/// Drops every subscription; returns how many were removed.
	pub fn clear_all(&self, _grant: &OperatorGrant) -> usize {
		let removed = {
			let mut entries = self.entries.write();
			let removed = entries.len();

			entries.clear();

			removed
		};

		obs::registry_cleared(removed);

		removed
	}

	/// Sends `payload` to every subscriber through `transport`.
	///
	/// Deliveries run concurrently outside the registry lock. Subscribers reported
	/// [`PushDelivery::Gone`] are pruned unless they re-subscribed to a different endpoint
	/// while the fan-out was in flight.
	pub async fn fan_out(
		&self,
		transport: &dyn PushTransport,
		vapid: &VapidKeys,
		payload: &[u8],
	) -> FanOutReport {
		let snapshot = self.list_all();
		let outcomes = future::join_all(snapshot.iter().map(|(_, subscription)| {
			obs::observe(FlowKind::PushFanOut, "send", async move {
				let authorization = vapid.authorization(subscription.endpoint())?;

				transport.send(PushMessage { subscription, authorization: &authorization, payload }).await
			})
		}))
		.await;
		let mut report = FanOutReport::default();

		for ((id, _), outcome) in snapshot.iter().zip(outcomes) {
			match outcome {
				Ok(PushDelivery::Delivered) => report.delivered += 1,
				Ok(PushDelivery::Gone) => report.pruned.push(id.clone()),
				Err(err) => report.failed.push((id.clone(), err)),
			}
		}

		if !report.pruned.is_empty() {
			let mut entries = self.entries.write();

			report.pruned.retain(|id| {
				let Some((_, sent)) = snapshot.iter().find(|(candidate, _)| candidate == id) else {
					return false;
				};

				match entries.get(id) {
					Some(current) if current.endpoint() == sent.endpoint() => {
						entries.remove(id);

						true
					},
					_ => false,
				}
			});
		}

		if !report.pruned.is_empty() {
			obs::subscriptions_pruned(report.pruned.len());
		}

		report
	}
}
