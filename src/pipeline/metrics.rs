// std
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
// self
use crate::obs::{self, RenewalResult};

/// Renewal counters shared by every call routed through one pipeline.
///
/// `attempts` counts token-refresh round trips only. A call that finds its access credential
/// already replaced by an overlapping renewal counts as a reuse instead. Every record is mirrored
/// to the global [`obs::RENEWAL_COUNTER`].
#[derive(Debug, Default)]
pub struct RenewalMetrics {
	round_trips: AtomicU64,
	renewed: AtomicU64,
	exhausted: AtomicU64,
	reused: AtomicU64,
}
impl RenewalMetrics {
	/// Token-refresh round trips issued.
	pub fn attempts(&self) -> u64 {
		self.round_trips.load(Relaxed)
	}

	/// Renewals that produced an access credential to replay with.
	pub fn successes(&self) -> u64 {
		self.renewed.load(Relaxed)
	}

	/// Renewals that ended the session.
	pub fn failures(&self) -> u64 {
		self.exhausted.load(Relaxed)
	}

	/// Replays that reused a credential renewed by an overlapping call.
	pub fn reuses(&self) -> u64 {
		self.reused.load(Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.round_trips.fetch_add(1, Relaxed);
		obs::record_renewal(RenewalResult::Attempted);
	}

	pub(crate) fn record_success(&self) {
		self.renewed.fetch_add(1, Relaxed);
		obs::record_renewal(RenewalResult::Renewed);
	}

	pub(crate) fn record_failure(&self) {
		self.exhausted.fetch_add(1, Relaxed);
		obs::record_renewal(RenewalResult::Exhausted);
	}

	pub(crate) fn record_reuse(&self) {
		self.reused.fetch_add(1, Relaxed);
		obs::record_renewal(RenewalResult::Reused);
	}
}
