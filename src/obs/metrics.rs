// self
use crate::obs::{OperationKind, Outcome};

/// Counter incremented once per lifecycle operation or pipeline call outcome.
pub const OPERATION_COUNTER: &str = "token_session_operation_total";
/// Counter incremented once per renewal decision.
pub const RENEWAL_COUNTER: &str = "token_session_renewal_total";

/// How a single renewal decision ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenewalResult {
	/// A token-refresh round trip was issued.
	Attempted,
	/// A fresh access credential was obtained.
	Renewed,
	/// An overlapping renewal already replaced the credential.
	Reused,
	/// The session was ended.
	Exhausted,
}
impl RenewalResult {
	/// Returns a stable label suitable for metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RenewalResult::Attempted => "attempted",
			RenewalResult::Renewed => "renewed",
			RenewalResult::Reused => "reused",
			RenewalResult::Exhausted => "exhausted",
		}
	}
}

/// Increments [`OPERATION_COUNTER`] labeled by `op` + `outcome` (when `metrics` is enabled).
pub fn record_outcome(kind: OperationKind, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(OPERATION_COUNTER, "op" => kind.as_str(), "outcome" => outcome.as_str())
		.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Increments [`RENEWAL_COUNTER`] labeled by `result` (when `metrics` is enabled).
pub fn record_renewal(result: RenewalResult) {
	#[cfg(feature = "metrics")]
	metrics::counter!(RENEWAL_COUNTER, "result" => result.as_str()).increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = result;
}
