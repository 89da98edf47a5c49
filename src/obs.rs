//! Optional observability helpers for session operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `token_session.op` with the `op` (operation)
//!   and `stage` (call site) fields, plus warning events for renewal exhaustion and discarded
//!   completions.
//! - Enable `metrics` to increment the `token_session_operation_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`, and `token_session_renewal_total` for
//!   every renewal decision, labeled by `result`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
	/// Startup identity resolution.
	Bootstrap,
	/// Username/password sign-in.
	SignIn,
	/// Account registration followed by sign-in.
	SignUp,
	/// Local + remote sign-out.
	SignOut,
	/// Identity re-fetch.
	RefreshIdentity,
	/// Any call routed through the request pipeline.
	Request,
	/// One-shot access credential renewal.
	Renewal,
}
impl OperationKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::Bootstrap => "bootstrap",
			OperationKind::SignIn => "sign_in",
			OperationKind::SignUp => "sign_up",
			OperationKind::SignOut => "sign_out",
			OperationKind::RefreshIdentity => "refresh_identity",
			OperationKind::Request => "request",
			OperationKind::Renewal => "renewal",
		}
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller or surfaced on the session state.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
