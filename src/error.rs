//! Session-level error types shared by the store, pipeline, and state machine.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Authorization expiry and refresh exhaustion are handled inside the request pipeline and never
/// appear here: a recovered expiry is invisible, and an exhausted renewal surfaces as the
/// original call's [`Error::AuthorizationDenied`].
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Unexpected upstream response (5xx, malformed body).
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure; no response was received.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The server refused the credentials attached to the call and renewal could not help.
	#[error("Request was not authorized{}.", fmt_detail(.detail))]
	AuthorizationDenied {
		/// Server-supplied `detail` message, when present.
		detail: Option<String>,
	},
	/// The server rejected the request payload (4xx other than 401).
	#[error("Request was rejected with HTTP {status}{}.", fmt_detail(.detail))]
	ValidationRejected {
		/// HTTP status code.
		status: u16,
		/// Server-supplied `detail` message, when present.
		detail: Option<String>,
	},
}
impl Error {
	/// Returns the server-supplied `detail` message, if the failure carried one.
	pub fn detail(&self) -> Option<&str> {
		match self {
			Self::AuthorizationDenied { detail } | Self::ValidationRejected { detail, .. } =>
				detail.as_deref(),
			Self::Transient(TransientError::Upstream { detail, .. }) => detail.as_deref(),
			_ => None,
		}
	}

	/// Returns the HTTP status associated with the failure, when one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::AuthorizationDenied { .. } => Some(401),
			Self::ValidationRejected { status, .. } => Some(*status),
			Self::Transient(TransientError::Upstream { status, .. }) => Some(*status),
			Self::Transient(TransientError::ResponseParse { status, .. }) => Some(*status),
			_ => None,
		}
	}

	/// Returns `true` for transport-level failures where no response arrived.
	pub fn is_network(&self) -> bool {
		matches!(self, Self::Transport(_))
	}
}

fn fmt_detail(detail: &Option<String>) -> String {
	detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

/// Configuration and construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Endpoint configuration is invalid.
	#[error(transparent)]
	Endpoints(#[from] crate::endpoints::EndpointsError),
	/// Request body could not be encoded as JSON.
	#[error("Request body could not be encoded as JSON.")]
	RequestEncode(#[source] serde_json::Error),
}

/// Unexpected upstream responses.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Server answered with a status outside the success and client-error ranges.
	#[error("Server returned HTTP {status}{}.", fmt_detail(.detail))]
	Upstream {
		/// HTTP status code.
		status: u16,
		/// Server-supplied `detail` message, when present.
		detail: Option<String>,
	},
	/// Server responded with JSON that does not match the expected shape.
	#[error("Server returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure, including the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
}

/// Transport-level failures; no response was received.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn detail_is_exposed_for_server_failures() {
		let denied = Error::AuthorizationDenied { detail: Some("Token is invalid".into()) };

		assert_eq!(denied.detail(), Some("Token is invalid"));
		assert_eq!(denied.status(), Some(401));
		assert_eq!(denied.to_string(), "Request was not authorized: Token is invalid.");

		let rejected = Error::ValidationRejected { status: 400, detail: None };

		assert_eq!(rejected.detail(), None);
		assert_eq!(rejected.to_string(), "Request was rejected with HTTP 400.");
	}

	#[test]
	fn network_failures_carry_no_status() {
		let err: Error =
			TransportError::network(std::io::Error::other("connection reset")).into();

		assert!(err.is_network());
		assert_eq!(err.status(), None);
		assert_eq!(err.detail(), None);
	}

	#[test]
	fn store_error_converts_with_source() {
		let store_error =
			crate::store::StoreError::Backend { message: "storage unavailable".into() };
		let err: Error = store_error.clone().into();

		assert!(matches!(err, Error::Storage(_)));

		let source = StdError::source(&err).expect("Storage error should expose its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}
