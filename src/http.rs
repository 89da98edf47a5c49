//! Transport primitives for API calls.
//!
//! The module exposes [`ApiTransport`], the session's only dependency on an HTTP stack, together
//! with the plain request/response values that flow through it. The transport is deliberately
//! dumb: it attaches whatever bearer credential the pipeline hands it and reports the raw status
//! and body. Credential policy lives in [`crate::pipeline`].

// std
use std::ops::Deref;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	endpoints::{ApiEndpoints, Endpoint},
	error::{ConfigError, TransientError},
};

/// Boxed future returned by [`ApiTransport::send`].
pub type TransportFuture<'a, E> = Pin<Box<dyn Future<Output = Result<ApiResponse, E>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing API calls.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by the pipeline
/// and every consumer holding a session handle. A transport error means no response was
/// received; any HTTP status, including 4xx/5xx, must be returned as an [`ApiResponse`].
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Sends `request`, attaching `bearer` as an `Authorization: Bearer` header when present.
	fn send<'a>(
		&'a self,
		request: &'a ApiRequest,
		bearer: Option<&'a TokenSecret>,
	) -> TransportFuture<'a, Self::TransportError>;
}

/// HTTP methods used by the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApiMethod {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PATCH`
	Patch,
}
impl ApiMethod {
	/// Returns the method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			ApiMethod::Get => "GET",
			ApiMethod::Post => "POST",
			ApiMethod::Patch => "PATCH",
		}
	}
}
impl Display for ApiMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// An outbound API call, minus credentials.
///
/// Requests are immutable values; a replay after renewal re-sends the same value with a new
/// bearer credential.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
	/// Logical endpoint, used for logs and metrics.
	pub endpoint: Endpoint,
	/// HTTP method.
	pub method: ApiMethod,
	/// Absolute URL.
	pub url: Url,
	/// Optional JSON body.
	pub body: Option<serde_json::Value>,
}
impl ApiRequest {
	/// Builds a body-less request.
	pub fn new(endpoints: &ApiEndpoints, endpoint: Endpoint, method: ApiMethod) -> Self {
		Self { endpoint, method, url: endpoints.url(endpoint).clone(), body: None }
	}

	/// Builds a `GET` request.
	pub fn get(endpoints: &ApiEndpoints, endpoint: Endpoint) -> Self {
		Self::new(endpoints, endpoint, ApiMethod::Get)
	}

	/// Builds a `POST` request without a body.
	pub fn post(endpoints: &ApiEndpoints, endpoint: Endpoint) -> Self {
		Self::new(endpoints, endpoint, ApiMethod::Post)
	}

	/// Attaches a JSON body.
	pub fn with_json<T>(mut self, body: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_value(body).map_err(ConfigError::RequestEncode)?);

		Ok(self)
	}
}

/// Status and body of a received response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Builds a response from a status and body.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, body: body.into() }
	}

	/// Builds a response with a JSON body.
	pub fn json_body(status: u16, body: &serde_json::Value) -> Self {
		Self::new(status, body.to_string())
	}

	/// `2xx`.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// `401 Unauthorized`.
	pub fn is_unauthorized(&self) -> bool {
		self.status == 401
	}

	/// Decodes the body, reporting the failing JSON path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| TransientError::ResponseParse { source, status: self.status }.into())
	}

	/// Extracts the `detail` message from an error body.
	pub fn detail(&self) -> Option<String> {
		#[derive(Deserialize)]
		struct ErrorBody {
			detail: Option<String>,
		}

		serde_json::from_slice::<ErrorBody>(&self.body)
			.ok()
			.and_then(|body| body.detail)
			.filter(|detail| !detail.trim().is_empty())
	}

	/// Passes successful responses through and classifies everything else.
	pub fn error_for_status(self) -> Result<Self> {
		if self.is_success() { Ok(self) } else { Err(self.into_error()) }
	}

	/// Classifies a non-success response into the crate error taxonomy.
	pub fn into_error(self) -> Error {
		let detail = self.detail();

		match self.status {
			401 => Error::AuthorizationDenied { detail },
			400..=499 => Error::ValidationRejected { status: self.status, detail },
			status => TransientError::Upstream { status, detail }.into(),
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	fn method(method: ApiMethod) -> reqwest::Method {
		match method {
			ApiMethod::Get => reqwest::Method::GET,
			ApiMethod::Post => reqwest::Method::POST,
			ApiMethod::Patch => reqwest::Method::PATCH,
		}
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	type TransportError = ReqwestError;

	fn send<'a>(
		&'a self,
		request: &'a ApiRequest,
		bearer: Option<&'a TokenSecret>,
	) -> TransportFuture<'a, Self::TransportError> {
		Box::pin(async move {
			let mut builder = self
				.0
				.request(Self::method(request.method), request.url.clone())
				.header(reqwest::header::ACCEPT, "application/json");

			if let Some(token) = bearer {
				builder = builder.header(reqwest::header::AUTHORIZATION, token.bearer());
			}
			if let Some(body) = &request.body {
				builder = builder.json(body);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let body = response.bytes().await?.to_vec();

			Ok(ApiResponse { status, body })
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn classifies_failure_statuses() {
		let denied = ApiResponse::json_body(401, &serde_json::json!({ "detail": "expired" }))
			.into_error();

		assert!(matches!(denied, Error::AuthorizationDenied { detail: Some(ref d) } if d == "expired"));

		let rejected =
			ApiResponse::json_body(400, &serde_json::json!({ "username": ["taken"] })).into_error();

		assert!(matches!(rejected, Error::ValidationRejected { status: 400, detail: None }));

		let upstream = ApiResponse::new(502, "<html>bad gateway</html>").into_error();

		assert!(matches!(
			upstream,
			Error::Transient(TransientError::Upstream { status: 502, detail: None })
		));
	}

	#[test]
	fn json_reports_failing_path() {
		#[derive(Debug, Deserialize)]
		struct Body {
			#[allow(dead_code)]
			access: String,
		}

		let err = ApiResponse::json_body(200, &serde_json::json!({ "access": 42 }))
			.json::<Body>()
			.expect_err("A numeric token must not decode as a string.");

		match err {
			Error::Transient(TransientError::ResponseParse { source, status }) => {
				assert_eq!(status, 200);
				assert_eq!(source.path().to_string(), "access");
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn blank_detail_is_ignored() {
		let response = ApiResponse::json_body(400, &serde_json::json!({ "detail": "  " }));

		assert_eq!(response.detail(), None);
		assert!(response.clone().error_for_status().is_err());
		assert!(ApiResponse::new(204, "").error_for_status().is_ok());
	}
}
