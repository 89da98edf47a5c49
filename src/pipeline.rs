//! Request pipeline: credential attachment and one-shot transparent renewal.
//!
//! Every API call goes through [`RequestPipeline::execute`]. The pipeline reads the access
//! credential from the [`CredentialStore`], attaches it, and, when the server answers `401`,
//! runs the renewal protocol once before replaying the call:
//!
//! 1. Acquire the renewal guard, so overlapping failures share one renewal.
//! 2. If the stored access credential already differs from the one the call carried, a concurrent
//!    renewal (or sign-in) replaced it; replay with the stored one without contacting the server.
//! 3. Otherwise exchange the refresh credential at the token-refresh endpoint, persist the new
//!    access credential via compare-and-swap, and replay.
//! 4. Any failure in steps 2 or 3 exhausts the session: the store is cleared, registered
//!    [`ExhaustionObserver`]s are notified, and the call's original `401` propagates.
//!
//! A replayed call is never renewed again, whatever its outcome.

mod metrics;

pub use metrics::RenewalMetrics;

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, RenewedAccess, TokenSecret},
	endpoints::{ApiEndpoints, Endpoint},
	error::TransportError,
	http::{ApiRequest, ApiResponse, ApiTransport},
	obs::{self, OperationKind, OperationSpan, Outcome},
	store::{CompareAndSwapOutcome, CredentialStore},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Pipeline specialized for the crate's default reqwest transport.
pub type ReqwestPipeline = RequestPipeline<ReqwestTransport>;

/// Receives a notification whenever renewal is exhausted and the store has been cleared.
///
/// The session state machine registers itself to flip to the unauthenticated phase; applications
/// register an additional observer to navigate to their sign-in entry point.
pub trait ExhaustionObserver
where
	Self: Send + Sync,
{
	/// Called after the credential store was cleared because renewal failed.
	fn renewal_exhausted(&self);
}
impl<F> ExhaustionObserver for F
where
	F: Fn() + Send + Sync,
{
	fn renewal_exhausted(&self) {
		self()
	}
}

/// Why a renewal could not produce a usable access credential.
#[derive(Debug)]
enum Exhaustion {
	MissingRefresh,
	Storage(Error),
	Network(Error),
	Rejected { status: u16 },
	MalformedBody(Error),
}
impl Display for Exhaustion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::MissingRefresh => f.write_str("no refresh credential is stored"),
			Self::Storage(e) => write!(f, "credential store failed: {e}"),
			Self::Network(e) => write!(f, "token-refresh call failed: {e}"),
			Self::Rejected { status } => write!(f, "token-refresh call returned HTTP {status}"),
			Self::MalformedBody(e) => write!(f, "token-refresh body is unusable: {e}"),
		}
	}
}

/// Outcome of the one-shot renewal for a single call.
enum Renewal {
	/// A fresh access credential to replay the call with.
	Renewed(TokenSecret),
	/// The session is gone; the original failure must propagate.
	Exhausted,
}

/// Serializes outbound API calls through one credential attach/renew policy.
pub struct RequestPipeline<C>
where
	C: ?Sized + ApiTransport,
{
	/// Transport used for every outbound call.
	pub transport: Arc<C>,
	/// Credential store read on every call and written by renewals.
	pub store: Arc<dyn CredentialStore>,
	/// Endpoint configuration.
	pub endpoints: ApiEndpoints,
	/// Shared counters for renewal outcomes.
	pub renewal_metrics: Arc<RenewalMetrics>,
	observers: RwLock<Vec<Arc<dyn ExhaustionObserver>>>,
	renewal_guard: AsyncMutex<()>,
}
impl<C> RequestPipeline<C>
where
	C: ?Sized + ApiTransport,
{
	/// Creates a pipeline over the caller-provided transport.
	pub fn with_transport(
		store: Arc<dyn CredentialStore>,
		endpoints: ApiEndpoints,
		transport: impl Into<Arc<C>>,
	) -> Self {
		Self {
			transport: transport.into(),
			store,
			endpoints,
			renewal_metrics: Default::default(),
			observers: Default::default(),
			renewal_guard: AsyncMutex::new(()),
		}
	}

	/// Registers an observer notified on renewal exhaustion.
	pub fn add_exhaustion_observer(&self, observer: Arc<dyn ExhaustionObserver>) {
		self.observers.write().push(observer);
	}

	/// Sends `request` with the stored access credential, renewing once on `401`.
	///
	/// Non-success responses are classified into [`Error`]; a `401` that survives renewal
	/// surfaces as [`Error::AuthorizationDenied`].
	pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: OperationKind = OperationKind::Request;

		let span = OperationSpan::new(KIND, request.endpoint.as_str());

		obs::record_outcome(KIND, Outcome::Attempt);

		let result = span
			.instrument(async {
				self.with_renewal(|bearer| self.attempt(&request, bearer))
					.await?
					.error_for_status()
			})
			.await;

		match &result {
			Ok(_) => obs::record_outcome(KIND, Outcome::Success),
			Err(_) => obs::record_outcome(KIND, Outcome::Failure),
		}

		result
	}

	/// Sends `request` and decodes the successful JSON body.
	pub async fn execute_json<T>(&self, request: ApiRequest) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.execute(request).await?.json()
	}

	/// Decorates a single-attempt `call` with the renewal policy.
	///
	/// `call` receives the bearer credential to attach (if any) and performs exactly one round
	/// trip. It runs once with the stored access credential and, after a `401`, at most once more
	/// with a renewed one. Transport failures are never retried. The returned response may still
	/// carry a failure status.
	pub async fn with_renewal<F, Fut>(&self, call: F) -> Result<ApiResponse>
	where
		F: Fn(Option<TokenSecret>) -> Fut,
		Fut: Future<Output = Result<ApiResponse>>,
	{
		let bearer = self.store.get_access()?;
		let response = call(bearer.clone()).await?;

		if !response.is_unauthorized() {
			return Ok(response);
		}

		match self.renew(bearer.as_ref()).await {
			Renewal::Renewed(access) => call(Some(access)).await,
			Renewal::Exhausted => Ok(response),
		}
	}

	async fn attempt(&self, request: &ApiRequest, bearer: Option<TokenSecret>) -> Result<ApiResponse> {
		self.transport
			.send(request, bearer.as_ref())
			.await
			.map_err(|e| TransportError::network(e).into())
	}

	async fn renew(&self, sent: Option<&TokenSecret>) -> Renewal {
		const KIND: OperationKind = OperationKind::Renewal;

		let span = OperationSpan::new(KIND, "renew");

		span.instrument(async {
			let _singleflight = self.renewal_guard.lock().await;
			let pair = match self.store.load() {
				Ok(Some(pair)) => pair,
				// A sibling call's exhaustion already ended the session this call belonged to.
				Ok(None) if sent.is_some() => {
					obs::debug_event(KIND, "credentials already cleared; not renewing");

					return Renewal::Exhausted;
				},
				Ok(None) => return self.exhaust(None, Exhaustion::MissingRefresh),
				Err(e) => return self.exhaust(None, Exhaustion::Storage(e.into())),
			};

			if sent != Some(&pair.access) {
				obs::debug_event(KIND, "access credential already replaced; replaying");
				self.renewal_metrics.record_reuse();

				return Renewal::Renewed(pair.access);
			}

			self.renewal_metrics.record_attempt();

			match self.exchange(&pair).await {
				Ok(access) => self.persist(pair, access),
				Err(reason) => self.exhaust(Some(&pair.refresh), reason),
			}
		})
		.await
	}

	async fn exchange(&self, pair: &CredentialPair) -> Result<TokenSecret, Exhaustion> {
		let request = ApiRequest::post(&self.endpoints, Endpoint::TokenRefresh)
			.with_json(&serde_json::json!({ "refresh": pair.refresh.expose() }))
			.map_err(Exhaustion::MalformedBody)?;
		// The renewal call itself carries no bearer and is never renewed.
		let response = self.attempt(&request, None).await.map_err(Exhaustion::Network)?;

		if !response.is_success() {
			return Err(Exhaustion::Rejected { status: response.status });
		}

		let renewed: RenewedAccess = response.json().map_err(Exhaustion::MalformedBody)?;

		Ok(renewed.access)
	}

	fn persist(&self, pair: CredentialPair, access: TokenSecret) -> Renewal {
		match self.store.compare_and_swap_access(&pair.refresh, access.clone()) {
			Ok(CompareAndSwapOutcome::Updated) => {
				self.renewal_metrics.record_success();

				Renewal::Renewed(access)
			},
			// A newer session replaced the pair mid-renewal; replay with its credential.
			Ok(CompareAndSwapOutcome::RefreshMismatch) => match self.store.get_access() {
				Ok(Some(current)) => {
					self.renewal_metrics.record_success();

					Renewal::Renewed(current)
				},
				Ok(None) => self.exhaust(None, Exhaustion::MissingRefresh),
				Err(e) => self.exhaust(None, Exhaustion::Storage(e.into())),
			},
			Ok(CompareAndSwapOutcome::Missing) =>
				self.exhaust(Some(&pair.refresh), Exhaustion::MissingRefresh),
			Err(e) => self.exhaust(Some(&pair.refresh), Exhaustion::Storage(e.into())),
		}
	}

	fn exhaust(&self, refresh: Option<&TokenSecret>, reason: Exhaustion) -> Renewal {
		const KIND: OperationKind = OperationKind::Renewal;

		self.renewal_metrics.record_failure();
		obs::warn_event(KIND, "renewal exhausted; clearing credentials", &reason);

		match self.store.compare_and_clear(refresh) {
			Ok(CompareAndSwapOutcome::RefreshMismatch) => {
				obs::debug_event(KIND, "a newer session owns the store; leaving it intact");
			},
			Ok(_) => self.notify_exhausted(),
			Err(e) => {
				obs::warn_event(KIND, "failed to clear credentials", &e);
				self.notify_exhausted();
			},
		}

		Renewal::Exhausted
	}

	fn notify_exhausted(&self) {
		let observers = self.observers.read().clone();

		for observer in observers {
			observer.renewal_exhausted();
		}
	}
}
#[cfg(feature = "reqwest")]
impl RequestPipeline<ReqwestTransport> {
	/// Creates a pipeline backed by a default reqwest transport.
	pub fn new(store: Arc<dyn CredentialStore>, endpoints: ApiEndpoints) -> Self {
		Self::with_transport(store, endpoints, ReqwestTransport::default())
	}
}
impl<C> Debug for RequestPipeline<C>
where
	C: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestPipeline")
			.field("endpoints", &self.endpoints)
			.field("renewal_metrics", &self.renewal_metrics)
			.field("observers", &self.observers.read().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// self
	use super::*;
	use crate::{http::TransportFuture, store::MemoryStore};

	#[derive(Debug, ThisError)]
	#[error("connection reset")]
	struct Reset;

	#[derive(Default)]
	struct ScriptedTransport {
		responses: Mutex<VecDeque<Result<ApiResponse, Reset>>>,
		seen: Mutex<Vec<(Endpoint, Option<String>)>>,
	}
	impl ScriptedTransport {
		fn new(responses: impl IntoIterator<Item = Result<ApiResponse, Reset>>) -> Self {
			Self { responses: Mutex::new(responses.into_iter().collect()), ..Default::default() }
		}
	}
	impl ApiTransport for ScriptedTransport {
		type TransportError = Reset;

		fn send<'a>(
			&'a self,
			request: &'a ApiRequest,
			bearer: Option<&'a TokenSecret>,
		) -> TransportFuture<'a, Self::TransportError> {
			self.seen.lock().push((request.endpoint, bearer.map(|b| b.expose().to_owned())));

			let next = self
				.responses
				.lock()
				.pop_front()
				.unwrap_or_else(|| panic!("Unexpected call to {}.", request.endpoint));

			Box::pin(async move { next })
		}
	}

	fn unauthorized() -> Result<ApiResponse, Reset> {
		Ok(ApiResponse::json_body(
			401,
			&serde_json::json!({ "detail": "Given token not valid for any token type" }),
		))
	}

	fn pipeline_with(
		store: MemoryStore,
		transport: ScriptedTransport,
	) -> (RequestPipeline<ScriptedTransport>, Arc<ScriptedTransport>, Arc<AtomicUsize>) {
		let endpoints = ApiEndpoints::builder("http://api.test/api/")
			.build()
			.expect("Test endpoints should build.");
		let transport = Arc::new(transport);
		let pipeline = RequestPipeline::with_transport(Arc::new(store), endpoints, transport.clone());
		let exhausted = Arc::new(AtomicUsize::new(0));
		let counter = exhausted.clone();

		pipeline.add_exhaustion_observer(Arc::new(move || {
			counter.fetch_add(1, Ordering::SeqCst);
		}));

		(pipeline, transport, exhausted)
	}

	#[tokio::test]
	async fn network_failure_is_not_renewed() {
		let store = MemoryStore::with_pair(CredentialPair::new("A1", "R1"));
		let (pipeline, transport, exhausted) =
			pipeline_with(store.clone(), ScriptedTransport::new([Err(Reset)]));
		let err = pipeline
			.execute(ApiRequest::get(&pipeline.endpoints, Endpoint::Profile))
			.await
			.expect_err("A reset connection should surface as an error.");

		assert!(err.is_network());
		assert_eq!(transport.seen.lock().len(), 1);
		assert_eq!(store.key_count(), 2);
		assert_eq!(exhausted.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn renewal_network_failure_exhausts_session() {
		let store = MemoryStore::with_pair(CredentialPair::new("A1", "R1"));
		let (pipeline, transport, exhausted) =
			pipeline_with(store.clone(), ScriptedTransport::new([unauthorized(), Err(Reset)]));
		let err = pipeline
			.execute(ApiRequest::get(&pipeline.endpoints, Endpoint::ActivityChart))
			.await
			.expect_err("Exhausted renewal should propagate the original failure.");

		assert!(matches!(err, Error::AuthorizationDenied { detail: Some(_) }));
		assert_eq!(
			transport.seen.lock().clone(),
			vec![(Endpoint::ActivityChart, Some("A1".into())), (Endpoint::TokenRefresh, None)]
		);
		assert_eq!(store.key_count(), 0);
		assert_eq!(exhausted.load(Ordering::SeqCst), 1);
		assert_eq!(pipeline.renewal_metrics.attempts(), 1);
		assert_eq!(pipeline.renewal_metrics.failures(), 1);
	}

	#[tokio::test]
	async fn replayed_unauthorized_is_not_renewed_again() {
		let store = MemoryStore::with_pair(CredentialPair::new("A1", "R1"));
		let (pipeline, transport, exhausted) = pipeline_with(
			store.clone(),
			ScriptedTransport::new([
				unauthorized(),
				Ok(ApiResponse::json_body(200, &serde_json::json!({ "access": "A2" }))),
				unauthorized(),
			]),
		);
		let err = pipeline
			.execute(ApiRequest::get(&pipeline.endpoints, Endpoint::Profile))
			.await
			.expect_err("A second 401 should surface.");

		assert!(matches!(err, Error::AuthorizationDenied { .. }));
		assert_eq!(transport.seen.lock().len(), 3);
		assert_eq!(store.get_access().expect("Store read should succeed."), Some(TokenSecret::new("A2")));
		assert_eq!(exhausted.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn replaced_access_is_reused_without_renewal() {
		let store = MemoryStore::with_pair(CredentialPair::new("A1", "R1"));
		let (pipeline, transport, _) = pipeline_with(
			store.clone(),
			ScriptedTransport::new([
				unauthorized(),
				Ok(ApiResponse::json_body(200, &serde_json::json!({ "ok": true }))),
			]),
		);
		let request = ApiRequest::get(&pipeline.endpoints, Endpoint::Profile);
		// Simulates an overlapping call that renewed while this one was in flight.
		let response = pipeline
			.with_renewal(|bearer| {
				if bearer.as_ref().map(TokenSecret::expose) == Some("A1") {
					store.set(CredentialPair::new("A2", "R1")).expect("Store write should succeed.");
				}

				pipeline.attempt(&request, bearer)
			})
			.await
			.expect("Replay should succeed.");

		assert!(response.is_success());
		assert_eq!(
			transport.seen.lock().clone(),
			vec![(Endpoint::Profile, Some("A1".into())), (Endpoint::Profile, Some("A2".into()))]
		);
		assert_eq!(pipeline.renewal_metrics.attempts(), 0);
		assert_eq!(pipeline.renewal_metrics.reuses(), 1);
	}

	#[tokio::test]
	async fn cleared_session_is_exhausted_only_once() {
		let store = MemoryStore::with_pair(CredentialPair::new("A1", "R1"));
		let (pipeline, transport, exhausted) =
			pipeline_with(store.clone(), ScriptedTransport::new([unauthorized()]));
		let request = ApiRequest::get(&pipeline.endpoints, Endpoint::Profile);
		// Simulates an overlapping call whose rejected renewal cleared the store first.
		let response = pipeline
			.with_renewal(|bearer| {
				store.clear().expect("Store clear should succeed.");

				pipeline.attempt(&request, bearer)
			})
			.await
			.expect("The original response should be returned.");

		assert!(response.is_unauthorized());
		assert_eq!(transport.seen.lock().clone(), vec![(Endpoint::Profile, Some("A1".into()))]);
		assert_eq!(exhausted.load(Ordering::SeqCst), 0);
		assert_eq!(pipeline.renewal_metrics.attempts(), 0);
		assert_eq!(pipeline.renewal_metrics.failures(), 0);
	}
}
