//! Session lifecycle state machine.
//!
//! [`Session`] owns the observable [`SessionState`] and drives it through bootstrap, sign-in,
//! sign-up, sign-out, and identity refresh. Every lifecycle operation takes a ticket from a
//! monotonically increasing sequence when it starts; its completion is applied only while that
//! ticket is still the latest, so an older operation that resolves late never overwrites a newer
//! one. Renewal exhaustion reported by the [`RequestPipeline`] bypasses tickets and clears the
//! identity directly.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	api::{ActivityApi, ProfileApi},
	auth::{CredentialPair, Identity, TokenSecret},
	endpoints::{ApiEndpoints, Endpoint},
	http::{ApiRequest, ApiTransport},
	obs::{self, OperationKind, OperationSpan, Outcome},
	pipeline::{ExhaustionObserver, RequestPipeline},
	store::{CompareAndSwapOutcome, CredentialStore},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

const LOGIN_FAILED: &str = "Login failed";
const REGISTRATION_FAILED: &str = "Registration failed";
const PROFILE_LOAD_FAILED: &str = "Failed to load profile";

#[cfg(feature = "reqwest")]
/// Session specialized for the crate's default reqwest transport.
pub type ReqwestSession = Session<ReqwestTransport>;

/// Coarse lifecycle phase derived from [`SessionState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionPhase {
	/// A lifecycle operation is in flight.
	Resolving,
	/// An identity is loaded.
	Authenticated,
	/// No identity is loaded.
	Unauthenticated,
}

/// Observable session state.
///
/// While resolving, the previously loaded identity (if any) is kept so views can keep rendering
/// it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionState {
	identity: Option<Identity>,
	loading: bool,
	error: Option<String>,
}
impl SessionState {
	fn initial() -> Self {
		Self { identity: None, loading: true, error: None }
	}

	/// Current phase.
	pub fn phase(&self) -> SessionPhase {
		match (self.loading, &self.identity) {
			(true, _) => SessionPhase::Resolving,
			(false, Some(_)) => SessionPhase::Authenticated,
			(false, None) => SessionPhase::Unauthenticated,
		}
	}

	/// Loaded identity, if any.
	pub fn identity(&self) -> Option<&Identity> {
		self.identity.as_ref()
	}

	/// Whether a lifecycle operation is in flight.
	pub fn is_loading(&self) -> bool {
		self.loading
	}

	/// Human-readable message of the last failed lifecycle operation.
	pub fn error(&self) -> Option<&str> {
		self.error.as_deref()
	}

	/// `true` when an identity is loaded and nothing is resolving.
	pub fn is_authenticated(&self) -> bool {
		self.phase() == SessionPhase::Authenticated
	}
}

#[derive(Debug)]
struct SessionCore {
	state: RwLock<SessionState>,
	latest_ticket: AtomicU64,
	revision: AtomicU64,
}
impl SessionCore {
	fn new() -> Self {
		Self {
			state: RwLock::new(SessionState::initial()),
			latest_ticket: AtomicU64::new(0),
			revision: AtomicU64::new(0),
		}
	}

	fn snapshot(&self) -> SessionState {
		self.state.read().clone()
	}

	fn write(&self, apply: impl FnOnce(&mut SessionState)) {
		let mut state = self.state.write();

		apply(&mut state);
		self.revision.fetch_add(1, Ordering::Release);
	}

	/// Enters the resolving phase and returns the operation's ticket.
	fn begin(&self) -> u64 {
		let mut state = self.state.write();
		let ticket = self.latest_ticket.fetch_add(1, Ordering::AcqRel) + 1;

		state.loading = true;
		state.error = None;
		self.revision.fetch_add(1, Ordering::Release);

		ticket
	}

	fn is_latest(&self, ticket: u64) -> bool {
		self.latest_ticket.load(Ordering::Acquire) == ticket
	}

	/// Applies a completion if `ticket` is still the latest, leaving the resolving phase.
	fn complete(
		&self,
		kind: OperationKind,
		ticket: u64,
		apply: impl FnOnce(&mut SessionState),
	) -> bool {
		let mut state = self.state.write();

		if !self.is_latest(ticket) {
			obs::debug_event(kind, "discarding completion superseded by a newer operation");

			return false;
		}

		apply(&mut state);
		state.loading = false;
		self.revision.fetch_add(1, Ordering::Release);

		true
	}
}
impl ExhaustionObserver for SessionCore {
	fn renewal_exhausted(&self) {
		// An in-flight operation still owns the resolving phase and decides the final state.
		self.write(|state| state.identity = None);
	}
}

/// Read-only projection of a session's state for rendering.
#[derive(Clone, Debug)]
pub struct SessionView(Arc<SessionCore>);
impl SessionView {
	/// Current state.
	pub fn snapshot(&self) -> SessionState {
		self.0.snapshot()
	}

	/// Current phase.
	pub fn phase(&self) -> SessionPhase {
		self.0.state.read().phase()
	}

	/// Counter bumped on every state change; compare two readings to detect updates.
	pub fn revision(&self) -> u64 {
		self.0.revision.load(Ordering::Acquire)
	}
}

#[derive(Serialize)]
struct LoginRequest<'a> {
	username: &'a str,
	password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
	username: &'a str,
	email: &'a str,
	password: &'a str,
}

/// Authenticated session handle.
///
/// Clones share state, store, and transport.
pub struct Session<C>
where
	C: ?Sized + ApiTransport,
{
	pipeline: Arc<RequestPipeline<C>>,
	core: Arc<SessionCore>,
}
impl<C> Session<C>
where
	C: ?Sized + ApiTransport,
{
	/// Creates a session over the caller-provided transport.
	///
	/// The session starts in the resolving phase; call [`Session::bootstrap`] once at startup.
	pub fn with_transport(
		store: Arc<dyn CredentialStore>,
		endpoints: ApiEndpoints,
		transport: impl Into<Arc<C>>,
	) -> Self {
		let pipeline = RequestPipeline::with_transport(store, endpoints, transport);
		let core = Arc::new(SessionCore::new());

		pipeline.add_exhaustion_observer(core.clone());

		Self { pipeline: Arc::new(pipeline), core }
	}

	/// Registers an observer run after the session has flipped to unauthenticated because
	/// renewal failed, typically navigation to the sign-in entry point.
	pub fn with_exhaustion_observer(self, observer: Arc<dyn ExhaustionObserver>) -> Self {
		self.pipeline.add_exhaustion_observer(observer);

		self
	}

	/// Current state.
	pub fn state(&self) -> SessionState {
		self.core.snapshot()
	}

	/// Read-only projection for views.
	pub fn view(&self) -> SessionView {
		SessionView(self.core.clone())
	}

	/// Shared request pipeline for additional consumers.
	pub fn pipeline(&self) -> &Arc<RequestPipeline<C>> {
		&self.pipeline
	}

	/// Profile endpoints routed through the pipeline.
	pub fn profile(&self) -> ProfileApi<'_, C> {
		ProfileApi::new(&self.pipeline)
	}

	/// Activity endpoints routed through the pipeline.
	pub fn activity(&self) -> ActivityApi<'_, C> {
		ActivityApi::new(&self.pipeline)
	}

	/// Resolves the startup phase from stored credentials.
	///
	/// Without a stored access credential the session becomes unauthenticated with zero network
	/// calls. Otherwise the identity is fetched; on any failure the session becomes
	/// unauthenticated without an error message.
	pub async fn bootstrap(&self) -> SessionState {
		const KIND: OperationKind = OperationKind::Bootstrap;

		let ticket = self.core.begin();
		let span = OperationSpan::new(KIND, "bootstrap");

		obs::record_outcome(KIND, Outcome::Attempt);

		span.instrument(async {
			let stored = match self.pipeline.store.get_access() {
				Ok(stored) => stored,
				Err(e) => {
					obs::warn_event(KIND, "failed to read stored credentials", &e);

					None
				},
			};
			let identity = match stored {
				Some(_) => self.fetch_identity(KIND).await,
				None => {
					obs::debug_event(KIND, "no stored access credential");

					None
				},
			};

			self.record(KIND, identity.is_some());
			self.core.complete(KIND, ticket, |state| state.identity = identity);
		})
		.await;

		self.state()
	}

	/// Exchanges username/password for a credential pair, persists it, then loads the identity.
	///
	/// Failure of the login call sets the error (server `detail`, else "Login failed") and clears
	/// the identity. Failure of the identity fetch after a successful login leaves the session
	/// unauthenticated without an error message.
	pub async fn sign_in(&self, username: &str, password: &str) -> SessionState {
		let ticket = self.core.begin();

		self.sign_in_with_ticket(ticket, username, password).await
	}

	/// Registers an account, then signs in with the same credentials.
	///
	/// Registration failure sets the error (server `detail`, else "Registration failed") and
	/// no sign-in is attempted.
	pub async fn sign_up(&self, username: &str, email: &str, password: &str) -> SessionState {
		const KIND: OperationKind = OperationKind::SignUp;

		let ticket = self.core.begin();
		let span = OperationSpan::new(KIND, "sign_up");

		obs::record_outcome(KIND, Outcome::Attempt);

		let registered = span
			.instrument(async {
				let request = ApiRequest::post(&self.pipeline.endpoints, Endpoint::Register)
					.with_json(&RegisterRequest { username, email, password })?;

				self.pipeline.execute(request).await
			})
			.await;

		if let Err(e) = registered {
			self.record(KIND, false);
			self.core.complete(KIND, ticket, |state| {
				state.identity = None;
				state.error = Some(failure_message(&e, REGISTRATION_FAILED));
			});

			return self.state();
		}

		self.record(KIND, true);

		// Registration counts as part of the same operation; the ticket carries over.
		if !self.core.is_latest(ticket) {
			obs::debug_event(KIND, "skipping sign-in superseded by a newer operation");

			return self.state();
		}

		self.sign_in_with_ticket(ticket, username, password).await
	}

	/// Ends the session.
	///
	/// The logout call is best effort: its failure is logged and swallowed. Afterwards the stored
	/// credentials are cleared and the session becomes unauthenticated. An operation started
	/// while the logout call was in flight supersedes it: only the credentials this sign-out
	/// started with are cleared and the newer operation decides the final state. Never fails.
	pub async fn sign_out(&self) {
		const KIND: OperationKind = OperationKind::SignOut;

		let ticket = self.core.begin();
		let span = OperationSpan::new(KIND, "sign_out");

		obs::record_outcome(KIND, Outcome::Attempt);

		span.instrument(async {
			let refresh = match self.pipeline.store.get_refresh() {
				Ok(refresh) => refresh,
				Err(e) => {
					obs::warn_event(KIND, "failed to read stored credentials", &e);

					None
				},
			};

			if let Err(e) = self.logout(refresh.as_ref()).await {
				obs::warn_event(KIND, "logout call failed; continuing locally", &e);
			}

			if let CompareAndSwapOutcome::RefreshMismatch =
				self.clear_owned(ticket, refresh.as_ref())
			{
				obs::debug_event(KIND, "a newer session replaced the credentials; keeping it");
			}

			self.core.complete(KIND, ticket, |state| state.identity = None);

			obs::record_outcome(KIND, Outcome::Success);
		})
		.await;
	}

	/// Re-fetches the identity.
	///
	/// On failure the previously loaded identity is kept and the error is set (server `detail`,
	/// else "Failed to load profile"); the session is not signed out.
	pub async fn refresh_identity(&self) -> SessionState {
		const KIND: OperationKind = OperationKind::RefreshIdentity;

		let ticket = self.core.begin();
		let span = OperationSpan::new(KIND, "refresh_identity");

		obs::record_outcome(KIND, Outcome::Attempt);

		let fetched = span.instrument(self.profile().get()).await;

		self.record(KIND, fetched.is_ok());
		self.core.complete(KIND, ticket, |state| match fetched {
			Ok(identity) => state.identity = Some(identity),
			Err(e) => {
				obs::warn_event(KIND, "identity refresh failed", &e);

				state.error = Some(failure_message(&e, PROFILE_LOAD_FAILED));
			},
		});

		self.state()
	}

	/// Dismisses the current error message.
	pub fn clear_error(&self) {
		self.core.write(|state| state.error = None);
	}

	async fn sign_in_with_ticket(&self, ticket: u64, username: &str, password: &str) -> SessionState {
		const KIND: OperationKind = OperationKind::SignIn;

		let span = OperationSpan::new(KIND, "sign_in");

		obs::record_outcome(KIND, Outcome::Attempt);

		span.instrument(async {
			let pair = match self.login(username, password).await {
				Ok(pair) => pair,
				Err(e) => {
					self.record(KIND, false);
					self.core.complete(KIND, ticket, |state| {
						state.identity = None;
						state.error = Some(failure_message(&e, LOGIN_FAILED));
					});

					return;
				},
			};

			if !self.core.is_latest(ticket) {
				obs::debug_event(KIND, "dropping credentials superseded by a newer operation");

				return;
			}
			if let Err(e) = self.pipeline.store.set(pair) {
				let e = Error::from(e);

				self.record(KIND, false);
				self.core.complete(KIND, ticket, |state| {
					state.identity = None;
					state.error = Some(failure_message(&e, LOGIN_FAILED));
				});

				return;
			}

			let identity = self.fetch_identity(KIND).await;

			self.record(KIND, identity.is_some());
			self.core.complete(KIND, ticket, |state| state.identity = identity);
		})
		.await;

		self.state()
	}

	async fn login(&self, username: &str, password: &str) -> Result<CredentialPair> {
		let request = ApiRequest::post(&self.pipeline.endpoints, Endpoint::Login)
			.with_json(&LoginRequest { username, password })?;

		self.pipeline.execute_json(request).await
	}

	async fn logout(&self, refresh: Option<&TokenSecret>) -> Result<()> {
		let mut request = ApiRequest::post(&self.pipeline.endpoints, Endpoint::Logout);

		if let Some(refresh) = refresh {
			request = request.with_json(&serde_json::json!({ "refresh": refresh.expose() }))?;
		}

		self.pipeline.execute(request).await.map(|_| ())
	}

	/// Clears the store for a completing sign-out.
	///
	/// While `ticket` is the latest operation everything is cleared, including credentials a
	/// superseded sign-in may have written. Once a newer operation exists only the pair this
	/// sign-out started with is cleared.
	fn clear_owned(&self, ticket: u64, refresh: Option<&TokenSecret>) -> CompareAndSwapOutcome {
		const KIND: OperationKind = OperationKind::SignOut;

		let store = &self.pipeline.store;
		let outcome = match refresh {
			_ if self.core.is_latest(ticket) =>
				store.clear().map(|()| CompareAndSwapOutcome::Updated),
			Some(refresh) => store.compare_and_clear(Some(refresh)),
			None => store.load().map(|pair| match pair {
				Some(_) => CompareAndSwapOutcome::RefreshMismatch,
				None => CompareAndSwapOutcome::Missing,
			}),
		};

		outcome.unwrap_or_else(|e| {
			obs::warn_event(KIND, "failed to clear stored credentials", &e);

			CompareAndSwapOutcome::Missing
		})
	}

	async fn fetch_identity(&self, kind: OperationKind) -> Option<Identity> {
		match self.profile().get().await {
			Ok(identity) => Some(identity),
			Err(e) => {
				obs::warn_event(kind, "identity fetch failed", &e);

				None
			},
		}
	}

	fn record(&self, kind: OperationKind, succeeded: bool) {
		obs::record_outcome(kind, if succeeded { Outcome::Success } else { Outcome::Failure });
	}
}
#[cfg(feature = "reqwest")]
impl Session<ReqwestTransport> {
	/// Creates a session backed by a default reqwest transport.
	pub fn new(store: Arc<dyn CredentialStore>, endpoints: ApiEndpoints) -> Self {
		Self::with_transport(store, endpoints, ReqwestTransport::default())
	}

	/// Creates a session whose endpoints come from [`crate::endpoints::API_BASE_ENV`].
	pub fn from_env(store: Arc<dyn CredentialStore>) -> Result<Self> {
		let endpoints = ApiEndpoints::from_env().map_err(crate::error::ConfigError::from)?;

		Ok(Self::new(store, endpoints))
	}
}
impl<C> Clone for Session<C>
where
	C: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self { pipeline: self.pipeline.clone(), core: self.core.clone() }
	}
}
impl<C> Debug for Session<C>
where
	C: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("state", &self.core.snapshot())
			.field("pipeline", &self.pipeline)
			.finish()
	}
}

fn failure_message(error: &Error, fallback: &str) -> String {
	error.detail().map(str::to_owned).unwrap_or_else(|| fallback.to_owned())
}
