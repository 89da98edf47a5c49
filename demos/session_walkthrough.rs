//! Walks a session through sign-in, a transparently renewed call, and sign-out against a mock
//! API using the default reqwest transport and in-memory credential store.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
// self
use token_session::{
	endpoints::ApiEndpoints,
	http::ReqwestTransport,
	reqwest::Client,
	session::{ReqwestSession, Session},
	store::{CredentialStore, MemoryStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/login/");
			then.status(200)
				.json_body(json!({ "access": "demo-access-1", "refresh": "demo-refresh" }));
		})
		.await;
	let profile = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/profile/").header("authorization", "Bearer demo-access-1");
			then.status(200).json_body(json!({
				"id": 7,
				"username": "demo",
				"email": "demo@example.com",
				"first_name": "Dee",
				"last_name": "Mo",
			}));
		})
		.await;
	let expired_chart = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/activity-chart/")
				.header("authorization", "Bearer demo-access-1");
			then.status(401).json_body(json!({ "detail": "Token is invalid or expired" }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/token/refresh/")
				.json_body(json!({ "refresh": "demo-refresh" }));
			then.status(200).json_body(json!({ "access": "demo-access-2" }));
		})
		.await;
	let chart = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/activity-chart/")
				.header("authorization", "Bearer demo-access-2");
			then.status(200).json_body(json!([
				{ "day": "2024-03-01", "activity_type": "login", "count": 12 },
				{ "day": "2024-03-01", "activity_type": "logout", "count": 9 },
			]));
		})
		.await;
	let logout = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/logout/");
			then.status(205);
		})
		.await;
	let store = MemoryStore::default();
	let endpoints = ApiEndpoints::builder(server.url("/api/")).build()?;
	let transport = ReqwestTransport::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let session: ReqwestSession =
		Session::with_transport(Arc::new(store.clone()), endpoints, transport)
			.with_exhaustion_observer(Arc::new(|| println!("Session expired; back to sign-in.")));

	session.bootstrap().await;
	println!("Startup phase: {:?}.", session.state().phase());

	let state = session.sign_in("demo", "demo-password").await;

	if let Some(identity) = state.identity() {
		println!("Signed in as {}.", identity.display_name());
	}

	for entry in session.activity().chart().await? {
		println!("{} {}: {}.", entry.day, entry.activity_type, entry.count);
	}

	println!("Renewals issued: {}.", session.pipeline().renewal_metrics.attempts());

	session.sign_out().await;
	println!("Final phase: {:?}, stored keys: {}.", session.state().phase(), store.key_count());

	login.assert_async().await;
	profile.assert_async().await;
	expired_chart.assert_async().await;
	refresh.assert_async().await;
	chart.assert_async().await;
	logout.assert_async().await;

	assert!(store.load()?.is_none());

	Ok(())
}
