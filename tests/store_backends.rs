// std
use std::{env, fs, process, sync::Arc};
// crates.io
use time::OffsetDateTime;
// self
use token_session::{
	auth::{CredentialPair, TokenSecret},
	store::{CompareAndSwapOutcome, CredentialStore, FileStore, MemoryStore},
};

fn file_store(tag: &str) -> FileStore {
	let path = env::temp_dir().join(format!(
		"token_session_store_backends_{tag}_{}_{}.json",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	));

	FileStore::open(path).expect("Temporary file store should open.")
}

fn backends(tag: &str) -> Vec<(&'static str, Arc<dyn CredentialStore>, Option<FileStore>)> {
	let file = file_store(tag);

	vec![
		("memory", Arc::new(MemoryStore::default()) as Arc<dyn CredentialStore>, None),
		("file", Arc::new(file.clone()) as Arc<dyn CredentialStore>, Some(file)),
	]
}

fn cleanup(file: Option<FileStore>) {
	if let Some(file) = file {
		let _ = fs::remove_file(file.path());
	}
}

#[test]
fn readers_see_whole_pairs_or_nothing() {
	for (name, store, file) in backends("pairing") {
		assert_eq!(store.load().expect("Empty load should succeed."), None, "{name}");
		assert_eq!(store.get_access().expect("Access read should succeed."), None, "{name}");

		store.set(CredentialPair::new("A1", "R1")).expect("Set should succeed.");

		assert_eq!(
			store.get_refresh().expect("Refresh read should succeed."),
			Some(TokenSecret::new("R1")),
			"{name}"
		);

		store.clear().expect("Clear should succeed.");

		assert_eq!(store.get_access().expect("Access read should succeed."), None, "{name}");
		assert_eq!(store.get_refresh().expect("Refresh read should succeed."), None, "{name}");

		cleanup(file);
	}
}

#[test]
fn access_swap_is_guarded_by_refresh() {
	for (name, store, file) in backends("swap") {
		assert_eq!(
			store
				.compare_and_swap_access(&TokenSecret::new("R1"), TokenSecret::new("A2"))
				.expect("Swap on an empty store should succeed."),
			CompareAndSwapOutcome::Missing,
			"{name}"
		);

		store.set(CredentialPair::new("A9", "R9")).expect("Set should succeed.");

		assert_eq!(
			store
				.compare_and_swap_access(&TokenSecret::new("R1"), TokenSecret::new("A2"))
				.expect("Mismatched swap should succeed."),
			CompareAndSwapOutcome::RefreshMismatch,
			"{name}"
		);
		assert_eq!(
			store
				.compare_and_swap_access(&TokenSecret::new("R9"), TokenSecret::new("A10"))
				.expect("Matching swap should succeed."),
			CompareAndSwapOutcome::Updated,
			"{name}"
		);
		assert_eq!(
			store.load().expect("Load should succeed."),
			Some(CredentialPair::new("A10", "R9")),
			"{name}"
		);

		cleanup(file);
	}
}

#[test]
fn conditional_clear_spares_newer_sessions() {
	for (name, store, file) in backends("clear") {
		store.set(CredentialPair::new("A2", "R2")).expect("Set should succeed.");

		assert_eq!(
			store
				.compare_and_clear(Some(&TokenSecret::new("R1")))
				.expect("Mismatched clear should succeed."),
			CompareAndSwapOutcome::RefreshMismatch,
			"{name}"
		);
		assert!(store.load().expect("Load should succeed.").is_some(), "{name}");
		assert_eq!(
			store
				.compare_and_clear(Some(&TokenSecret::new("R2")))
				.expect("Matching clear should succeed."),
			CompareAndSwapOutcome::Updated,
			"{name}"
		);
		assert_eq!(
			store.compare_and_clear(None).expect("Clearing an empty store should succeed."),
			CompareAndSwapOutcome::Missing,
			"{name}"
		);

		cleanup(file);
	}
}

#[test]
fn file_store_survives_reopen_after_swap() {
	let store = file_store("reopen");

	store.set(CredentialPair::new("A1", "R1")).expect("Set should succeed.");
	store
		.compare_and_swap_access(&TokenSecret::new("R1"), TokenSecret::new("A2"))
		.expect("Swap should succeed.");

	let reopened = FileStore::open(store.path()).expect("Reopen should succeed.");

	assert_eq!(
		reopened.load().expect("Load should succeed."),
		Some(CredentialPair::new("A2", "R1"))
	);

	cleanup(Some(store));
}
