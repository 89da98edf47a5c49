//! Credential storage contract and built-in store implementations.
//!
//! Stores are plain key/value maps holding two fixed keys, [`ACCESS_TOKEN_KEY`] and
//! [`REFRESH_TOKEN_KEY`]. Every mutation replaces or removes both keys under one lock, so readers
//! observe either a complete [`CredentialPair`] or nothing.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
};

/// Storage key of the access credential.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key of the refresh credential.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Synchronous credential storage contract.
///
/// Implementations never touch the network and never block on I/O longer than a local write.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the stored credential pair, if both halves are present.
	fn load(&self) -> Result<Option<CredentialPair>, StoreError>;

	/// Atomically replaces both credentials.
	fn set(&self, pair: CredentialPair) -> Result<(), StoreError>;

	/// Atomically removes both credentials.
	fn clear(&self) -> Result<(), StoreError>;

	/// Replaces the access credential if the stored refresh credential equals `expected_refresh`.
	fn compare_and_swap_access(
		&self,
		expected_refresh: &TokenSecret,
		access: TokenSecret,
	) -> Result<CompareAndSwapOutcome, StoreError>;

	/// Clears both credentials if the stored refresh credential equals `expected_refresh`.
	///
	/// `None` clears unconditionally.
	fn compare_and_clear(
		&self,
		expected_refresh: Option<&TokenSecret>,
	) -> Result<CompareAndSwapOutcome, StoreError>;

	/// Returns the stored access credential.
	fn get_access(&self) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self.load()?.map(|pair| pair.access))
	}

	/// Returns the stored refresh credential.
	fn get_refresh(&self) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self.load()?.map(|pair| pair.refresh))
	}
}

/// Result of a conditional store mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The refresh credential matched and the store was updated.
	Updated,
	/// A different refresh credential is stored; nothing changed.
	RefreshMismatch,
	/// No credentials are stored.
	Missing,
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// The two-key map shared by the built-in stores.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct CredentialSlots(BTreeMap<String, TokenSecret>);
impl CredentialSlots {
	/// Rebuilds slots from persisted entries, discarding a lone half-pair.
	pub(crate) fn from_entries(entries: BTreeMap<String, TokenSecret>) -> Self {
		let mut slots = Self(entries);

		slots.0.retain(|key, _| key == ACCESS_TOKEN_KEY || key == REFRESH_TOKEN_KEY);

		if slots.0.len() != 2 {
			slots.0.clear();
		}

		slots
	}

	pub(crate) fn pair(&self) -> Option<CredentialPair> {
		let access = self.0.get(ACCESS_TOKEN_KEY)?;
		let refresh = self.0.get(REFRESH_TOKEN_KEY)?;

		Some(CredentialPair { access: access.clone(), refresh: refresh.clone() })
	}

	pub(crate) fn set(&mut self, pair: CredentialPair) {
		self.0.insert(ACCESS_TOKEN_KEY.into(), pair.access);
		self.0.insert(REFRESH_TOKEN_KEY.into(), pair.refresh);
	}

	pub(crate) fn clear(&mut self) {
		self.0.clear();
	}

	pub(crate) fn swap_access(
		&mut self,
		expected_refresh: &TokenSecret,
		access: TokenSecret,
	) -> CompareAndSwapOutcome {
		match self.0.get(REFRESH_TOKEN_KEY) {
			Some(current) if current == expected_refresh => {
				self.0.insert(ACCESS_TOKEN_KEY.into(), access);

				CompareAndSwapOutcome::Updated
			},
			Some(_) => CompareAndSwapOutcome::RefreshMismatch,
			None => CompareAndSwapOutcome::Missing,
		}
	}

	pub(crate) fn clear_matching(
		&mut self,
		expected_refresh: Option<&TokenSecret>,
	) -> CompareAndSwapOutcome {
		let outcome = match (self.0.get(REFRESH_TOKEN_KEY), expected_refresh) {
			(None, _) => CompareAndSwapOutcome::Missing,
			(Some(_), None) => CompareAndSwapOutcome::Updated,
			(Some(current), Some(expected)) if current == expected =>
				CompareAndSwapOutcome::Updated,
			(Some(_), Some(_)) => CompareAndSwapOutcome::RefreshMismatch,
		};

		if !matches!(outcome, CompareAndSwapOutcome::RefreshMismatch) {
			self.0.clear();
		}

		outcome
	}

	pub(crate) fn len(&self) -> usize {
		self.0.len()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn slots_with(access: &str, refresh: &str) -> CredentialSlots {
		let mut slots = CredentialSlots::default();

		slots.set(CredentialPair::new(access, refresh));

		slots
	}

	#[test]
	fn lone_half_pair_is_discarded_on_load() {
		let entries =
			BTreeMap::from_iter([(ACCESS_TOKEN_KEY.to_owned(), TokenSecret::new("A1"))]);
		let slots = CredentialSlots::from_entries(entries);

		assert_eq!(slots.len(), 0);
		assert!(slots.pair().is_none());
	}

	#[test]
	fn unknown_keys_are_ignored_on_load() {
		let entries = BTreeMap::from_iter([
			(ACCESS_TOKEN_KEY.to_owned(), TokenSecret::new("A1")),
			(REFRESH_TOKEN_KEY.to_owned(), TokenSecret::new("R1")),
			("theme".to_owned(), TokenSecret::new("dark")),
		]);
		let slots = CredentialSlots::from_entries(entries);

		assert_eq!(slots.len(), 2);
		assert_eq!(slots.pair(), Some(CredentialPair::new("A1", "R1")));
	}

	#[test]
	fn swap_access_requires_matching_refresh() {
		let mut slots = slots_with("A1", "R1");

		assert_eq!(
			slots.swap_access(&TokenSecret::new("R0"), TokenSecret::new("A2")),
			CompareAndSwapOutcome::RefreshMismatch
		);
		assert_eq!(slots.pair(), Some(CredentialPair::new("A1", "R1")));
		assert_eq!(
			slots.swap_access(&TokenSecret::new("R1"), TokenSecret::new("A2")),
			CompareAndSwapOutcome::Updated
		);
		assert_eq!(slots.pair(), Some(CredentialPair::new("A2", "R1")));

		let mut empty = CredentialSlots::default();

		assert_eq!(
			empty.swap_access(&TokenSecret::new("R1"), TokenSecret::new("A2")),
			CompareAndSwapOutcome::Missing
		);
		assert_eq!(empty.len(), 0);
	}

	#[test]
	fn clear_matching_keeps_newer_sessions() {
		let mut slots = slots_with("A9", "R9");

		assert_eq!(
			slots.clear_matching(Some(&TokenSecret::new("R1"))),
			CompareAndSwapOutcome::RefreshMismatch
		);
		assert_eq!(slots.len(), 2);
		assert_eq!(slots.clear_matching(None), CompareAndSwapOutcome::Updated);
		assert_eq!(slots.len(), 0);
		assert_eq!(slots.clear_matching(None), CompareAndSwapOutcome::Missing);
	}

	#[test]
	fn compare_and_swap_outcome_serializes_as_label() {
		let payload = serde_json::to_string(&CompareAndSwapOutcome::RefreshMismatch)
			.expect("CompareAndSwapOutcome should serialize to JSON.");

		assert_eq!(payload, "\"RefreshMismatch\"");
	}
}
