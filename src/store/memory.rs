//! In-process [`CredentialStore`] scoped to the lifetime of the session owner.
//!
//! This is the default backend: credentials vanish with the process, so every fresh start
//! requires signing in again.

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	store::{CompareAndSwapOutcome, CredentialSlots, CredentialStore, StoreError},
};

/// Thread-safe storage backend that keeps credentials in memory.
///
/// Clones share the same slots.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<CredentialSlots>>);
impl MemoryStore {
	/// Creates a store pre-seeded with a credential pair.
	pub fn with_pair(pair: CredentialPair) -> Self {
		let store = Self::default();

		store.0.write().set(pair);

		store
	}

	/// Number of keys currently stored (0 or 2).
	pub fn key_count(&self) -> usize {
		self.0.read().len()
	}
}
impl CredentialStore for MemoryStore {
	fn load(&self) -> Result<Option<CredentialPair>, StoreError> {
		Ok(self.0.read().pair())
	}

	fn set(&self, pair: CredentialPair) -> Result<(), StoreError> {
		self.0.write().set(pair);

		Ok(())
	}

	fn clear(&self) -> Result<(), StoreError> {
		self.0.write().clear();

		Ok(())
	}

	fn compare_and_swap_access(
		&self,
		expected_refresh: &TokenSecret,
		access: TokenSecret,
	) -> Result<CompareAndSwapOutcome, StoreError> {
		Ok(self.0.write().swap_access(expected_refresh, access))
	}

	fn compare_and_clear(
		&self,
		expected_refresh: Option<&TokenSecret>,
	) -> Result<CompareAndSwapOutcome, StoreError> {
		Ok(self.0.write().clear_matching(expected_refresh))
	}
}
