//! File-backed [`CredentialStore`] for command-line consumers that opt into persistence.
//!
//! The file is a flat JSON object keyed by `access_token` / `refresh_token`, rewritten through a
//! temporary file and rename after each mutation.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	store::{CompareAndSwapOutcome, CredentialSlots, CredentialStore, StoreError},
};

/// Persists credentials to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<CredentialSlots>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let slots = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(slots)) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<CredentialSlots, StoreError> {
		if !path.exists() {
			return Ok(CredentialSlots::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(CredentialSlots::default());
		}

		let entries: BTreeMap<String, TokenSecret> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(CredentialSlots::from_entries(entries))
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, slots: &CredentialSlots) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(slots).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize credentials: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn mutate<T>(&self, apply: impl FnOnce(&mut CredentialSlots) -> T) -> Result<T, StoreError> {
		let mut guard = self.inner.write();
		let mut next = guard.clone();
		let value = apply(&mut next);

		if next != *guard {
			self.persist_locked(&next)?;

			*guard = next;
		}

		Ok(value)
	}
}
impl CredentialStore for FileStore {
	fn load(&self) -> Result<Option<CredentialPair>, StoreError> {
		Ok(self.inner.read().pair())
	}

	fn set(&self, pair: CredentialPair) -> Result<(), StoreError> {
		self.mutate(|slots| slots.set(pair))
	}

	fn clear(&self) -> Result<(), StoreError> {
		self.mutate(CredentialSlots::clear)
	}

	fn compare_and_swap_access(
		&self,
		expected_refresh: &TokenSecret,
		access: TokenSecret,
	) -> Result<CompareAndSwapOutcome, StoreError> {
		self.mutate(|slots| slots.swap_access(expected_refresh, access))
	}

	fn compare_and_clear(
		&self,
		expected_refresh: Option<&TokenSecret>,
	) -> Result<CompareAndSwapOutcome, StoreError> {
		self.mutate(|slots| slots.clear_matching(expected_refresh))
	}
}
