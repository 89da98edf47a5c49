//! Identity records returned by the profile endpoint.

// self
use crate::_prelude::*;

/// The authenticated user's profile as reported by the server.
///
/// Identity is always fetched fresh from the profile endpoint and never derived from token
/// contents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
	/// Server-side user identifier.
	pub id: u64,
	/// Login name.
	pub username: String,
	/// Contact email.
	#[serde(default)]
	pub email: String,
	/// Superuser flag.
	#[serde(default)]
	pub is_superuser: bool,
	/// Staff flag.
	#[serde(default)]
	pub is_staff: bool,
	/// Optional given name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub first_name: Option<String>,
	/// Optional family name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_name: Option<String>,
}
impl Identity {
	/// Projects the role flags.
	pub fn roles(&self) -> Roles {
		Roles { is_privileged: self.is_superuser, is_staff: self.is_staff }
	}

	/// Human-facing name: "first last" when either is set, otherwise the username.
	pub fn display_name(&self) -> String {
		let parts = [self.first_name.as_deref(), self.last_name.as_deref()]
			.into_iter()
			.flatten()
			.map(str::trim)
			.filter(|part| !part.is_empty())
			.collect::<Vec<_>>();

		if parts.is_empty() { self.username.clone() } else { parts.join(" ") }
	}
}

/// Role flags carried by an [`Identity`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Roles {
	/// Full administrative rights.
	pub is_privileged: bool,
	/// Staff-level access.
	pub is_staff: bool,
}

/// Partial identity update sent to the profile-update endpoint; `None` fields are omitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
	#[serde(skip_serializing_if = "Option::is_none")]
	/// New login name.
	pub username: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	/// New contact email.
	pub email: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	/// New given name.
	pub first_name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	/// New family name.
	pub last_name: Option<String>,
}
impl ProfileUpdate {
	/// Sets the username.
	pub fn username(mut self, value: impl Into<String>) -> Self {
		self.username = Some(value.into());

		self
	}

	/// Sets the email.
	pub fn email(mut self, value: impl Into<String>) -> Self {
		self.email = Some(value.into());

		self
	}

	/// Sets the given name.
	pub fn first_name(mut self, value: impl Into<String>) -> Self {
		self.first_name = Some(value.into());

		self
	}

	/// Sets the family name.
	pub fn last_name(mut self, value: impl Into<String>) -> Self {
		self.last_name = Some(value.into());

		self
	}

	/// Returns `true` when no field would be sent.
	pub fn is_empty(&self) -> bool {
		self.username.is_none()
			&& self.email.is_none()
			&& self.first_name.is_none()
			&& self.last_name.is_none()
	}
}
