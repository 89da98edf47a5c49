//! Remote API endpoint configuration.
//!
//! [`ApiEndpoints`] resolves every endpoint the session talks to against one base URL. Paths
//! default to the server contract and can be overridden individually through
//! [`ApiEndpointsBuilder`].

// std
use std::env;
// self
use crate::_prelude::*;

/// Environment variable consulted by [`ApiEndpoints::from_env`].
pub const API_BASE_ENV: &str = "TOKEN_SESSION_API_BASE";
/// Base URL used when [`API_BASE_ENV`] is unset.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api/";

/// Logical endpoints exposed by the remote API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
	/// Account registration.
	Register,
	/// Credential pair issuance.
	Login,
	/// Refresh credential invalidation.
	Logout,
	/// Access credential renewal.
	TokenRefresh,
	/// Identity read.
	Profile,
	/// Partial identity update.
	ProfileUpdate,
	/// Daily activity counts.
	ActivityChart,
	/// Daily login/logout counts.
	LoginLogoutStats,
}
impl Endpoint {
	/// All endpoints, in declaration order.
	pub const ALL: [Endpoint; 8] = [
		Endpoint::Register,
		Endpoint::Login,
		Endpoint::Logout,
		Endpoint::TokenRefresh,
		Endpoint::Profile,
		Endpoint::ProfileUpdate,
		Endpoint::ActivityChart,
		Endpoint::LoginLogoutStats,
	];

	const fn index(self) -> usize {
		self as usize
	}

	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Endpoint::Register => "register",
			Endpoint::Login => "login",
			Endpoint::Logout => "logout",
			Endpoint::TokenRefresh => "token_refresh",
			Endpoint::Profile => "profile",
			Endpoint::ProfileUpdate => "profile_update",
			Endpoint::ActivityChart => "activity_chart",
			Endpoint::LoginLogoutStats => "login_logout_stats",
		}
	}

	/// Path relative to the API base used when no override is configured.
	pub const fn default_path(self) -> &'static str {
		match self {
			Endpoint::Register => "register/",
			Endpoint::Login => "login/",
			Endpoint::Logout => "logout/",
			Endpoint::TokenRefresh => "token/refresh/",
			Endpoint::Profile => "profile/",
			Endpoint::ProfileUpdate => "profile-update/",
			Endpoint::ActivityChart => "activity-chart/",
			Endpoint::LoginLogoutStats => "login-logout-stats/",
		}
	}
}
impl Display for Endpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Errors raised while constructing endpoint configuration.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum EndpointsError {
	/// The base URL could not be parsed.
	#[error("API base URL `{url}` is invalid: {reason}.")]
	InvalidBase {
		/// Raw base URL.
		url: String,
		/// Parser message.
		reason: String,
	},
	/// Only HTTP(S) bases are supported.
	#[error("API base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Offending base URL.
		url: String,
	},
	/// The base URL cannot carry relative paths (e.g. `mailto:`).
	#[error("API base URL cannot be used as a base: {url}.")]
	CannotBeABase {
		/// Offending base URL.
		url: String,
	},
	/// An endpoint path is absolute or otherwise fails to join onto the base.
	#[error("The {endpoint} path `{path}` is invalid.")]
	InvalidPath {
		/// Endpoint whose path failed.
		endpoint: Endpoint,
		/// Offending path.
		path: String,
	},
}

/// Resolved endpoint URLs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiEndpoints {
	base: Url,
	urls: [Url; Endpoint::ALL.len()],
}
impl ApiEndpoints {
	/// Creates a builder rooted at `base`.
	pub fn builder(base: impl AsRef<str>) -> ApiEndpointsBuilder {
		ApiEndpointsBuilder::new(base)
	}

	/// Builds endpoints with default paths from [`API_BASE_ENV`] or [`DEFAULT_API_BASE`].
	pub fn from_env() -> Result<Self, EndpointsError> {
		let base = env::var(API_BASE_ENV)
			.ok()
			.filter(|value| !value.trim().is_empty())
			.unwrap_or_else(|| DEFAULT_API_BASE.to_owned());

		Self::builder(base.trim()).build()
	}

	/// Normalized base URL (always ends with `/`).
	pub fn base(&self) -> &Url {
		&self.base
	}

	/// Absolute URL of an endpoint.
	pub fn url(&self, endpoint: Endpoint) -> &Url {
		&self.urls[endpoint.index()]
	}
}

/// Builder for [`ApiEndpoints`].
#[derive(Debug)]
pub struct ApiEndpointsBuilder {
	/// Raw base URL.
	pub base: String,
	/// Per-endpoint path overrides.
	pub overrides: HashMap<Endpoint, String>,
}
impl ApiEndpointsBuilder {
	/// Creates a builder rooted at `base`.
	pub fn new(base: impl AsRef<str>) -> Self {
		Self { base: base.as_ref().to_owned(), overrides: HashMap::new() }
	}

	/// Overrides the relative path of one endpoint.
	pub fn path(mut self, endpoint: Endpoint, path: impl Into<String>) -> Self {
		self.overrides.insert(endpoint, path.into());

		self
	}

	/// Validates the base and resolves every endpoint.
	pub fn build(self) -> Result<ApiEndpoints, EndpointsError> {
		let base = normalize_base(&self.base)?;
		let mut urls = std::array::from_fn(|_| base.clone());

		for endpoint in Endpoint::ALL {
			let path = self
				.overrides
				.get(&endpoint)
				.map(String::as_str)
				.unwrap_or(endpoint.default_path());

			urls[endpoint.index()] = resolve_path(&base, endpoint, path)?;
		}

		Ok(ApiEndpoints { base, urls })
	}
}

fn normalize_base(raw: &str) -> Result<Url, EndpointsError> {
	let mut base = Url::parse(raw)
		.map_err(|e| EndpointsError::InvalidBase { url: raw.to_owned(), reason: e.to_string() })?;

	if !matches!(base.scheme(), "http" | "https") {
		return Err(EndpointsError::UnsupportedScheme { url: raw.to_owned() });
	}
	if base.cannot_be_a_base() {
		return Err(EndpointsError::CannotBeABase { url: raw.to_owned() });
	}
	if !base.path().ends_with('/') {
		let path = format!("{}/", base.path());

		base.set_path(&path);
	}

	Ok(base)
}

fn resolve_path(base: &Url, endpoint: Endpoint, path: &str) -> Result<Url, EndpointsError> {
	let invalid = || EndpointsError::InvalidPath { endpoint, path: path.to_owned() };

	// Absolute paths and full URLs would escape the API base.
	if path.starts_with('/') || path.contains("://") {
		return Err(invalid());
	}

	base.join(path).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn default_paths_resolve_under_base() {
		let endpoints = ApiEndpoints::builder("http://localhost:8000/api")
			.build()
			.expect("Endpoints should build for a plain HTTP base.");

		assert_eq!(endpoints.base().as_str(), "http://localhost:8000/api/");
		assert_eq!(endpoints.url(Endpoint::Login).as_str(), "http://localhost:8000/api/login/");
		assert_eq!(
			endpoints.url(Endpoint::TokenRefresh).as_str(),
			"http://localhost:8000/api/token/refresh/"
		);
		assert_eq!(
			endpoints.url(Endpoint::ProfileUpdate).as_str(),
			"http://localhost:8000/api/profile-update/"
		);
	}

	#[test]
	fn every_endpoint_resolves_to_its_own_path() {
		let endpoints = ApiEndpoints::builder("http://localhost:8000/api/")
			.build()
			.expect("Endpoints should build for a plain HTTP base.");

		for (position, endpoint) in Endpoint::ALL.into_iter().enumerate() {
			assert_eq!(endpoint.index(), position);
			assert_eq!(
				endpoints.url(endpoint).as_str(),
				format!("http://localhost:8000/api/{}", endpoint.default_path())
			);
		}
	}

	#[test]
	fn overrides_replace_single_paths() {
		let endpoints = ApiEndpoints::builder("https://api.example.com/v2/")
			.path(Endpoint::TokenRefresh, "auth/renew/")
			.build()
			.expect("Endpoints should build with an override.");

		assert_eq!(
			endpoints.url(Endpoint::TokenRefresh).as_str(),
			"https://api.example.com/v2/auth/renew/"
		);
		assert_eq!(endpoints.url(Endpoint::Login).as_str(), "https://api.example.com/v2/login/");
	}

	#[test]
	fn rejects_unusable_bases_and_paths() {
		assert!(matches!(
			ApiEndpoints::builder("ftp://example.com/api").build(),
			Err(EndpointsError::UnsupportedScheme { .. })
		));
		assert!(matches!(
			ApiEndpoints::builder("not a url").build(),
			Err(EndpointsError::InvalidBase { .. })
		));
		assert!(matches!(
			ApiEndpoints::builder("https://example.com/api/")
				.path(Endpoint::Logout, "/logout/")
				.build(),
			Err(EndpointsError::InvalidPath { endpoint: Endpoint::Logout, .. })
		));
	}
}
