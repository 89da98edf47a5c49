//! Typed consumers of the authenticated API surface.
//!
//! Consumers never handle credentials: every call is routed through the [`RequestPipeline`], so
//! expiry is renewed transparently and exhaustion is reported to the session.

// crates.io
use time::macros::format_description;
// self
use crate::{
	_prelude::*,
	auth::{Identity, ProfileUpdate},
	endpoints::Endpoint,
	http::{ApiMethod, ApiRequest, ApiTransport},
	pipeline::RequestPipeline,
};

/// Activity kinds reported by the activity endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum ActivityType {
	/// A successful sign-in.
	Login,
	/// A sign-out.
	Logout,
	/// Any kind this client does not model.
	Other(String),
}
impl ActivityType {
	/// Returns the wire label.
	pub fn as_str(&self) -> &str {
		match self {
			ActivityType::Login => "login",
			ActivityType::Logout => "logout",
			ActivityType::Other(kind) => kind,
		}
	}
}
impl From<String> for ActivityType {
	fn from(value: String) -> Self {
		match value.as_str() {
			"login" => ActivityType::Login,
			"logout" => ActivityType::Logout,
			_ => ActivityType::Other(value),
		}
	}
}
impl Display for ActivityType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Number of activities of one kind on one calendar day.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ActivityCount {
	/// Calendar day (`YYYY-MM-DD` on the wire).
	#[serde(deserialize_with = "deserialize_day")]
	pub day: Date,
	/// Activity kind.
	pub activity_type: ActivityType,
	/// Number of occurrences.
	pub count: u64,
}

fn deserialize_day<'de, D>(deserializer: D) -> Result<Date, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;

	Date::parse(&raw, format_description!("[year]-[month]-[day]")).map_err(serde::de::Error::custom)
}

/// Sums counts per activity kind.
pub fn totals_by_type(counts: &[ActivityCount]) -> HashMap<ActivityType, u64> {
	let mut totals = HashMap::new();

	for entry in counts {
		*totals.entry(entry.activity_type.clone()).or_insert(0) += entry.count;
	}

	totals
}

/// Profile endpoints.
pub struct ProfileApi<'a, C>
where
	C: ?Sized + ApiTransport,
{
	pipeline: &'a RequestPipeline<C>,
}
impl<'a, C> ProfileApi<'a, C>
where
	C: ?Sized + ApiTransport,
{
	/// Binds the consumer to a pipeline.
	pub fn new(pipeline: &'a RequestPipeline<C>) -> Self {
		Self { pipeline }
	}

	/// Fetches the authenticated identity.
	pub async fn get(&self) -> Result<Identity> {
		self.pipeline
			.execute_json(ApiRequest::get(&self.pipeline.endpoints, Endpoint::Profile))
			.await
	}

	/// Applies a partial update and returns the identity reported by the server.
	pub async fn update(&self, update: &ProfileUpdate) -> Result<Identity> {
		let request =
			ApiRequest::new(&self.pipeline.endpoints, Endpoint::ProfileUpdate, ApiMethod::Patch)
				.with_json(update)?;

		self.pipeline.execute_json(request).await
	}
}

/// Activity reporting endpoints.
pub struct ActivityApi<'a, C>
where
	C: ?Sized + ApiTransport,
{
	pipeline: &'a RequestPipeline<C>,
}
impl<'a, C> ActivityApi<'a, C>
where
	C: ?Sized + ApiTransport,
{
	/// Binds the consumer to a pipeline.
	pub fn new(pipeline: &'a RequestPipeline<C>) -> Self {
		Self { pipeline }
	}

	/// Daily counts of every activity kind.
	pub async fn chart(&self) -> Result<Vec<ActivityCount>> {
		self.pipeline
			.execute_json(ApiRequest::get(&self.pipeline.endpoints, Endpoint::ActivityChart))
			.await
	}

	/// Daily login/logout counts.
	pub async fn login_logout_stats(&self) -> Result<Vec<ActivityCount>> {
		self.pipeline
			.execute_json(ApiRequest::get(&self.pipeline.endpoints, Endpoint::LoginLogoutStats))
			.await
	}
}
