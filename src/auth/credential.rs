//! Opaque bearer credentials and the access/refresh pair minted at sign-in.

// self
use crate::_prelude::*;

/// Redacted bearer token wrapper keeping credential material out of logs.
///
/// Tokens are opaque: nothing in this crate decodes or validates their structure.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Renders the `Authorization` header value carrying this token.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl From<&str> for TokenSecret {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Access + refresh credentials issued together by the login endpoint.
///
/// The pair is the unit of persistence: stores write and clear both halves at once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Short-lived credential attached to every API call.
	pub access: TokenSecret,
	/// Longer-lived credential used solely to mint a new access credential.
	pub refresh: TokenSecret,
}
impl CredentialPair {
	/// Builds a pair from raw token strings.
	pub fn new(access: impl Into<TokenSecret>, refresh: impl Into<TokenSecret>) -> Self {
		Self { access: access.into(), refresh: refresh.into() }
	}
}

/// Body returned by the token-refresh endpoint.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct RenewedAccess {
	pub(crate) access: TokenSecret,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert_eq!(secret.bearer(), "Bearer super-secret");
	}

	#[test]
	fn pair_debug_never_leaks_tokens() {
		let pair = CredentialPair::new("A1", "R1");
		let rendered = format!("{pair:?}");

		assert!(!rendered.contains("A1"));
		assert!(!rendered.contains("R1"));
	}

	#[test]
	fn login_body_deserializes_into_pair() {
		let pair: CredentialPair = serde_json::from_str(r#"{"access":"A1","refresh":"R1"}"#)
			.expect("Login body should deserialize into a credential pair.");

		assert_eq!(pair.access.expose(), "A1");
		assert_eq!(pair.refresh.expose(), "R1");
	}
}
