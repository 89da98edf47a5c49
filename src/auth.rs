//! Auth-domain models: opaque bearer credentials and the authenticated identity.

pub mod credential;
pub mod identity;

pub use credential::*;
pub use identity::*;
