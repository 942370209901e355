//! Authentication: realms, challenge parsing and challenge responders

pub mod authenticator;
pub mod basic_auth;
pub mod challenge;
pub mod realm;

pub use authenticator::{Authenticator, BasicAuthenticator};
pub use basic_auth::basic_auth;
pub use challenge::{Challenge, ChallengeError, parse_challenges};
pub use realm::{AuthScheme, Realm};
