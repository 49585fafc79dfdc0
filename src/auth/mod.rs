pub mod error;
pub mod fake;
pub mod handler;
pub mod identity;
pub mod token;

pub use error::AuthError;
pub use fake::FakeIdentity;
pub use handler::CachedTokenHandler;
pub use identity::{identity_for, HostedIdentity, IamIdentity, IdentityProvider};
pub use token::{BearerToken, TokenHandler};
