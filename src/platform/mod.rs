pub mod error;
pub mod fake;
pub mod http;
#[allow(clippy::module_inception)]
pub mod platform;
pub mod resource;

pub use error::ApiError;
pub use fake::FakePlatform;
pub use http::{build_http_client, HttpPlatform};
pub use platform::Platform;
pub use resource::{first_match, resource_id, resource_name, ResourceKind};
