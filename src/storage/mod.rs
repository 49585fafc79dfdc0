pub mod error;
pub mod fake;
pub mod s3;
pub mod store;

pub use error::StorageError;
pub use fake::FakeObjectStore;
pub use s3::S3ObjectStore;
pub use store::ObjectStore;
