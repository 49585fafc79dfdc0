pub mod connector;
pub mod error;

pub use connector::{CosConnection, CosConnector, CosStorageConnector};
pub use error::CosError;
