pub mod cloud;
#[allow(clippy::module_inception)]
pub mod connector;
pub mod error;
pub mod models;
#[cfg(test)]
mod tests;

pub use cloud::{CloudConnector, ConnectorSettings};
pub use connector::Connector;
pub use error::ConnectorError;
pub use models::{
    CleanupReport, Deployment, DeploymentSpace, JobSummary, ModelAsset, ModelType, Runtime,
    SoftwareSpecification, SpaceStorage, TShirtSize, MAX_NODES,
};
