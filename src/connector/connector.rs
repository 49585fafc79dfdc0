use crate::connector::error::ConnectorError;
use crate::connector::models::{
    CleanupReport, Deployment, DeploymentSpace, JobSummary, ModelAsset, ModelType, Runtime,
    SoftwareSpecification, SpaceStorage, TShirtSize,
};
use crate::job::{DataReference, Job, JobRequest};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;

/// Connector trait: get-or-create orchestration of the resources a job runs on.
///
/// Every space-scoped operation works in the connector's space, resolved once
/// from the credentials (by id, or by name with get-or-create).
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Id of the working deployment space
    async fn space_id(&self) -> Result<String, ConnectorError>;

    /// Create a new space named `name` and return its id. Names are not unique.
    async fn create_deployment_space(&self, name: &str) -> Result<String, ConnectorError>;

    async fn get_deployment_space_id_by_name(
        &self,
        name: &str,
    ) -> Result<Option<String>, ConnectorError>;

    async fn list_deployment_spaces(&self) -> Result<Vec<DeploymentSpace>, ConnectorError>;

    async fn list_software_specifications(
        &self,
    ) -> Result<Vec<SoftwareSpecification>, ConnectorError>;

    async fn get_software_specification_id_by_name(
        &self,
        name: &str,
    ) -> Result<String, ConnectorError>;

    /// Create a model asset and upload its content, if any
    ///
    /// * `asset_path` - Model archive or file; `None` creates an empty model
    /// * `custom_options` - Forwarded as the model's `custom` map
    async fn create_new_model(
        &self,
        name: &str,
        runtime: Runtime,
        model_type: ModelType,
        asset_path: Option<&Path>,
        custom_options: Option<&Map<String, Value>>,
    ) -> Result<String, ConnectorError>;

    async fn get_model_id_by_name(&self, name: &str) -> Result<Option<String>, ConnectorError>;

    async fn list_models(&self) -> Result<Vec<ModelAsset>, ConnectorError>;

    /// Delete one model; an absent model counts as deleted
    async fn delete_model(&self, model_id: &str) -> Result<(), ConnectorError>;

    /// Delete every model in the space, returning how many were removed
    async fn delete_models(&self) -> Result<usize, ConnectorError>;

    /// Deploy `model_id` for batch jobs on `nodes` nodes of the given size
    async fn deploy_model(
        &self,
        name: &str,
        model_id: &str,
        size: TShirtSize,
        nodes: u32,
    ) -> Result<String, ConnectorError>;

    /// Id of the deployment named `name`, creating an empty model and deploying it if needed
    async fn get_or_make_deployment(
        &self,
        name: &str,
        is_cplex: bool,
    ) -> Result<String, ConnectorError>;

    async fn get_deployment_id_by_name(
        &self,
        name: &str,
    ) -> Result<Option<String>, ConnectorError>;

    async fn list_deployments(&self) -> Result<Vec<Deployment>, ConnectorError>;

    async fn delete_deployment(&self, deployment_id: &str) -> Result<(), ConnectorError>;

    async fn delete_deployments(&self) -> Result<usize, ConnectorError>;

    /// Submit a job and return its handle without fetching status
    async fn create_job(&self, request: &JobRequest) -> Result<Box<dyn Job>, ConnectorError>;

    /// Submit a job and fetch its status once
    async fn create_and_run_job(
        &self,
        request: &JobRequest,
    ) -> Result<Box<dyn Job>, ConnectorError>;

    /// Submit a job whose inputs and outputs live in object storage
    async fn create_job_with_references(
        &self,
        deployment_id: &str,
        inputs: Vec<DataReference>,
        outputs: Vec<DataReference>,
    ) -> Result<Box<dyn Job>, ConnectorError>;

    async fn get_job(&self, job_id: &str) -> Result<Box<dyn Job>, ConnectorError>;

    async fn list_jobs(&self) -> Result<Vec<JobSummary>, ConnectorError>;

    async fn delete_job(&self, job_id: &str) -> Result<(), ConnectorError>;

    async fn delete_jobs(&self) -> Result<usize, ConnectorError>;

    /// Storage bound to the working space
    async fn get_storage(&self) -> Result<Option<SpaceStorage>, ConnectorError>;

    async fn get_storage_by_space_id(
        &self,
        space_id: &str,
    ) -> Result<Option<SpaceStorage>, ConnectorError>;

    /// Asset catalog of the working space
    async fn get_catalog_id(&self) -> Result<String, ConnectorError>;

    async fn get_catalog_id_by_space_id(&self, space_id: &str) -> Result<String, ConnectorError>;

    /// Delete jobs, then deployments, then models. Failures are logged and skipped.
    async fn clean_space(&self) -> Result<CleanupReport, ConnectorError>;

    /// Drop the token session
    async fn end(&self);
}
