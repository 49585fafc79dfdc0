use crate::auth::{identity_for, CachedTokenHandler, TokenHandler};
use crate::connector::connector::Connector;
use crate::connector::error::ConnectorError;
use crate::connector::models::{
    CleanupReport, Deployment, DeploymentSpace, JobSummary, ModelAsset, ModelType, Runtime,
    SoftwareSpecification, SpaceStorage, TShirtSize, MAX_NODES,
};
use crate::cos::{CosConnector, CosError, CosStorageConnector};
use crate::credentials::{Credentials, SpaceRef};
use crate::job::{DataReference, Job, JobRequest, RemoteJob};
use crate::platform::{
    build_http_client, first_match, resource_id, ApiError, HttpPlatform, Platform, ResourceKind,
};
use crate::retry::{retry, RetryPolicy};
use crate::storage::{ObjectStore, S3ObjectStore};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Tuning for a CloudConnector
#[derive(Debug, Clone, Copy)]
pub struct ConnectorSettings {
    pub retry: RetryPolicy,
    /// Model assets up to this many bytes are uploaded as model content;
    /// larger ones go through object storage
    pub inline_asset_limit: u64,
    /// Tokens are refreshed this long before they expire
    pub token_refresh_margin: Duration,
}

/// Connector over the platform REST surface
pub struct CloudConnector {
    credentials: Arc<Credentials>,
    tokens: Arc<dyn TokenHandler>,
    platform: Arc<dyn Platform>,
    settings: ConnectorSettings,
    space_id: OnceCell<String>,
    cos: OnceCell<Arc<dyn CosConnector>>,
    object_store: Option<Arc<dyn ObjectStore>>,
}

impl CloudConnector {
    /// Build the HTTP stack for `credentials` and acquire a first token
    pub async fn connect(
        credentials: Arc<Credentials>,
        settings: ConnectorSettings,
    ) -> Result<Self, ConnectorError> {
        let client = build_http_client().map_err(|e| ConnectorError::Other(e.into()))?;

        let identity = identity_for(&credentials, client.clone());
        let tokens: Arc<dyn TokenHandler> = Arc::new(CachedTokenHandler::new(
            identity,
            settings.retry,
            settings.token_refresh_margin,
        ));
        tokens.init_token().await?;

        let platform = Arc::new(HttpPlatform::new(client, tokens.clone(), &credentials));
        info!(
            "Connected to {} ({})",
            credentials.api_url(),
            if credentials.is_hosted() { "software-hosted" } else { "public cloud" }
        );

        Ok(Self::with_platform(credentials, settings, tokens, platform))
    }

    /// Connector over an existing token handler and platform client
    pub fn with_platform(
        credentials: Arc<Credentials>,
        settings: ConnectorSettings,
        tokens: Arc<dyn TokenHandler>,
        platform: Arc<dyn Platform>,
    ) -> Self {
        Self {
            credentials,
            tokens,
            platform,
            settings,
            space_id: OnceCell::new(),
            cos: OnceCell::new(),
            object_store: None,
        }
    }

    /// Use `store` for object storage instead of the bucket in the credentials
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    /// Object-storage connector bound to the working space
    pub async fn cos_connector(&self) -> Result<Arc<dyn CosConnector>, ConnectorError> {
        let space_id = self.space_id().await?;
        let cos = self
            .cos
            .get_or_try_init(|| async {
                let credentials = self.credentials.cos().ok_or_else(|| {
                    CosError::Config("no cos_* credentials configured".to_string())
                })?;
                let store: Arc<dyn ObjectStore> = match &self.object_store {
                    Some(store) => store.clone(),
                    None => Arc::new(S3ObjectStore::new(credentials).await.map_err(CosError::from)?),
                };
                let connector = CosStorageConnector::new(
                    self.platform.clone(),
                    store,
                    credentials,
                    space_id,
                    self.settings.retry,
                );
                Ok::<_, CosError>(Arc::new(connector) as Arc<dyn CosConnector>)
            })
            .await?;
        Ok(cos.clone())
    }

    /// Idempotent read, retried on transport failures
    async fn read<T, F, Fut>(&self, what: &str, op: F) -> Result<T, ConnectorError>
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, ApiError>> + Send,
        T: Send,
    {
        Ok(retry(&self.settings.retry, what, ApiError::is_transient, op).await?)
    }

    async fn list_kind(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        filters: &[(&str, &str)],
    ) -> Result<Vec<Value>, ConnectorError> {
        self.read(&format!("list {}s", kind), || {
            self.platform.list(kind, space_id, filters)
        })
        .await
    }

    /// First resource named `name`, in creation order
    async fn find_by_name(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        name: &str,
    ) -> Result<Option<String>, ConnectorError> {
        let filters = [("name", name)];
        let docs = self.list_kind(kind, space_id, &filters).await?;
        Ok(first_match(&docs, name)
            .and_then(resource_id)
            .map(str::to_string))
    }

    async fn list_in_space<T>(
        &self,
        kind: ResourceKind,
        parse: fn(&Value) -> Option<T>,
    ) -> Result<Vec<T>, ConnectorError> {
        let space_id = self.space_id().await?;
        let docs = self.list_kind(kind, Some(space_id.as_str()), &[]).await?;
        Ok(docs.iter().filter_map(parse).collect())
    }

    /// Delete one resource; absence counts as success
    async fn delete_one(&self, kind: ResourceKind, id: &str) -> Result<(), ConnectorError> {
        let space_id = self.space_id().await?;
        let result = self
            .read(&format!("delete {} {}", kind, id), || {
                self.platform.delete(kind, Some(space_id.as_str()), id)
            })
            .await;

        match result {
            Ok(()) => {
                info!("Deleted {} {}", kind, id);
                Ok(())
            }
            Err(ConnectorError::NotFound { .. }) => {
                debug!("{} {} already gone", kind, id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Delete every resource of `kind` in the space, skipping failures
    async fn delete_all(&self, kind: ResourceKind) -> Result<usize, ConnectorError> {
        let space_id = self.space_id().await?;
        let docs = self.list_kind(kind, Some(space_id.as_str()), &[]).await?;

        let mut deleted = 0;
        for id in docs.iter().filter_map(resource_id) {
            match self.delete_one(kind, id).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!("Failed to delete {} {}: {}", kind, id, e),
            }
        }

        info!("Deleted {}/{} {}s in space {}", deleted, docs.len(), kind, space_id);
        Ok(deleted)
    }

    fn space_body(&self, name: &str) -> Value {
        let mut body = json!({ "name": name, "description": "" });
        if let Credentials::Public(public) = self.credentials.as_ref() {
            if let Some(crn) = &public.storage_crn {
                body["storage"] = json!({ "type": "bmcos_object_storage", "resource_crn": crn });
            }
            if let Some(crn) = &public.compute_crn {
                body["compute"] = json!([{ "name": "compute", "crn": crn, "type": "machine_learning" }]);
            }
        }
        body
    }

    async fn read_asset(name: &str, path: &Path) -> Result<Bytes, ConnectorError> {
        tokio::fs::read(path)
            .await
            .map(Bytes::from)
            .map_err(|e| ConnectorError::Asset {
                name: name.to_string(),
                reason: format!("cannot read {}: {}", path.display(), e),
            })
    }

    /// Upload a large asset to object storage and describe where the platform finds it
    async fn stage_asset(
        &self,
        name: &str,
        path: &Path,
        content: Bytes,
    ) -> Result<Value, ConnectorError> {
        let asset_error = |e: &dyn std::fmt::Display| ConnectorError::Asset {
            name: name.to_string(),
            reason: format!("cannot stage asset in object storage: {}", e),
        };

        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        let key = format!("models/{}/{}", name, file_name);

        let cos = self.cos_connector().await.map_err(|e| asset_error(&e))?;
        cos.put_bytes(&key, content).await.map_err(|e| asset_error(&e))?;
        let reference = cos.get_data_references(&key).await.map_err(|e| asset_error(&e))?;

        Ok(reference.to_json())
    }

    fn job_handle(&self, id: &str, space_id: &str) -> Box<dyn Job> {
        Box::new(RemoteJob::created(
            id,
            space_id,
            self.platform.clone(),
            self.settings.retry,
        ))
    }
}

fn created_id(kind: ResourceKind, doc: &Value) -> Result<String, ConnectorError> {
    resource_id(doc).map(str::to_string).ok_or_else(|| {
        ConnectorError::Other(anyhow::anyhow!("created {} has no id", kind))
    })
}

#[async_trait]
impl Connector for CloudConnector {
    async fn space_id(&self) -> Result<String, ConnectorError> {
        let id = self
            .space_id
            .get_or_try_init(|| async {
                match self.credentials.space() {
                    SpaceRef::Id(id) => Ok(id.clone()),
                    SpaceRef::Name(name) => {
                        match self.get_deployment_space_id_by_name(name).await? {
                            Some(id) => {
                                debug!("Using deployment space {} ({})", name, id);
                                Ok(id)
                            }
                            None => self.create_deployment_space(name).await,
                        }
                    }
                }
            })
            .await?;
        Ok(id.clone())
    }

    async fn create_deployment_space(&self, name: &str) -> Result<String, ConnectorError> {
        let created = self
            .platform
            .create(ResourceKind::Space, None, self.space_body(name))
            .await?;
        let id = created_id(ResourceKind::Space, &created)?;
        info!("Created deployment space {} ({})", name, id);
        Ok(id)
    }

    async fn get_deployment_space_id_by_name(
        &self,
        name: &str,
    ) -> Result<Option<String>, ConnectorError> {
        self.find_by_name(ResourceKind::Space, None, name).await
    }

    async fn list_deployment_spaces(&self) -> Result<Vec<DeploymentSpace>, ConnectorError> {
        let docs = self.list_kind(ResourceKind::Space, None, &[]).await?;
        Ok(docs.iter().filter_map(DeploymentSpace::from_document).collect())
    }

    async fn list_software_specifications(
        &self,
    ) -> Result<Vec<SoftwareSpecification>, ConnectorError> {
        let docs = self
            .list_kind(ResourceKind::SoftwareSpecification, None, &[])
            .await?;
        Ok(docs
            .iter()
            .filter_map(SoftwareSpecification::from_document)
            .collect())
    }

    async fn get_software_specification_id_by_name(
        &self,
        name: &str,
    ) -> Result<String, ConnectorError> {
        self.find_by_name(ResourceKind::SoftwareSpecification, None, name)
            .await?
            .ok_or_else(|| ConnectorError::NotFound {
                kind: ResourceKind::SoftwareSpecification,
                key: name.to_string(),
            })
    }

    async fn create_new_model(
        &self,
        name: &str,
        runtime: Runtime,
        model_type: ModelType,
        asset_path: Option<&Path>,
        custom_options: Option<&Map<String, Value>>,
    ) -> Result<String, ConnectorError> {
        let asset_error = |reason: String| ConnectorError::Asset {
            name: name.to_string(),
            reason,
        };

        let type_tag = model_type
            .type_tag(runtime)
            .map_err(|e| asset_error(e.to_string()))?;
        let spec_id = match self.get_software_specification_id_by_name(runtime.as_str()).await {
            Ok(id) => id,
            Err(ConnectorError::NotFound { .. }) => {
                return Err(asset_error(format!(
                    "software specification {} is not in the catalog",
                    runtime
                )))
            }
            Err(e) => return Err(e),
        };

        let content = match asset_path {
            Some(path) => Some((path, Self::read_asset(name, path).await?)),
            None => None,
        };

        let space_id = self.space_id().await?;
        let mut body = json!({
            "name": name,
            "type": type_tag,
            "software_spec": { "id": spec_id },
            "space_id": space_id,
        });
        if let Some(custom) = custom_options {
            body["custom"] = Value::Object(custom.clone());
        }

        // Oversized assets are referenced from object storage instead of uploaded
        let inline_content = match content {
            Some((path, data)) if data.len() as u64 > self.settings.inline_asset_limit => {
                info!(
                    "Model asset {} is {} bytes, staging it in object storage",
                    path.display(),
                    data.len()
                );
                body["content_location"] = self.stage_asset(name, path, data).await?;
                None
            }
            other => other.map(|(_, data)| data),
        };

        let created = self
            .platform
            .create(ResourceKind::Model, Some(space_id.as_str()), body)
            .await
            .map_err(|e| match e {
                ApiError::Rejected { message, .. } => asset_error(message),
                other => other.into(),
            })?;
        let model_id = created_id(ResourceKind::Model, &created)?;

        if let Some(data) = inline_content {
            debug!("Uploading {} bytes of content to model {}", data.len(), model_id);
            if let Err(e) = self
                .platform
                .upload_content(ResourceKind::Model, Some(space_id.as_str()), &model_id, data)
                .await
            {
                if let Err(cleanup) = self.delete_one(ResourceKind::Model, &model_id).await {
                    warn!("Failed to remove half-created model {}: {}", model_id, cleanup);
                }
                return Err(asset_error(format!("content upload failed: {}", e)));
            }
        }

        info!("Created model {} ({}, {})", name, model_id, type_tag);
        Ok(model_id)
    }

    async fn get_model_id_by_name(&self, name: &str) -> Result<Option<String>, ConnectorError> {
        let space_id = self.space_id().await?;
        self.find_by_name(ResourceKind::Model, Some(space_id.as_str()), name)
            .await
    }

    async fn list_models(&self) -> Result<Vec<ModelAsset>, ConnectorError> {
        self.list_in_space(ResourceKind::Model, ModelAsset::from_document)
            .await
    }

    async fn delete_model(&self, model_id: &str) -> Result<(), ConnectorError> {
        self.delete_one(ResourceKind::Model, model_id).await
    }

    async fn delete_models(&self) -> Result<usize, ConnectorError> {
        self.delete_all(ResourceKind::Model).await
    }

    async fn deploy_model(
        &self,
        name: &str,
        model_id: &str,
        size: TShirtSize,
        nodes: u32,
    ) -> Result<String, ConnectorError> {
        let deployment_error = |reason: String| ConnectorError::Deployment {
            name: name.to_string(),
            reason,
        };

        if !(1..=MAX_NODES).contains(&nodes) {
            return Err(deployment_error(format!(
                "node count {} is outside 1..={}",
                nodes, MAX_NODES
            )));
        }

        let space_id = self.space_id().await?;
        let model = self
            .read(&format!("get model {}", model_id), || {
                self.platform
                    .get(ResourceKind::Model, Some(space_id.as_str()), model_id)
            })
            .await;
        match model {
            Ok(_) => {}
            Err(ConnectorError::NotFound { .. }) => {
                return Err(deployment_error(format!("model {} does not exist", model_id)))
            }
            Err(e) => return Err(e),
        }

        let body = json!({
            "name": name,
            "space_id": space_id,
            "asset": { "id": model_id },
            "hardware_spec": { "name": size.as_str(), "num_nodes": nodes },
            "batch": {},
        });
        let created = self
            .platform
            .create(ResourceKind::Deployment, Some(space_id.as_str()), body)
            .await
            .map_err(|e| match e {
                ApiError::NotFound { .. } | ApiError::Rejected { .. } => {
                    deployment_error(e.to_string())
                }
                other => other.into(),
            })?;
        let id = created_id(ResourceKind::Deployment, &created)?;

        info!("Deployed model {} as {} ({}, {}x{})", model_id, name, id, size, nodes);
        Ok(id)
    }

    async fn get_or_make_deployment(
        &self,
        name: &str,
        is_cplex: bool,
    ) -> Result<String, ConnectorError> {
        if let Some(id) = self.get_deployment_id_by_name(name).await? {
            debug!("Reusing deployment {} ({})", name, id);
            return Ok(id);
        }

        let model_id = match self.get_model_id_by_name(name).await? {
            Some(id) => {
                debug!("Reusing model {} ({})", name, id);
                id
            }
            None => {
                let model_type = if is_cplex { ModelType::Cplex } else { ModelType::Cpo };
                self.create_new_model(name, Runtime::latest(), model_type, None, None)
                    .await?
            }
        };

        self.deploy_model(name, &model_id, TShirtSize::S, 1).await
    }

    async fn get_deployment_id_by_name(
        &self,
        name: &str,
    ) -> Result<Option<String>, ConnectorError> {
        let space_id = self.space_id().await?;
        self.find_by_name(ResourceKind::Deployment, Some(space_id.as_str()), name)
            .await
    }

    async fn list_deployments(&self) -> Result<Vec<Deployment>, ConnectorError> {
        self.list_in_space(ResourceKind::Deployment, Deployment::from_document)
            .await
    }

    async fn delete_deployment(&self, deployment_id: &str) -> Result<(), ConnectorError> {
        self.delete_one(ResourceKind::Deployment, deployment_id).await
    }

    async fn delete_deployments(&self) -> Result<usize, ConnectorError> {
        self.delete_all(ResourceKind::Deployment).await
    }

    async fn create_job(&self, request: &JobRequest) -> Result<Box<dyn Job>, ConnectorError> {
        let space_id = self.space_id().await?;
        let created = self
            .platform
            .create(ResourceKind::Job, Some(space_id.as_str()), request.to_body(&space_id))
            .await?;
        let id = created_id(ResourceKind::Job, &created)?;

        info!("Submitted job {} on deployment {}", id, request.deployment_id());
        Ok(self.job_handle(&id, &space_id))
    }

    async fn create_and_run_job(
        &self,
        request: &JobRequest,
    ) -> Result<Box<dyn Job>, ConnectorError> {
        let mut job = self.create_job(request).await?;
        if let Err(e) = job.update_status().await {
            warn!("Job {} submitted but its status could not be read: {}", job.id(), e);
        }
        Ok(job)
    }

    async fn create_job_with_references(
        &self,
        deployment_id: &str,
        inputs: Vec<DataReference>,
        outputs: Vec<DataReference>,
    ) -> Result<Box<dyn Job>, ConnectorError> {
        let request = inputs
            .into_iter()
            .fold(JobRequest::new(deployment_id), JobRequest::with_input);
        let request = outputs
            .into_iter()
            .fold(request, JobRequest::with_output_reference);

        self.create_and_run_job(&request).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Box<dyn Job>, ConnectorError> {
        let space_id = self.space_id().await?;
        let doc = self
            .read(&format!("get job {}", job_id), || {
                self.platform.get(ResourceKind::Job, Some(space_id.as_str()), job_id)
            })
            .await?;

        let job = RemoteJob::from_document(
            &doc,
            space_id.as_str(),
            self.platform.clone(),
            self.settings.retry,
        )?;
        Ok(Box::new(job))
    }

    async fn list_jobs(&self) -> Result<Vec<JobSummary>, ConnectorError> {
        self.list_in_space(ResourceKind::Job, JobSummary::from_document)
            .await
    }

    async fn delete_job(&self, job_id: &str) -> Result<(), ConnectorError> {
        self.delete_one(ResourceKind::Job, job_id).await
    }

    async fn delete_jobs(&self) -> Result<usize, ConnectorError> {
        self.delete_all(ResourceKind::Job).await
    }

    async fn get_storage(&self) -> Result<Option<SpaceStorage>, ConnectorError> {
        let space_id = self.space_id().await?;
        self.get_storage_by_space_id(&space_id).await
    }

    async fn get_storage_by_space_id(
        &self,
        space_id: &str,
    ) -> Result<Option<SpaceStorage>, ConnectorError> {
        let doc = self
            .read(&format!("get space {}", space_id), || {
                self.platform.get(ResourceKind::Space, None, space_id)
            })
            .await?;
        Ok(SpaceStorage::from_document(&doc))
    }

    async fn get_catalog_id(&self) -> Result<String, ConnectorError> {
        let space_id = self.space_id().await?;
        self.get_catalog_id_by_space_id(&space_id).await
    }

    async fn get_catalog_id_by_space_id(&self, space_id: &str) -> Result<String, ConnectorError> {
        let docs = self
            .list_kind(ResourceKind::Catalog, Some(space_id), &[])
            .await?;
        docs.first()
            .and_then(resource_id)
            .map(str::to_string)
            .ok_or_else(|| ConnectorError::NotFound {
                kind: ResourceKind::Catalog,
                key: format!("space {}", space_id),
            })
    }

    async fn clean_space(&self) -> Result<CleanupReport, ConnectorError> {
        let space_id = self.space_id().await?;
        info!("Cleaning deployment space {}", space_id);

        let mut report = CleanupReport::default();
        match self.delete_jobs().await {
            Ok(count) => report.jobs = count,
            Err(e) => warn!("Failed to clean jobs: {}", e),
        }
        match self.delete_deployments().await {
            Ok(count) => report.deployments = count,
            Err(e) => warn!("Failed to clean deployments: {}", e),
        }
        match self.delete_models().await {
            Ok(count) => report.models = count,
            Err(e) => warn!("Failed to clean models: {}", e),
        }

        Ok(report)
    }

    async fn end(&self) {
        self.tokens.end().await;
    }
}
