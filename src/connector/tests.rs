use crate::auth::{AuthError, CachedTokenHandler, FakeIdentity, TokenHandler};
use crate::connector::{
    CloudConnector, CleanupReport, Connector, ConnectorError, ModelType, Runtime, TShirtSize,
};
use crate::credentials::{keys, ConfigError, Credentials};
use crate::job::{DataReference, JobRequest, JobState};
use crate::platform::{ApiError, FakePlatform, ResourceKind};
use crate::storage::FakeObjectStore;
use crate::test_utils::{
    fake_credentials_map, test_settings, FakeBackends, FAKE_BUCKET, FAKE_SPACE_NAME,
};
use serde_json::{json, Map};
use std::io::Write;
use std::sync::Arc;

fn model_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

#[tokio::test]
async fn space_by_name_is_created_once_then_reused() {
    let backends = FakeBackends::new();
    let connector = backends.connector();

    let first = connector.space_id().await.unwrap();
    let second = connector.space_id().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(backends.platform.calls(ResourceKind::Space, "create"), 1);
    assert_eq!(backends.platform.calls(ResourceKind::Space, "list"), 1);

    // A new session finds the space by name
    let other = backends.connector();
    assert_eq!(other.space_id().await.unwrap(), first);
    assert_eq!(backends.platform.count(ResourceKind::Space, None), 1);
}

#[tokio::test]
async fn space_by_id_is_used_without_lookup() {
    let backends = FakeBackends::new();
    let mut credentials = fake_credentials_map();
    credentials.insert(keys::SPACE_ID.to_string(), "space-given".to_string());
    let connector = backends.connector_with(credentials, test_settings(1024));

    assert_eq!(connector.space_id().await.unwrap(), "space-given");
    assert_eq!(backends.platform.calls(ResourceKind::Space, "list"), 0);
    assert_eq!(backends.platform.calls(ResourceKind::Space, "create"), 0);
}

#[tokio::test]
async fn duplicate_space_names_resolve_to_the_oldest() {
    let backends = FakeBackends::new();
    let oldest = backends
        .platform
        .fake_add(ResourceKind::Space, None, FAKE_SPACE_NAME, json!({}));
    backends
        .platform
        .fake_add(ResourceKind::Space, None, FAKE_SPACE_NAME, json!({}));

    let connector = backends.connector();

    assert_eq!(connector.space_id().await.unwrap(), oldest);
    assert_eq!(backends.platform.calls(ResourceKind::Space, "create"), 0);
}

#[tokio::test]
async fn second_space_with_the_same_name_does_not_disturb_the_session() {
    let backends = FakeBackends::new();
    let connector = backends.connector();
    let space_id = connector.space_id().await.unwrap();
    let first = connector.get_or_make_deployment("diet", true).await.unwrap();

    let duplicate = connector.create_deployment_space(FAKE_SPACE_NAME).await.unwrap();

    assert_ne!(duplicate, space_id);
    assert_eq!(
        connector.get_deployment_space_id_by_name(FAKE_SPACE_NAME).await.unwrap(),
        Some(space_id.clone())
    );
    assert_eq!(connector.get_or_make_deployment("diet", true).await.unwrap(), first);
    assert_eq!(connector.list_deployment_spaces().await.unwrap().len(), 2);
}

#[tokio::test]
async fn created_space_carries_storage_and_compute() {
    let backends = FakeBackends::new();
    let mut credentials = fake_credentials_map();
    credentials.insert(keys::COMPUTE_CRN.to_string(), "crn:v1:fake:ml".to_string());
    let connector = backends.connector_with(credentials, test_settings(1024));

    let space_id = connector.space_id().await.unwrap();
    let doc = backends.platform.document(ResourceKind::Space, &space_id).unwrap();

    assert_eq!(
        doc.pointer("/entity/compute/0/crn"),
        Some(&json!("crn:v1:fake:ml"))
    );
    let storage = connector.get_storage().await.unwrap().unwrap();
    assert_eq!(storage.kind, "bmcos_object_storage");
    assert_eq!(
        storage.resource_crn.as_deref(),
        Some("crn:v1:fake:cloud-object-storage")
    );
    assert!(storage.bucket.is_some());
}

#[tokio::test]
async fn hosted_space_has_no_storage() {
    let backends = FakeBackends::new();
    let credentials = [
        (keys::MODE, keys::MODE_HOSTED),
        (keys::URL, "https://cpd.example.com"),
        (keys::USERNAME, "admin"),
        (keys::PASSWORD, "secret"),
        (keys::SPACE_NAME, "hosted-space"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let connector = backends.connector_with(credentials, test_settings(1024));

    assert!(connector.get_storage().await.unwrap().is_none());
}

#[tokio::test]
async fn storage_of_unknown_space_is_not_found() {
    let backends = FakeBackends::new();
    let connector = backends.connector();

    let result = connector.get_storage_by_space_id("space-404").await;

    assert!(result.unwrap_err().is_not_found());
}

#[tokio::test]
async fn catalog_is_looked_up_per_space() {
    let backends = FakeBackends::new();
    let connector = backends.connector();

    let catalog = connector.get_catalog_id().await.unwrap();
    assert!(catalog.starts_with("catalog-"));

    let missing = connector.get_catalog_id_by_space_id("space-404").await;
    assert!(matches!(
        missing,
        Err(ConnectorError::NotFound {
            kind: ResourceKind::Catalog,
            ..
        })
    ));
}

#[tokio::test]
async fn software_specifications_are_resolved_by_name() {
    let backends = FakeBackends::new();
    let connector = backends.connector();

    let specs = connector.list_software_specifications().await.unwrap();
    assert_eq!(specs.len(), Runtime::ALL.len());

    let id = connector
        .get_software_specification_id_by_name("do_22.1")
        .await
        .unwrap();
    assert!(specs.iter().any(|s| s.id == id && s.name == "do_22.1"));

    let missing = connector.get_software_specification_id_by_name("do_9.9").await;
    assert!(missing.unwrap_err().is_not_found());
}

#[tokio::test]
async fn get_or_make_deployment_is_idempotent() {
    let backends = FakeBackends::new();
    let connector = backends.connector();

    let first = connector.get_or_make_deployment("diet", false).await.unwrap();
    let second = connector.get_or_make_deployment("diet", false).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(backends.platform.calls(ResourceKind::Model, "create"), 1);
    assert_eq!(backends.platform.calls(ResourceKind::Deployment, "create"), 1);

    let models = connector.list_models().await.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].type_tag.as_deref(), Some("do-cpo_22.1"));

    let deployments = connector.list_deployments().await.unwrap();
    assert_eq!(deployments[0].model_id.as_deref(), Some(models[0].id.as_str()));
    assert_eq!(deployments[0].size.as_deref(), Some("S"));
    assert_eq!(deployments[0].nodes, Some(1));
}

#[tokio::test]
async fn get_or_make_deployment_reuses_an_existing_model() {
    let backends = FakeBackends::new();
    let connector = backends.connector();
    let model_id = connector
        .create_new_model("diet", Runtime::Do20_1, ModelType::Cplex, None, None)
        .await
        .unwrap();

    let deployment_id = connector.get_or_make_deployment("diet", true).await.unwrap();

    assert_eq!(backends.platform.calls(ResourceKind::Model, "create"), 1);
    let doc = backends
        .platform
        .document(ResourceKind::Deployment, &deployment_id)
        .unwrap();
    assert_eq!(doc.pointer("/entity/asset/id"), Some(&json!(model_id)));
}

#[tokio::test]
async fn name_lookups_return_none_when_absent() {
    let backends = FakeBackends::new();
    let connector = backends.connector();

    assert_eq!(connector.get_model_id_by_name("nothing").await.unwrap(), None);
    assert_eq!(connector.get_deployment_id_by_name("nothing").await.unwrap(), None);
    assert_eq!(
        connector.get_deployment_space_id_by_name("nothing").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn unsupported_model_type_is_rejected_before_any_call() {
    let backends = FakeBackends::new();
    let connector = backends.connector();

    let result = connector
        .create_new_model("py", Runtime::Do12_10, ModelType::Docplex, None, None)
        .await;

    assert!(matches!(result, Err(ConnectorError::Asset { .. })));
    assert_eq!(backends.platform.calls(ResourceKind::Model, "create"), 0);
}

#[tokio::test]
async fn missing_software_specification_is_an_asset_error() {
    let backends = FakeBackends {
        platform: FakePlatform::new(),
        ..FakeBackends::new()
    };
    let connector = backends.connector();

    let result = connector
        .create_new_model("diet", Runtime::Do22_1, ModelType::Cplex, None, None)
        .await;

    assert!(matches!(result, Err(ConnectorError::Asset { .. })));
    assert_eq!(backends.platform.count(ResourceKind::Model, None), 0);
}

#[tokio::test]
async fn unreadable_asset_creates_no_model() {
    let backends = FakeBackends::new();
    let connector = backends.connector();
    let dir = tempfile::tempdir().unwrap();

    let result = connector
        .create_new_model(
            "diet",
            Runtime::Do22_1,
            ModelType::Opl,
            Some(dir.path().join("missing.zip").as_path()),
            None,
        )
        .await;

    assert!(matches!(result, Err(ConnectorError::Asset { .. })));
    assert_eq!(backends.platform.calls(ResourceKind::Model, "create"), 0);
}

#[tokio::test]
async fn small_asset_is_uploaded_as_model_content() {
    let backends = FakeBackends::new();
    let connector = backends.connector();
    let file = model_file("minimize x; subject to { x >= 1; }");
    let mut custom = Map::new();
    custom.insert("owner".to_string(), json!("planning"));

    let model_id = connector
        .create_new_model(
            "diet",
            Runtime::Do22_1,
            ModelType::Opl,
            Some(file.path()),
            Some(&custom),
        )
        .await
        .unwrap();

    assert_eq!(
        backends.platform.content(&model_id).as_deref(),
        Some("minimize x; subject to { x >= 1; }".as_bytes())
    );
    let doc = backends.platform.document(ResourceKind::Model, &model_id).unwrap();
    assert_eq!(doc.pointer("/entity/custom/owner"), Some(&json!("planning")));
    assert_eq!(doc.pointer("/entity/type"), Some(&json!("do-opl_22.1")));
    assert!(doc.pointer("/entity/content_location").is_none());
    assert_eq!(backends.store.object_count().await, 0);
}

#[tokio::test]
async fn large_asset_is_staged_in_object_storage() {
    let backends = FakeBackends::new();
    let connector = backends.connector_with(fake_credentials_map(), test_settings(8));
    let file = model_file("ROWS\n N obj\n L c1\nENDATA\n");

    let model_id = connector
        .create_new_model("big", Runtime::Do22_1, ModelType::Cplex, Some(file.path()), None)
        .await
        .unwrap();

    assert!(backends.platform.content(&model_id).is_none());
    assert_eq!(backends.store.object_count().await, 1);

    let doc = backends.platform.document(ResourceKind::Model, &model_id).unwrap();
    let location = doc.pointer("/entity/content_location").unwrap();
    assert_eq!(location["type"], json!("connection_asset"));
    assert_eq!(location["location"]["bucket"], json!(FAKE_BUCKET));
    let key = location["location"]["file_name"].as_str().unwrap();
    assert!(key.starts_with("models/big/"), "unexpected key {}", key);

    let cos = connector.cos_connector().await.unwrap();
    let connection = cos.get_connection().await.unwrap();
    assert_eq!(location["connection"]["id"], json!(connection.id));
    assert_eq!(cos.get_file(key).await.unwrap(), "ROWS\n N obj\n L c1\nENDATA\n");
}

#[tokio::test]
async fn deploy_model_validates_nodes_and_model() {
    let backends = FakeBackends::new();
    let connector = backends.connector();
    let model_id = connector
        .create_new_model("diet", Runtime::Do22_1, ModelType::Cplex, None, None)
        .await
        .unwrap();

    for nodes in [0, 11] {
        let result = connector.deploy_model("diet", &model_id, TShirtSize::S, nodes).await;
        assert!(matches!(result, Err(ConnectorError::Deployment { .. })), "nodes = {}", nodes);
    }
    let missing = connector.deploy_model("diet", "model-404", TShirtSize::S, 1).await;
    assert!(matches!(missing, Err(ConnectorError::Deployment { .. })));
    assert_eq!(backends.platform.calls(ResourceKind::Deployment, "create"), 0);

    let id = connector
        .deploy_model("diet", &model_id, TShirtSize::XL, 10)
        .await
        .unwrap();
    let deployments = connector.list_deployments().await.unwrap();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].id, id);
    assert_eq!(deployments[0].size.as_deref(), Some("XL"));
    assert_eq!(deployments[0].nodes, Some(10));
}

#[tokio::test]
async fn deploy_model_keeps_transport_failures_retryable() {
    let backends = FakeBackends::new();
    let connector = backends.connector();
    let model_id = connector
        .create_new_model("diet", Runtime::Do22_1, ModelType::Cplex, None, None)
        .await
        .unwrap();
    backends.platform.fake_fail_transiently(ResourceKind::Model, 5);

    let err = connector
        .deploy_model("diet", &model_id, TShirtSize::S, 1)
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectorError::Transport { .. }), "{:?}", err);
    assert!(err.is_retryable());
    assert!(!err.is_fatal());
    assert_eq!(backends.platform.calls(ResourceKind::Deployment, "create"), 0);
}

#[tokio::test]
async fn create_job_does_not_fetch_status() {
    let backends = FakeBackends::new();
    let connector = backends.connector();
    let deployment_id = connector.get_or_make_deployment("diet", true).await.unwrap();
    let request = JobRequest::new(&deployment_id)
        .with_name("diet-run")
        .with_input(DataReference::inline_text("diet.lp", "minimize x\nend\n"));

    let job = connector.create_job(&request).await.unwrap();

    assert_eq!(job.state(), JobState::Created);
    assert_eq!(backends.platform.calls(ResourceKind::Job, "get"), 0);

    let doc = backends.platform.document(ResourceKind::Job, job.id()).unwrap();
    assert_eq!(
        doc.pointer("/entity/decision_optimization/input_data/0/id"),
        Some(&json!("diet.lp"))
    );
    assert_eq!(
        doc.pointer("/entity/decision_optimization/output_data"),
        Some(&json!([{ "id": ".*" }]))
    );
}

#[tokio::test]
async fn create_and_run_job_fetches_status_once() {
    let backends = FakeBackends::new();
    let connector = backends.connector();
    let deployment_id = connector.get_or_make_deployment("diet", true).await.unwrap();

    let job = connector
        .create_and_run_job(&JobRequest::new(&deployment_id))
        .await
        .unwrap();

    assert_eq!(job.state(), JobState::Created);
    assert_eq!(backends.platform.calls(ResourceKind::Job, "get"), 1);
}

#[tokio::test]
async fn create_and_run_job_returns_handle_when_status_fetch_fails() {
    let backends = FakeBackends::new();
    let connector = backends.connector();
    let deployment_id = connector.get_or_make_deployment("diet", true).await.unwrap();
    backends.platform.fake_fail_transiently(ResourceKind::Job, 10);

    let job = connector
        .create_and_run_job(&JobRequest::new(&deployment_id))
        .await
        .unwrap();

    assert_eq!(job.state(), JobState::Created);
    assert_eq!(backends.platform.calls(ResourceKind::Job, "create"), 1);
    assert_eq!(backends.platform.count(ResourceKind::Job, None), 1);
}

#[tokio::test]
async fn job_on_unknown_deployment_is_rejected() {
    let backends = FakeBackends::new();
    let connector = backends.connector();

    let result = connector.create_job(&JobRequest::new("deployment-404")).await;

    assert!(matches!(
        result,
        Err(ConnectorError::Remote {
            kind: ResourceKind::Job,
            status: 400,
            ..
        })
    ));
}

#[tokio::test]
async fn create_job_with_references_puts_them_in_the_body() {
    let backends = FakeBackends::new();
    let connector = backends.connector();
    let deployment_id = connector.get_or_make_deployment("diet", true).await.unwrap();
    let reference = |id: &str| DataReference::External {
        id: id.to_string(),
        connection_id: "connection-1".to_string(),
        bucket: FAKE_BUCKET.to_string(),
        key: format!("jobs/{}", id),
    };

    let job = connector
        .create_job_with_references(
            &deployment_id,
            vec![reference("diet.lp")],
            vec![reference("solution.json")],
        )
        .await
        .unwrap();

    let doc = backends.platform.document(ResourceKind::Job, job.id()).unwrap();
    let decision = &doc["entity"]["decision_optimization"];
    assert_eq!(
        decision["input_data_references"][0]["location"]["file_name"],
        json!("jobs/diet.lp")
    );
    assert_eq!(
        decision["output_data_references"][0]["connection"]["id"],
        json!("connection-1")
    );
    assert_eq!(decision["input_data"], json!([]));
    assert_eq!(decision["output_data"], json!([]));
    assert_eq!(backends.platform.calls(ResourceKind::Job, "get"), 1);
}

#[tokio::test]
async fn get_job_reads_current_state() {
    let backends = FakeBackends::new();
    let connector = backends.connector();
    let deployment_id = connector.get_or_make_deployment("diet", true).await.unwrap();
    let job = connector.create_job(&JobRequest::new(&deployment_id)).await.unwrap();
    backends
        .platform
        .fake_push_job_update(job.id(), json!({ "status": { "state": "running" } }));

    let fetched = connector.get_job(job.id()).await.unwrap();

    assert_eq!(fetched.id(), job.id());
    assert_eq!(fetched.state(), JobState::Running);

    let jobs = connector.list_jobs().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].deployment_id.as_deref(), Some(deployment_id.as_str()));
    assert_eq!(jobs[0].state.as_deref(), Some("running"));
}

#[tokio::test]
async fn get_job_of_unknown_id_is_not_found() {
    let backends = FakeBackends::new();
    let connector = backends.connector();

    let result = connector.get_job("job-404").await;

    assert!(matches!(
        result,
        Err(ConnectorError::NotFound {
            kind: ResourceKind::Job,
            ..
        })
    ));
}

#[tokio::test]
async fn deleting_absent_resources_succeeds() {
    let backends = FakeBackends::new();
    let connector = backends.connector();

    connector.delete_model("model-404").await.unwrap();
    connector.delete_deployment("deployment-404").await.unwrap();
    connector.delete_job("job-404").await.unwrap();
    assert!(backends.platform.deleted().is_empty());
}

#[tokio::test]
async fn bulk_delete_skips_failures() {
    let backends = FakeBackends::new();
    let connector = backends.connector();
    let space_id = connector.space_id().await.unwrap();
    let ids: Vec<String> = (0..3)
        .map(|i| {
            backends.platform.fake_add(
                ResourceKind::Model,
                Some(space_id.as_str()),
                &format!("model-{}", i),
                json!({}),
            )
        })
        .collect();
    backends.platform.fake_fail_delete(&ids[1]);

    let deleted = connector.delete_models().await.unwrap();

    assert_eq!(deleted, 2);
    assert_eq!(backends.platform.count(ResourceKind::Model, Some(space_id.as_str())), 1);
    assert!(backends.platform.document(ResourceKind::Model, &ids[1]).is_some());
}

#[tokio::test]
async fn clean_space_deletes_jobs_then_deployments_then_models() {
    let backends = FakeBackends::new();
    let connector = backends.connector();
    let deployment_id = connector.get_or_make_deployment("diet", true).await.unwrap();
    connector.create_job(&JobRequest::new(&deployment_id)).await.unwrap();
    connector.create_job(&JobRequest::new(&deployment_id)).await.unwrap();

    let report = connector.clean_space().await.unwrap();

    assert_eq!(
        report,
        CleanupReport {
            jobs: 2,
            deployments: 1,
            models: 1,
        }
    );
    let kinds: Vec<ResourceKind> = backends.platform.deleted().into_iter().map(|(k, _)| k).collect();
    assert_eq!(
        kinds,
        vec![
            ResourceKind::Job,
            ResourceKind::Job,
            ResourceKind::Deployment,
            ResourceKind::Model
        ]
    );
    assert!(connector.list_models().await.unwrap().is_empty());
}

#[tokio::test]
async fn clean_space_continues_past_a_failed_phase() {
    let backends = FakeBackends::new();
    let connector = backends.connector();
    connector.get_or_make_deployment("diet", true).await.unwrap();
    backends.platform.fake_fail_transiently(ResourceKind::Job, 10);

    let report = connector.clean_space().await.unwrap();

    assert_eq!(report.jobs, 0);
    assert_eq!(report.deployments, 1);
    assert_eq!(report.models, 1);
}

#[tokio::test]
async fn transient_list_failures_are_retried() {
    let backends = FakeBackends::new();
    let connector = backends.connector();
    connector.space_id().await.unwrap();
    backends.platform.fake_fail_transiently(ResourceKind::Model, 2);

    let models = connector.list_models().await.unwrap();

    assert!(models.is_empty());
    assert_eq!(backends.platform.calls(ResourceKind::Model, "list"), 3);

    backends.platform.fake_fail_transiently(ResourceKind::Deployment, 10);
    let exhausted = connector.list_deployments().await.unwrap_err();
    assert!(exhausted.is_retryable());
    assert_eq!(backends.platform.calls(ResourceKind::Deployment, "list"), 3);
}

#[tokio::test]
async fn end_drops_the_cached_token() {
    let identity = FakeIdentity::new();
    let settings = test_settings(1024);
    let tokens = Arc::new(CachedTokenHandler::new(
        Arc::new(identity.clone()),
        settings.retry,
        settings.token_refresh_margin,
    ));
    let credentials = Credentials::from_map(&fake_credentials_map()).unwrap();
    let connector = CloudConnector::with_platform(
        Arc::new(credentials),
        settings,
        tokens.clone(),
        Arc::new(FakePlatform::new()),
    )
    .with_object_store(Arc::new(FakeObjectStore::new(FAKE_BUCKET)));

    tokens.init_token().await.unwrap();
    tokens.bearer_token().await.unwrap();
    assert_eq!(identity.calls(), 1);

    connector.end().await;

    tokens.bearer_token().await.unwrap();
    assert_eq!(identity.calls(), 2);
}

#[test]
fn errors_are_classified() {
    let forbidden: ConnectorError = ApiError::Unauthorized {
        kind: ResourceKind::Space,
        message: "no access".to_string(),
    }
    .into();
    assert!(matches!(
        forbidden,
        ConnectorError::Remote { status: 403, .. }
    ));
    assert!(!forbidden.is_retryable());
    assert!(!forbidden.is_fatal());

    let transport: ConnectorError = ApiError::Transport {
        kind: ResourceKind::Job,
        reason: "connection reset".to_string(),
    }
    .into();
    assert!(transport.is_retryable());

    let config: ConnectorError = ConfigError::MissingField {
        mode: keys::MODE_PUBLIC,
        field: keys::API_KEY,
    }
    .into();
    assert!(config.is_fatal());

    let auth: ConnectorError = AuthError::Rejected {
        endpoint: "https://iam.example.com".to_string(),
        status: 400,
        message: "invalid key".to_string(),
    }
    .into();
    assert!(auth.is_fatal());
    assert!(!auth.is_not_found());
}
