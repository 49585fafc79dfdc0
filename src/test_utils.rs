use crate::auth::{CachedTokenHandler, FakeIdentity, TokenHandler};
use crate::config::{load_config, Config};
use crate::connector::{CloudConnector, ConnectorSettings, Runtime};
use crate::credentials::{keys, Credentials};
use crate::platform::{build_http_client, FakePlatform, HttpPlatform, Platform};
use crate::retry::RetryPolicy;
use crate::storage::FakeObjectStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const FAKE_BUCKET: &str = "fake-bucket";
pub const FAKE_SPACE_NAME: &str = "test-space";

/// Check if a test is enabled via environment variable
fn is_test_enabled(env_var: &str) -> bool {
    std::env::var(env_var)
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false)
}

/// Check if tests against the real platform are enabled via environment variable
pub fn is_platform_enabled() -> bool {
    is_test_enabled("ENABLE_PLATFORM_TESTS")
}

/// Check if tests against the real object storage are enabled via environment variable
pub fn is_cos_enabled() -> bool {
    is_test_enabled("ENABLE_COS_TESTS")
}

/// Load test configuration from config.toml
pub fn load_test_config() -> Result<Config, anyhow::Error> {
    load_config("config.toml").map_err(|e| anyhow::anyhow!("Failed to load config.toml: {}", e))
}

pub fn load_test_credentials() -> Result<Credentials, anyhow::Error> {
    Ok(load_test_config()?.credentials()?)
}

/// Real platform client built from config.toml
pub async fn connect_test_platform() -> Result<Arc<dyn Platform>, anyhow::Error> {
    let config = load_test_config()?;
    let credentials = config.credentials()?;
    let settings = config.connector_settings();

    let client = build_http_client()?;
    let tokens: Arc<dyn TokenHandler> = Arc::new(CachedTokenHandler::new(
        crate::auth::identity_for(&credentials, client.clone()),
        settings.retry,
        settings.token_refresh_margin,
    ));
    Ok(Arc::new(HttpPlatform::new(client, tokens, &credentials)))
}

/// Real connector built from config.toml
pub async fn connect_test_connector() -> Result<CloudConnector, anyhow::Error> {
    let config = load_test_config()?;
    let credentials = Arc::new(config.credentials()?);
    Ok(CloudConnector::connect(credentials, config.connector_settings()).await?)
}

/// Public-cloud credential map naming a space and an object-storage bucket
pub fn fake_credentials_map() -> HashMap<String, String> {
    [
        (keys::MODE, keys::MODE_PUBLIC),
        (keys::URL, "https://ml.example.com"),
        (keys::PLATFORM_URL, "https://platform.example.com"),
        (keys::API_KEY, "fake-api-key"),
        (keys::SPACE_NAME, FAKE_SPACE_NAME),
        (keys::STORAGE_CRN, "crn:v1:fake:cloud-object-storage"),
        (keys::COS_BUCKET, FAKE_BUCKET),
        (keys::COS_ENDPOINT, "https://s3.fake.example.com"),
        (keys::COS_ACCESS_KEY_ID, "fake-access-key"),
        (keys::COS_SECRET_ACCESS_KEY, "fake-secret-key"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn fake_credentials() -> Credentials {
    Credentials::from_map(&fake_credentials_map()).expect("fake credentials are valid")
}

pub fn test_settings(inline_asset_limit: u64) -> ConnectorSettings {
    ConnectorSettings {
        retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2)),
        inline_asset_limit,
        token_refresh_margin: Duration::ZERO,
    }
}

/// Fake platform whose catalog holds a software specification for every runtime
pub fn fake_platform() -> FakePlatform {
    let platform = FakePlatform::new();
    for runtime in Runtime::ALL {
        platform.fake_add_software_specification(runtime.as_str());
    }
    platform
}

/// In-memory backends a fake connector runs on
pub struct FakeBackends {
    pub platform: FakePlatform,
    pub store: FakeObjectStore,
    pub identity: FakeIdentity,
}

impl FakeBackends {
    pub fn new() -> Self {
        Self {
            platform: fake_platform(),
            store: FakeObjectStore::new(FAKE_BUCKET),
            identity: FakeIdentity::new(),
        }
    }

    /// Connector over these backends for the given credential map
    pub fn connector_with(
        &self,
        credentials: HashMap<String, String>,
        settings: ConnectorSettings,
    ) -> CloudConnector {
        let credentials = Credentials::from_map(&credentials).expect("valid test credentials");
        let tokens = Arc::new(CachedTokenHandler::new(
            Arc::new(self.identity.clone()),
            settings.retry,
            settings.token_refresh_margin,
        ));
        CloudConnector::with_platform(
            Arc::new(credentials),
            settings,
            tokens,
            Arc::new(self.platform.clone()),
        )
        .with_object_store(Arc::new(self.store.clone()))
    }

    pub fn connector(&self) -> CloudConnector {
        self.connector_with(fake_credentials_map(), test_settings(1024))
    }
}
