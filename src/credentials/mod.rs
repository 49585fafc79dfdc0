pub mod error;
pub mod keys;
#[cfg(test)]
mod tests;

pub use error::ConfigError;

use secrecy::SecretString;
use std::collections::HashMap;

/// How the working deployment space is identified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceRef {
    Id(String),
    Name(String),
}

/// Secret used by the software-hosted identity endpoint
#[derive(Debug)]
pub enum HostedSecret {
    Password(SecretString),
    ApiKey(SecretString),
}

/// HMAC credentials and location of the object-storage bucket
#[derive(Debug)]
pub struct CosCredentials {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: SecretString,
}

#[derive(Debug)]
pub struct PublicCloud {
    pub api_url: String,
    pub platform_url: String,
    pub iam_url: String,
    pub api_key: SecretString,
    pub space: SpaceRef,
    pub storage_crn: Option<String>,
    pub compute_crn: Option<String>,
    pub cos: Option<CosCredentials>,
}

#[derive(Debug)]
pub struct SoftwareHosted {
    pub url: String,
    pub username: String,
    pub secret: HostedSecret,
    pub space: SpaceRef,
    pub cos: Option<CosCredentials>,
}

/// Validated, immutable credential set.
///
/// Built once from a flat key/value map (see [`keys`]) and shared read-only
/// behind an `Arc` by every component that talks to the platform.
#[derive(Debug)]
pub enum Credentials {
    Public(PublicCloud),
    Hosted(SoftwareHosted),
}

impl Credentials {
    /// Validate a key/value map into a credential set.
    ///
    /// The mode is read from `mode` when present; otherwise a `username` key
    /// selects the software-hosted shape and anything else is public cloud.
    pub fn from_map(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let fields = Fields(values);

        let hosted = match fields.get(keys::MODE) {
            Some(mode) if mode.eq_ignore_ascii_case(keys::MODE_PUBLIC) => false,
            Some(mode) if mode.eq_ignore_ascii_case(keys::MODE_HOSTED) => true,
            Some(mode) => {
                return Err(ConfigError::InvalidValue {
                    field: keys::MODE,
                    reason: format!(
                        "expected '{}' or '{}', got '{}'",
                        keys::MODE_PUBLIC,
                        keys::MODE_HOSTED,
                        mode
                    ),
                })
            }
            None => fields.get(keys::USERNAME).is_some(),
        };

        if hosted {
            Self::hosted_from(&fields)
        } else {
            Self::public_from(&fields)
        }
    }

    fn public_from(fields: &Fields<'_>) -> Result<Self, ConfigError> {
        let mode = keys::MODE_PUBLIC;
        let iam_url = match fields.get(keys::IAM_URL) {
            Some(_) => fields.url(mode, keys::IAM_URL)?,
            None => keys::DEFAULT_IAM_URL.to_string(),
        };

        Ok(Credentials::Public(PublicCloud {
            api_url: fields.url(mode, keys::URL)?,
            platform_url: fields.url(mode, keys::PLATFORM_URL)?,
            iam_url,
            api_key: SecretString::from(fields.require(mode, keys::API_KEY)?.to_string()),
            space: fields.space(mode)?,
            storage_crn: fields.get(keys::STORAGE_CRN).map(str::to_string),
            compute_crn: fields.get(keys::COMPUTE_CRN).map(str::to_string),
            cos: fields.cos()?,
        }))
    }

    fn hosted_from(fields: &Fields<'_>) -> Result<Self, ConfigError> {
        let mode = keys::MODE_HOSTED;
        let secret = match (fields.get(keys::PASSWORD), fields.get(keys::API_KEY)) {
            (Some(password), _) => HostedSecret::Password(SecretString::from(password.to_string())),
            (None, Some(api_key)) => HostedSecret::ApiKey(SecretString::from(api_key.to_string())),
            (None, None) => {
                return Err(ConfigError::MissingField {
                    mode,
                    field: keys::PASSWORD,
                })
            }
        };

        Ok(Credentials::Hosted(SoftwareHosted {
            url: fields.url(mode, keys::URL)?,
            username: fields.require(mode, keys::USERNAME)?.to_string(),
            secret,
            space: fields.space(mode)?,
            cos: fields.cos()?,
        }))
    }

    pub fn is_hosted(&self) -> bool {
        matches!(self, Credentials::Hosted(_))
    }

    /// Base URL for models, deployments, jobs and software specifications
    pub fn api_url(&self) -> &str {
        match self {
            Credentials::Public(c) => &c.api_url,
            Credentials::Hosted(c) => &c.url,
        }
    }

    /// Base URL for spaces, connections and catalogs
    pub fn platform_url(&self) -> &str {
        match self {
            Credentials::Public(c) => &c.platform_url,
            Credentials::Hosted(c) => &c.url,
        }
    }

    pub fn space(&self) -> &SpaceRef {
        match self {
            Credentials::Public(c) => &c.space,
            Credentials::Hosted(c) => &c.space,
        }
    }

    pub fn cos(&self) -> Option<&CosCredentials> {
        match self {
            Credentials::Public(c) => c.cos.as_ref(),
            Credentials::Hosted(c) => c.cos.as_ref(),
        }
    }
}

struct Fields<'a>(&'a HashMap<String, String>);

impl Fields<'_> {
    /// Trimmed value for `key`; blank values count as absent
    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, mode: &'static str, field: &'static str) -> Result<&str, ConfigError> {
        self.get(field)
            .ok_or(ConfigError::MissingField { mode, field })
    }

    fn url(&self, mode: &'static str, field: &'static str) -> Result<String, ConfigError> {
        let value = self.require(mode, field)?;
        if !(value.starts_with("https://") || value.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                field,
                reason: format!("'{}' is not an http(s) URL", value),
            });
        }
        Ok(value.trim_end_matches('/').to_string())
    }

    fn space(&self, mode: &'static str) -> Result<SpaceRef, ConfigError> {
        match (self.get(keys::SPACE_ID), self.get(keys::SPACE_NAME)) {
            (Some(id), _) => Ok(SpaceRef::Id(id.to_string())),
            (None, Some(name)) => Ok(SpaceRef::Name(name.to_string())),
            (None, None) => Err(ConfigError::MissingField {
                mode,
                field: keys::SPACE_ID,
            }),
        }
    }

    fn cos(&self) -> Result<Option<CosCredentials>, ConfigError> {
        let group = [
            keys::COS_BUCKET,
            keys::COS_ENDPOINT,
            keys::COS_ACCESS_KEY_ID,
            keys::COS_SECRET_ACCESS_KEY,
        ];
        if group.iter().all(|key| self.get(key).is_none()) {
            return Ok(None);
        }
        if let Some(missing) = group.iter().find(|key| self.get(key).is_none()) {
            return Err(ConfigError::IncompleteStorage(*missing));
        }

        let endpoint = self.url(keys::MODE_PUBLIC, keys::COS_ENDPOINT)?;
        Ok(Some(CosCredentials {
            bucket: self.get(keys::COS_BUCKET).unwrap_or_default().to_string(),
            endpoint,
            region: self
                .get(keys::COS_REGION)
                .unwrap_or(keys::DEFAULT_COS_REGION)
                .to_string(),
            access_key_id: self
                .get(keys::COS_ACCESS_KEY_ID)
                .unwrap_or_default()
                .to_string(),
            secret_access_key: SecretString::from(
                self.get(keys::COS_SECRET_ACCESS_KEY)
                    .unwrap_or_default()
                    .to_string(),
            ),
        }))
    }
}
