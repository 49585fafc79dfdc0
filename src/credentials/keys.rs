//! Key names accepted in the `[credentials]` table of the configuration file.

/// Explicit deployment mode: `public` or `hosted`
pub const MODE: &str = "mode";

/// Base URL of the machine-learning API (public cloud) or of the whole cluster (hosted)
pub const URL: &str = "url";
/// Base URL of the data-platform API that owns spaces and connections (public cloud)
pub const PLATFORM_URL: &str = "platform_url";
/// Identity endpoint host (public cloud)
pub const IAM_URL: &str = "iam_url";
pub const API_KEY: &str = "apikey";

pub const USERNAME: &str = "username";
pub const PASSWORD: &str = "password";

pub const SPACE_ID: &str = "space_id";
pub const SPACE_NAME: &str = "space_name";

/// CRN of the object-storage instance attached to newly created spaces (public cloud)
pub const STORAGE_CRN: &str = "storage_crn";
/// CRN of the compute instance attached to newly created spaces (public cloud)
pub const COMPUTE_CRN: &str = "compute_crn";

pub const COS_BUCKET: &str = "cos_bucket";
pub const COS_ENDPOINT: &str = "cos_endpoint";
pub const COS_REGION: &str = "cos_region";
pub const COS_ACCESS_KEY_ID: &str = "cos_access_key_id";
pub const COS_SECRET_ACCESS_KEY: &str = "cos_secret_access_key";

pub const MODE_PUBLIC: &str = "public";
pub const MODE_HOSTED: &str = "hosted";

pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com";
pub const DEFAULT_COS_REGION: &str = "us-east-1";
