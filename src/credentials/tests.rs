use crate::credentials::{keys, ConfigError, Credentials, HostedSecret, SpaceRef};
use secrecy::ExposeSecret;
use std::collections::HashMap;

fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn public_fields() -> Vec<(&'static str, &'static str)> {
    vec![
        (keys::URL, "https://us-south.ml.cloud.example.com/"),
        (keys::PLATFORM_URL, "https://api.dataplatform.example.com"),
        (keys::API_KEY, "secret-key"),
        (keys::SPACE_NAME, "proj"),
    ]
}

#[test]
fn public_credentials_are_detected_without_mode() {
    let credentials = Credentials::from_map(&map(&public_fields())).unwrap();

    match &credentials {
        Credentials::Public(c) => {
            assert_eq!(c.api_url, "https://us-south.ml.cloud.example.com");
            assert_eq!(c.iam_url, keys::DEFAULT_IAM_URL);
            assert_eq!(c.api_key.expose_secret(), "secret-key");
            assert!(c.cos.is_none());
        }
        other => panic!("expected public credentials, got {:?}", other),
    }
    assert_eq!(credentials.space(), &SpaceRef::Name("proj".to_string()));
    assert!(!credentials.is_hosted());
}

#[test]
fn username_selects_hosted_mode() {
    let credentials = Credentials::from_map(&map(&[
        (keys::URL, "https://cpd.example.com"),
        (keys::USERNAME, "admin"),
        (keys::API_KEY, "hosted-key"),
        (keys::SPACE_ID, "space-1"),
    ]))
    .unwrap();

    match &credentials {
        Credentials::Hosted(c) => {
            assert_eq!(c.username, "admin");
            assert!(matches!(&c.secret, HostedSecret::ApiKey(k) if k.expose_secret() == "hosted-key"));
        }
        other => panic!("expected hosted credentials, got {:?}", other),
    }
    assert_eq!(credentials.api_url(), credentials.platform_url());
    assert_eq!(credentials.space(), &SpaceRef::Id("space-1".to_string()));
}

#[test]
fn missing_required_field_is_reported_with_mode() {
    let mut fields = public_fields();
    fields.retain(|(k, _)| *k != keys::PLATFORM_URL);

    let result = Credentials::from_map(&map(&fields));
    assert_eq!(
        result.unwrap_err(),
        ConfigError::MissingField {
            mode: keys::MODE_PUBLIC,
            field: keys::PLATFORM_URL
        }
    );
}

#[test]
fn hosted_mode_requires_a_secret() {
    let result = Credentials::from_map(&map(&[
        (keys::MODE, "hosted"),
        (keys::URL, "https://cpd.example.com"),
        (keys::USERNAME, "admin"),
        (keys::SPACE_NAME, "proj"),
    ]));

    assert_eq!(
        result.unwrap_err(),
        ConfigError::MissingField {
            mode: keys::MODE_HOSTED,
            field: keys::PASSWORD
        }
    );
}

#[test]
fn blank_values_count_as_missing() {
    let mut fields = public_fields();
    fields.push((keys::SPACE_ID, "   "));
    fields.retain(|(k, _)| *k != keys::SPACE_NAME);

    let result = Credentials::from_map(&map(&fields));
    assert!(matches!(
        result,
        Err(ConfigError::MissingField { field: keys::SPACE_ID, .. })
    ));
}

#[test]
fn unknown_mode_and_bad_urls_are_rejected() {
    let mut fields = public_fields();
    fields.push((keys::MODE, "desktop"));
    assert!(matches!(
        Credentials::from_map(&map(&fields)),
        Err(ConfigError::InvalidValue { field: keys::MODE, .. })
    ));

    let mut fields = public_fields();
    fields.retain(|(k, _)| *k != keys::URL);
    fields.push((keys::URL, "ftp://nowhere"));
    assert!(matches!(
        Credentials::from_map(&map(&fields)),
        Err(ConfigError::InvalidValue { field: keys::URL, .. })
    ));
}

#[test]
fn partial_storage_settings_are_rejected() {
    let mut fields = public_fields();
    fields.push((keys::COS_BUCKET, "bucket"));
    fields.push((keys::COS_ENDPOINT, "https://s3.example.com"));

    assert_eq!(
        Credentials::from_map(&map(&fields)).unwrap_err(),
        ConfigError::IncompleteStorage(keys::COS_ACCESS_KEY_ID)
    );
}

#[test]
fn complete_storage_settings_are_parsed() {
    let mut fields = public_fields();
    fields.push((keys::COS_BUCKET, "models"));
    fields.push((keys::COS_ENDPOINT, "https://s3.example.com/"));
    fields.push((keys::COS_ACCESS_KEY_ID, "access"));
    fields.push((keys::COS_SECRET_ACCESS_KEY, "hmac-secret"));

    let credentials = Credentials::from_map(&map(&fields)).unwrap();
    let cos = credentials.cos().expect("storage settings");
    assert_eq!(cos.bucket, "models");
    assert_eq!(cos.endpoint, "https://s3.example.com");
    assert_eq!(cos.region, keys::DEFAULT_COS_REGION);
    assert_eq!(cos.secret_access_key.expose_secret(), "hmac-secret");
}
