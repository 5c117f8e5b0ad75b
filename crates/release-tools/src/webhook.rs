//! Secret tokens for GitLab webhooks.
//!
//! The service verifies incoming GitLab webhooks by decoding the token with
//! the `gitlab_token_secret` from its configuration, so the token is an
//! HS256 JWT over the namespace and, for a single project, its name.

use std::fs;
use std::path::Path;

use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::{ReleaseError, Result};

pub const SECRET_KEY: &str = "gitlab_token_secret";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookClaims {
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
}

/// Read the signing secret from a service configuration file.
pub fn read_token_secret(service_config: &Path) -> Result<String> {
    let raw = fs::read_to_string(service_config).map_err(|e| ReleaseError::io(service_config, e))?;
    token_secret_from_str(&raw)
}

pub fn token_secret_from_str(raw: &str) -> Result<String> {
    let config: serde_yaml::Value = serde_yaml::from_str(raw)?;
    config
        .get(SECRET_KEY)
        .and_then(serde_yaml::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ReleaseError::MissingKey(SECRET_KEY.to_string()))
}

/// Token for a namespace (all groups and subgroups joined by `/`) or one
/// repository inside it.
pub fn webhook_token(secret: &str, namespace: &str, repo_name: Option<&str>) -> Result<String> {
    let claims = WebhookClaims {
        namespace: namespace.to_string(),
        repo_name: repo_name.filter(|r| !r.is_empty()).map(str::to_string),
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    fn decode_claims(token: &str, secret: &str) -> WebhookClaims {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        decode::<WebhookClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .unwrap()
            .claims
    }

    #[test]
    fn token_for_repository() {
        let token = webhook_token("s3cret", "packit/specfile-group", Some("specfile")).unwrap();
        let claims = decode_claims(&token, "s3cret");
        assert_eq!(claims.namespace, "packit/specfile-group");
        assert_eq!(claims.repo_name.as_deref(), Some("specfile"));
    }

    #[test]
    fn namespace_token_has_no_repo_claim() {
        let token = webhook_token("s3cret", "redhat/centos-stream", None).unwrap();
        assert_eq!(decode_claims(&token, "s3cret").repo_name, None);

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
    }

    #[test]
    fn secret_is_read_from_yaml() {
        let raw = "deployment: prod\ngitlab_token_secret: abc\n";
        assert_eq!(token_secret_from_str(raw).unwrap(), "abc");
        assert!(matches!(
            token_secret_from_str("deployment: prod\n"),
            Err(ReleaseError::MissingKey(_))
        ));
    }
}
