//! Secrets the instance needs before it can sync.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::spec::FluxSpec;

/// Key Flux's kustomize-controller reads age identities from.
pub const AGE_KEY_FIELD: &str = "age.agekey";

/// Secret metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMeta {
    /// Secret name.
    pub name: String,
    /// Secret namespace.
    pub namespace: String,
}

/// `v1` `Secret` with plain-text data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    /// Always `v1`.
    pub api_version: String,
    /// Always `Secret`.
    pub kind: String,
    /// Name and namespace.
    pub metadata: SecretMeta,
    /// Always `Opaque`.
    #[serde(rename = "type")]
    pub secret_type: String,
    /// Plain-text values.
    pub string_data: BTreeMap<String, String>,
}

impl Secret {
    fn opaque(name: &str, namespace: &str, data: BTreeMap<String, String>) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "Secret".to_string(),
            metadata: SecretMeta {
                name: name.to_string(),
                namespace: namespace.to_string(),
            },
            secret_type: "Opaque".to_string(),
            string_data: data,
        }
    }
}

/// SOPS age key secret; empty if no key was supplied.
#[must_use]
pub fn sops_secret(spec: &FluxSpec) -> Secret {
    let mut data = BTreeMap::new();
    match spec.sops.age_key.as_deref() {
        Some(key) => {
            data.insert(AGE_KEY_FIELD.to_string(), key.to_string());
        }
        None => warn!(secret = %spec.sops.secret_name, "No age key supplied"),
    }
    Secret::opaque(&spec.sops.secret_name, &spec.namespace, data)
}

/// Git basic-auth secret; the password is omitted without a token.
#[must_use]
pub fn git_secret(spec: &FluxSpec) -> Secret {
    let mut data = BTreeMap::from([("username".to_string(), spec.git.username.clone())]);
    match spec.git.token.as_deref() {
        Some(token) => {
            data.insert("password".to_string(), token.to_string());
        }
        None => warn!(secret = %spec.git.secret_name, "No git token supplied"),
    }
    Secret::opaque(&spec.git.secret_name, &spec.namespace, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sops_secret() {
        let mut spec = FluxSpec::new("o", "r");
        spec.sops.age_key = Some("AGE-SECRET-KEY-1XYZ".to_string());

        let secret = sops_secret(&spec);

        assert_eq!(secret.metadata.name, "sops-age");
        assert_eq!(secret.metadata.namespace, "flux-system");
        assert_eq!(secret.string_data[AGE_KEY_FIELD], "AGE-SECRET-KEY-1XYZ");
    }

    #[test]
    fn test_git_secret_without_token() {
        let secret = git_secret(&FluxSpec::new("o", "r"));

        assert_eq!(secret.string_data.len(), 1);
        assert_eq!(secret.string_data["username"], "git");
    }

    #[test]
    fn test_secret_manifest_shape() {
        let mut spec = FluxSpec::new("o", "r");
        spec.git.token = Some("ghp_abc".to_string());

        let yaml = serde_yaml::to_string(&git_secret(&spec)).unwrap();

        assert_eq!(
            yaml,
            "apiVersion: v1\nkind: Secret\nmetadata:\n  name: git-credentials\n  namespace: flux-system\ntype: Opaque\nstringData:\n  password: ghp_abc\n  username: git\n"
        );
    }
}
