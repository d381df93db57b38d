//! Managed resources and data sources.
//!
//! Each type pairs a state struct (the attribute names users write) with a
//! payload struct (the server's field names). `pack` turns state into a
//! payload, `unpack` turns a payload back into state.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::client::ArtifactoryClient;
use crate::error::ProviderError;
use crate::schema::{Diagnostic, Schema};
use crate::validation::validate;

pub mod group;
pub mod repositories;
pub mod repository;
pub mod security_policy;
pub mod user;

/// A resource type the provider manages.
#[async_trait]
pub trait Resource: Send + Sync {
    /// The resource type name, e.g. `artifactory_group`.
    fn type_name(&self) -> &'static str;

    /// The resource schema.
    fn schema(&self) -> Schema;

    /// Validate a resource block. Defaults to schema validation.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validate(&self.schema(), config)
    }

    /// Create the object and return its state.
    async fn create(&self, client: &ArtifactoryClient, planned: Value) -> Result<Value, ProviderError>;

    /// Read the object. Returns [`ProviderError::NotFound`] when it is gone.
    async fn read(&self, client: &ArtifactoryClient, state: Value) -> Result<Value, ProviderError>;

    /// Apply an update and return the new state.
    async fn update(
        &self,
        client: &ArtifactoryClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the object.
    async fn delete(&self, client: &ArtifactoryClient, state: Value) -> Result<(), ProviderError>;

    /// Read an existing object by id for import.
    async fn import(&self, client: &ArtifactoryClient, id: &str) -> Result<Value, ProviderError>;
}

/// A read-only data source.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// The data source type name.
    fn type_name(&self) -> &'static str;

    /// The data source schema.
    fn schema(&self) -> Schema;

    /// Validate a data source block. Defaults to schema validation.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validate(&self.schema(), config)
    }

    /// Query the server.
    async fn read(&self, client: &ArtifactoryClient, config: Value) -> Result<Value, ProviderError>;
}

/// Decode a state object into its typed form.
pub(crate) fn from_state<T: DeserializeOwned>(state: Value) -> Result<T, ProviderError> {
    serde_json::from_value(state)
        .map_err(|e| ProviderError::Validation(format!("invalid state: {}", e)))
}

/// Encode a typed state into a state object.
pub(crate) fn to_state<T: Serialize>(state: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}

/// Deserialize `null` as the type's default. Planned states carry explicit
/// nulls for unset attributes.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `None` for empty strings, which the server returns for unset text fields.
pub(crate) fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Percent-encode a single path segment.
pub(crate) fn segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
pub(crate) mod test_support {
    use wiremock::MockServer;

    use crate::client::ArtifactoryClient;
    use crate::config::Credential;

    /// A client for `server` sending a fixed bearer token.
    pub fn client_for(server: &MockServer) -> ArtifactoryClient {
        ArtifactoryClient::build(&server.uri(), "hemmer-provider-artifactory/test")
            .unwrap()
            .with_auth(&Credential::AccessToken("test-token".to_string()))
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_encodes_reserved_characters() {
        assert_eq!(segment("libs-release"), "libs-release");
        assert_eq!(segment("team a/b"), "team%20a%2Fb");
    }

    #[test]
    fn test_null_as_default() {
        #[derive(serde::Deserialize)]
        struct Sets {
            #[serde(default, deserialize_with = "null_as_default")]
            members: Vec<String>,
        }
        let sets: Sets = serde_json::from_value(serde_json::json!({"members": null})).unwrap();
        assert!(sets.members.is_empty());
        let sets: Sets = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(sets.members.is_empty());
    }

    #[test]
    fn test_from_state_reports_invalid_state() {
        #[derive(Debug, serde::Deserialize)]
        struct Named {
            #[allow(dead_code)]
            name: String,
        }
        let err = from_state::<Named>(serde_json::json!({"name": 3})).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }
}
