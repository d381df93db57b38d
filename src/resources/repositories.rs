//! `artifactory_repositories`: lists repositories, optionally filtered.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{from_state, to_state, DataSource};
use crate::client::ArtifactoryClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema, StringValidator};

/// Data source type name.
pub const TYPE_NAME: &str = "artifactory_repositories";

const REPOSITORIES_PATH: &str = "/artifactory/api/repositories";

const REPOSITORY_TYPES: [&str; 5] = ["local", "remote", "virtual", "federated", "distribution"];

/// Query filters, as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RepositoriesFilter {
    /// `local`, `remote`, `virtual`, `federated` or `distribution`.
    #[serde(default)]
    pub repository_type: Option<String>,
    /// Package type, e.g. `gradle`.
    #[serde(default)]
    pub package_type: Option<String>,
    /// Project key.
    #[serde(default)]
    pub project_key: Option<String>,
}

/// One entry of `GET /api/repositories`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryEntry {
    key: String,
    #[serde(rename = "type", default)]
    repo_type: String,
    #[serde(default)]
    package_type: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

/// One element of the `repos` list in state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositorySummary {
    /// Repository key.
    pub key: String,
    /// Repository class, lower case.
    #[serde(rename = "type")]
    pub repo_type: String,
    /// Package type, lower case.
    pub package_type: String,
    /// Repository URL.
    pub url: String,
    /// Description, possibly empty.
    pub description: String,
}

/// The data source's full state: the filters echoed back plus the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoriesState {
    /// Derived from the filters.
    pub id: String,
    /// Repository type filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_type: Option<String>,
    /// Package type filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_type: Option<String>,
    /// Project filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_key: Option<String>,
    /// Matching repositories.
    pub repos: Vec<RepositorySummary>,
}

impl From<RepositoryEntry> for RepositorySummary {
    fn from(entry: RepositoryEntry) -> Self {
        Self {
            key: entry.key,
            // The list endpoint reports upper-case rclass values.
            repo_type: entry.repo_type.to_lowercase(),
            package_type: entry.package_type.to_lowercase(),
            url: entry.url,
            description: entry.description,
        }
    }
}

/// The repositories data source.
#[derive(Debug, Default)]
pub struct Repositories;

impl Repositories {
    /// Constructor used by the registry.
    pub fn boxed() -> Box<dyn DataSource> {
        Box::new(Self)
    }
}

#[async_trait]
impl DataSource for Repositories {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        let repo = AttributeType::object([
            ("key", AttributeType::String),
            ("type", AttributeType::String),
            ("package_type", AttributeType::String),
            ("url", AttributeType::String),
            ("description", AttributeType::String),
        ]);

        Schema::v0()
            .with_description("Returns a list of minimal repository details for all repositories of the specified type.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "repository_type",
                Attribute::optional_string()
                    .with_description("Filter on repository type.")
                    .with_validator(StringValidator::one_of(REPOSITORY_TYPES)),
            )
            .with_attribute(
                "package_type",
                Attribute::optional_string().with_description("Filter on package type, e.g. `gradle`."),
            )
            .with_attribute(
                "project_key",
                Attribute::optional_string()
                    .with_description("Filter on project key.")
                    .with_validator(StringValidator::length_at_least(1)),
            )
            .with_attribute(
                "repos",
                Attribute::new(AttributeType::list(repo), AttributeFlags::computed())
                    .with_description("A list of repositories matching the filters."),
            )
    }

    async fn read(&self, client: &ArtifactoryClient, config: Value) -> Result<Value, ProviderError> {
        let filter: RepositoriesFilter = if config.is_null() {
            RepositoriesFilter::default()
        } else {
            from_state(config)?
        };

        let query = [
            ("type", filter.repository_type.as_deref().unwrap_or_default()),
            ("packageType", filter.package_type.as_deref().unwrap_or_default()),
            ("project", filter.project_key.as_deref().unwrap_or_default()),
        ];
        let entries: Vec<RepositoryEntry> = client.get_json_with_query(REPOSITORIES_PATH, &query).await?;

        let id = [
            filter.repository_type.as_deref(),
            filter.package_type.as_deref(),
            filter.project_key.as_deref(),
        ]
        .iter()
        .map(|part| part.unwrap_or_default())
        .collect::<Vec<_>>()
        .join("/");

        to_state(&RepositoriesState {
            id: format!("repositories/{}", id),
            repository_type: filter.repository_type,
            package_type: filter.package_type,
            project_key: filter.project_key,
            repos: entries.into_iter().map(RepositorySummary::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::client_for;
    use crate::testing::assert_error_contains;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_read_with_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/repositories"))
            .and(query_param("type", "local"))
            .and(query_param("packageType", "gradle"))
            .and(query_param_is_missing("project"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "key": "libs-release",
                    "type": "LOCAL",
                    "packageType": "Gradle",
                    "url": "https://x.example/artifactory/libs-release",
                    "description": "releases"
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let state = Repositories
            .read(
                &client_for(&server),
                json!({"repository_type": "local", "package_type": "gradle", "project_key": null}),
            )
            .await
            .unwrap();

        assert_eq!(state["id"], "repositories/local/gradle/");
        assert_eq!(state["repos"][0]["key"], "libs-release");
        assert_eq!(state["repos"][0]["type"], "local");
        assert_eq!(state["repos"][0]["package_type"], "gradle");
        assert!(state.get("project_key").is_none());
    }

    #[tokio::test]
    async fn test_read_without_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/repositories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let state = Repositories.read(&client_for(&server), Value::Null).await.unwrap();
        assert_eq!(state["repos"], json!([]));
    }

    #[test]
    fn test_validate_rejects_unknown_repository_type() {
        let diagnostics = Repositories.validate(&json!({"repository_type": "cloud"}));
        assert_error_contains(&diagnostics, "repository_type");
    }
}
