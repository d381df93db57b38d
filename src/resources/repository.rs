//! `artifactory_local_gradle_repository`: a local Gradle repository.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{from_state, non_empty, null_as_default, segment, to_state, Resource};
use crate::client::ArtifactoryClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, StringValidator};

/// Resource type name.
pub const TYPE_NAME: &str = "artifactory_local_gradle_repository";

const PACKAGE_TYPE: &str = "gradle";
const RCLASS: &str = "local";

fn default_includes_pattern() -> String {
    "**/*".to_string()
}

fn default_repo_layout_ref() -> String {
    "gradle-default".to_string()
}

fn default_checksum_policy_type() -> String {
    "client-checksums".to_string()
}

fn default_snapshot_version_behavior() -> String {
    "unique".to_string()
}

fn default_true() -> bool {
    true
}

/// Repository state as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalGradleRepositoryState {
    /// Repository key.
    pub key: String,
    /// Same as `key`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// Project the repository is assigned to.
    #[serde(default)]
    pub project_key: Option<String>,
    /// Project environments, `DEV` or `PROD`.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub project_environments: Vec<String>,
    /// Public description.
    #[serde(default)]
    pub description: Option<String>,
    /// Internal notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Artifact patterns to include.
    #[serde(default = "default_includes_pattern")]
    pub includes_pattern: String,
    /// Artifact patterns to exclude.
    #[serde(default)]
    pub excludes_pattern: Option<String>,
    /// Repository layout.
    #[serde(default = "default_repo_layout_ref")]
    pub repo_layout_ref: String,
    /// Blocks all access when set.
    #[serde(default, deserialize_with = "null_as_default")]
    pub blacked_out: bool,
    /// Index the repository in Xray.
    #[serde(default, deserialize_with = "null_as_default")]
    pub xray_index: bool,
    /// Property sets available to artifacts.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub property_sets: Vec<String>,
    /// Allow browsing archive contents.
    #[serde(default, deserialize_with = "null_as_default")]
    pub archive_browsing_enabled: bool,
    /// Redirect downloads to the storage backend (`downloadRedirect`).
    #[serde(default, deserialize_with = "null_as_default")]
    pub download_direct: bool,
    /// Prefer this repository during resolution.
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority_resolution: bool,
    /// Serve downloads through the CDN.
    #[serde(default, deserialize_with = "null_as_default")]
    pub cdn_redirect: bool,
    /// Checksum policy.
    #[serde(default = "default_checksum_policy_type")]
    pub checksum_policy_type: String,
    /// Snapshot naming convention.
    #[serde(default = "default_snapshot_version_behavior")]
    pub snapshot_version_behavior: String,
    /// Unique snapshots kept per artifact, 0 for no limit.
    #[serde(default, deserialize_with = "null_as_default")]
    pub max_unique_snapshots: i64,
    /// Accept release artifacts.
    #[serde(default = "default_true")]
    pub handle_releases: bool,
    /// Accept snapshot artifacts.
    #[serde(default = "default_true")]
    pub handle_snapshots: bool,
    /// Skip POM consistency checks on deploy.
    #[serde(default = "default_true")]
    pub suppress_pom_consistency_checks: bool,
}

/// Repository configuration as the server reads and writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LocalGradleRepositoryPayload {
    pub key: String,
    pub rclass: String,
    pub package_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project_key: String,
    #[serde(default)]
    pub environments: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub includes_pattern: String,
    #[serde(default)]
    pub excludes_pattern: String,
    #[serde(default)]
    pub repo_layout_ref: String,
    #[serde(default)]
    pub blacked_out: bool,
    #[serde(default)]
    pub xray_index: bool,
    #[serde(default)]
    pub property_sets: Vec<String>,
    #[serde(default)]
    pub archive_browsing_enabled: bool,
    #[serde(default)]
    pub download_redirect: bool,
    #[serde(default)]
    pub priority_resolution: bool,
    #[serde(default)]
    pub cdn_redirect: bool,
    #[serde(default)]
    pub checksum_policy_type: String,
    #[serde(default)]
    pub snapshot_version_behavior: String,
    #[serde(default)]
    pub max_unique_snapshots: i64,
    #[serde(default)]
    pub handle_releases: bool,
    #[serde(default)]
    pub handle_snapshots: bool,
    #[serde(default)]
    pub suppress_pom_consistency_checks: bool,
}

/// Build the server payload from state.
pub(crate) fn pack(state: &LocalGradleRepositoryState) -> LocalGradleRepositoryPayload {
    LocalGradleRepositoryPayload {
        key: state.key.clone(),
        rclass: RCLASS.to_string(),
        package_type: PACKAGE_TYPE.to_string(),
        project_key: state.project_key.clone().unwrap_or_default(),
        environments: state.project_environments.clone(),
        description: state.description.clone().unwrap_or_default(),
        notes: state.notes.clone().unwrap_or_default(),
        includes_pattern: state.includes_pattern.clone(),
        excludes_pattern: state.excludes_pattern.clone().unwrap_or_default(),
        repo_layout_ref: state.repo_layout_ref.clone(),
        blacked_out: state.blacked_out,
        xray_index: state.xray_index,
        property_sets: state.property_sets.clone(),
        archive_browsing_enabled: state.archive_browsing_enabled,
        download_redirect: state.download_direct,
        priority_resolution: state.priority_resolution,
        cdn_redirect: state.cdn_redirect,
        checksum_policy_type: state.checksum_policy_type.clone(),
        snapshot_version_behavior: state.snapshot_version_behavior.clone(),
        max_unique_snapshots: state.max_unique_snapshots,
        handle_releases: state.handle_releases,
        handle_snapshots: state.handle_snapshots,
        suppress_pom_consistency_checks: state.suppress_pom_consistency_checks,
    }
}

/// Build state from the server payload.
pub(crate) fn unpack(payload: LocalGradleRepositoryPayload) -> LocalGradleRepositoryState {
    let mut environments = payload.environments;
    environments.sort();
    let mut property_sets = payload.property_sets;
    property_sets.sort();

    LocalGradleRepositoryState {
        id: payload.key.clone(),
        key: payload.key,
        project_key: non_empty(payload.project_key),
        project_environments: environments,
        description: non_empty(payload.description),
        notes: non_empty(payload.notes),
        includes_pattern: payload.includes_pattern,
        excludes_pattern: non_empty(payload.excludes_pattern),
        repo_layout_ref: payload.repo_layout_ref,
        blacked_out: payload.blacked_out,
        xray_index: payload.xray_index,
        property_sets,
        archive_browsing_enabled: payload.archive_browsing_enabled,
        download_direct: payload.download_redirect,
        priority_resolution: payload.priority_resolution,
        cdn_redirect: payload.cdn_redirect,
        checksum_policy_type: payload.checksum_policy_type,
        snapshot_version_behavior: payload.snapshot_version_behavior,
        max_unique_snapshots: payload.max_unique_snapshots,
        handle_releases: payload.handle_releases,
        handle_snapshots: payload.handle_snapshots,
        suppress_pom_consistency_checks: payload.suppress_pom_consistency_checks,
    }
}

fn repository_path(key: &str) -> String {
    format!("/artifactory/api/repositories/{}", segment(key))
}

/// The local Gradle repository resource.
#[derive(Debug, Default)]
pub struct LocalGradleRepository;

impl LocalGradleRepository {
    /// Constructor used by the registry.
    pub fn boxed() -> Box<dyn Resource> {
        Box::new(Self)
    }

    async fn fetch(&self, client: &ArtifactoryClient, key: &str) -> Result<Value, ProviderError> {
        let payload: LocalGradleRepositoryPayload = client.get_json(&repository_path(key)).await?;
        to_state(&unpack(payload))
    }
}

#[async_trait]
impl Resource for LocalGradleRepository {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Creates a local Gradle repository.")
            .with_attribute(
                "key",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("A mandatory identifier for the repository that must be unique.")
                    .with_validator(StringValidator::length_at_least(1)),
            )
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "project_key",
                Attribute::optional_string()
                    .with_description("Project key for assigning this repository to."),
            )
            .with_attribute(
                "project_environments",
                Attribute::optional_string_set()
                    .with_description("Project environments, `DEV` or `PROD`."),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("notes", Attribute::optional_string())
            .with_attribute(
                "includes_pattern",
                Attribute::optional_string()
                    .with_default(json!(default_includes_pattern()))
                    .with_description("Comma-separated list of artifact patterns to include."),
            )
            .with_attribute(
                "excludes_pattern",
                Attribute::optional_string()
                    .with_description("Comma-separated list of artifact patterns to exclude."),
            )
            .with_attribute(
                "repo_layout_ref",
                Attribute::optional_string().with_default(json!(default_repo_layout_ref())),
            )
            .with_attribute("blacked_out", Attribute::optional_bool().with_default(json!(false)))
            .with_attribute("xray_index", Attribute::optional_bool().with_default(json!(false)))
            .with_attribute("property_sets", Attribute::optional_string_set())
            .with_attribute(
                "archive_browsing_enabled",
                Attribute::optional_bool().with_default(json!(false)),
            )
            .with_attribute("download_direct", Attribute::optional_bool().with_default(json!(false)))
            .with_attribute(
                "priority_resolution",
                Attribute::optional_bool().with_default(json!(false)),
            )
            .with_attribute("cdn_redirect", Attribute::optional_bool().with_default(json!(false)))
            .with_attribute(
                "checksum_policy_type",
                Attribute::optional_string()
                    .with_default(json!(default_checksum_policy_type()))
                    .with_validator(StringValidator::one_of([
                        "client-checksums",
                        "server-generated-checksums",
                    ]))
                    .with_description(
                        "How Artifactory behaves when a client checksum for a deployed resource \
                         is missing or conflicts with the locally calculated checksum.",
                    ),
            )
            .with_attribute(
                "snapshot_version_behavior",
                Attribute::optional_string()
                    .with_default(json!(default_snapshot_version_behavior()))
                    .with_validator(StringValidator::one_of(["unique", "non-unique", "deployer"]))
                    .with_description("Naming convention for SNAPSHOT versions."),
            )
            .with_attribute(
                "max_unique_snapshots",
                Attribute::optional_int64()
                    .with_default(json!(0))
                    .with_description(
                        "Maximum number of unique snapshots of a single artifact to store. \
                         0 means no limit.",
                    ),
            )
            .with_attribute("handle_releases", Attribute::optional_bool().with_default(json!(true)))
            .with_attribute("handle_snapshots", Attribute::optional_bool().with_default(json!(true)))
            .with_attribute(
                "suppress_pom_consistency_checks",
                Attribute::optional_bool().with_default(json!(true)),
            )
    }

    async fn create(&self, client: &ArtifactoryClient, planned: Value) -> Result<Value, ProviderError> {
        let state: LocalGradleRepositoryState = from_state(planned)?;
        client
            .put_json(&repository_path(&state.key), &pack(&state))
            .await?;
        info!(key = %state.key, "Created local gradle repository");
        self.fetch(client, &state.key).await
    }

    async fn read(&self, client: &ArtifactoryClient, state: Value) -> Result<Value, ProviderError> {
        let state: LocalGradleRepositoryState = from_state(state)?;
        self.fetch(client, &state.key).await
    }

    async fn update(
        &self,
        client: &ArtifactoryClient,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let state: LocalGradleRepositoryState = from_state(planned)?;
        client
            .post_json(&repository_path(&state.key), &pack(&state))
            .await?;
        self.fetch(client, &state.key).await
    }

    async fn delete(&self, client: &ArtifactoryClient, state: Value) -> Result<(), ProviderError> {
        let state: LocalGradleRepositoryState = from_state(state)?;
        client.delete(&repository_path(&state.key)).await
    }

    async fn import(&self, client: &ArtifactoryClient, id: &str) -> Result<Value, ProviderError> {
        self.fetch(client, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::plan;
    use crate::resources::test_support::client_for;
    use crate::testing::assert_plan_no_changes;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn server_payload() -> Value {
        json!({
            "key": "gradle-local",
            "rclass": "local",
            "packageType": "gradle",
            "description": "",
            "notes": "",
            "includesPattern": "**/*",
            "excludesPattern": "",
            "repoLayoutRef": "gradle-default",
            "environments": ["PROD", "DEV"],
            "checksumPolicyType": "client-checksums",
            "snapshotVersionBehavior": "unique",
            "maxUniqueSnapshots": 0,
            "handleReleases": true,
            "handleSnapshots": true,
            "suppressPomConsistencyChecks": true,
            "enableFileListsIndexing": false
        })
    }

    #[test]
    fn test_planned_defaults_deserialize() {
        let resource = LocalGradleRepository;
        let planned = plan(&resource.schema(), None, json!({"key": "gradle-local"}))
            .unwrap()
            .planned_state;
        let state: LocalGradleRepositoryState = from_state(planned).unwrap();

        assert_eq!(state.checksum_policy_type, "client-checksums");
        assert_eq!(state.snapshot_version_behavior, "unique");
        assert_eq!(state.max_unique_snapshots, 0);
        assert!(state.handle_releases && state.handle_snapshots && state.suppress_pom_consistency_checks);
        assert_eq!(state.includes_pattern, "**/*");
        assert_eq!(state.repo_layout_ref, "gradle-default");
        assert!(state.property_sets.is_empty());

        let payload = pack(&state);
        assert_eq!(payload.rclass, "local");
        assert_eq!(payload.package_type, "gradle");
    }

    #[test]
    fn test_unpack_normalizes_empty_strings() {
        let payload: LocalGradleRepositoryPayload = serde_json::from_value(server_payload()).unwrap();
        let state = unpack(payload);
        assert_eq!(state.id, "gradle-local");
        assert_eq!(state.description, None);
        assert_eq!(state.excludes_pattern, None);
        assert_eq!(state.project_environments, vec!["DEV", "PROD"]);
    }

    #[test]
    fn test_configured_empty_values_match_refreshed_state() {
        let mut payload = server_payload();
        payload["environments"] = json!([]);
        let payload: LocalGradleRepositoryPayload = serde_json::from_value(payload).unwrap();
        let state = to_state(&unpack(payload)).unwrap();

        let config = json!({
            "key": "gradle-local",
            "description": "",
            "project_environments": [],
            "property_sets": []
        });
        let result = plan(&LocalGradleRepository.schema(), Some(state), config).unwrap();
        assert_plan_no_changes(&result);
        assert!(result.planned_state["description"].is_null());
        assert!(result.planned_state["project_environments"].is_null());
    }

    #[tokio::test]
    async fn test_create_puts_then_reads() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/artifactory/api/repositories/gradle-local"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({
                "key": "gradle-local",
                "rclass": "local",
                "packageType": "gradle",
                "handleReleases": true,
                "checksumPolicyType": "client-checksums"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/repositories/gradle-local"))
            .respond_with(ResponseTemplate::new(200).set_body_json(server_payload()))
            .mount(&server)
            .await;

        let resource = LocalGradleRepository;
        let planned = plan(&resource.schema(), None, json!({"key": "gradle-local"}))
            .unwrap()
            .planned_state;
        let state = resource.create(&client_for(&server), planned).await.unwrap();
        assert_eq!(state["id"], "gradle-local");
        assert_eq!(state["handle_snapshots"], true);
    }

    #[tokio::test]
    async fn test_update_posts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/artifactory/api/repositories/gradle-local"))
            .and(body_partial_json(json!({"maxUniqueSnapshots": 10})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let mut refreshed = server_payload();
        refreshed["maxUniqueSnapshots"] = json!(10);
        Mock::given(method("GET"))
            .and(path("/artifactory/api/repositories/gradle-local"))
            .respond_with(ResponseTemplate::new(200).set_body_json(refreshed))
            .mount(&server)
            .await;

        let resource = LocalGradleRepository;
        let prior = json!({"key": "gradle-local", "id": "gradle-local"});
        let planned = plan(
            &resource.schema(),
            Some(prior.clone()),
            json!({"key": "gradle-local", "max_unique_snapshots": 10}),
        )
        .unwrap()
        .planned_state;
        let state = resource
            .update(&client_for(&server), prior, planned)
            .await
            .unwrap();
        assert_eq!(state["max_unique_snapshots"], 10);
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/repositories/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = LocalGradleRepository
            .read(&client_for(&server), json!({"key": "gone"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_and_import() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/artifactory/api/repositories/gradle-local"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/repositories/gradle-local"))
            .respond_with(ResponseTemplate::new(200).set_body_json(server_payload()))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let imported = LocalGradleRepository.import(&client, "gradle-local").await.unwrap();
        assert_eq!(imported["key"], "gradle-local");
        LocalGradleRepository.delete(&client, imported).await.unwrap();
    }
}
