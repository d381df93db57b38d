//! `artifactory_group`: a security group.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{from_state, non_empty, null_as_default, segment, to_state, Resource};
use crate::client::ArtifactoryClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema, StringValidator};
use crate::validation::validate;

/// Resource type name.
pub const TYPE_NAME: &str = "artifactory_group";

/// Group state as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    /// Group name.
    pub name: String,
    /// Same as `name`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// External (Azure AD) group id.
    #[serde(default)]
    pub external_id: Option<String>,
    /// New users join automatically.
    #[serde(default, deserialize_with = "null_as_default")]
    pub auto_join: bool,
    /// Members are administrators.
    #[serde(default, deserialize_with = "null_as_default")]
    pub admin_privileges: bool,
    /// Authentication realm.
    #[serde(default)]
    pub realm: Option<String>,
    /// Realm-specific attributes.
    #[serde(default)]
    pub realm_attributes: Option<String>,
    /// Member usernames. `None` leaves membership to the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_names: Option<Vec<String>>,
    /// Xray watch manager role.
    #[serde(default, deserialize_with = "null_as_default")]
    pub watch_manager: bool,
    /// Xray policy manager role.
    #[serde(default, deserialize_with = "null_as_default")]
    pub policy_manager: bool,
    /// Xray reports manager role.
    #[serde(default, deserialize_with = "null_as_default")]
    pub reports_manager: bool,
}

/// Group as the security API reads and writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GroupPayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_id: String,
    #[serde(default)]
    pub auto_join: bool,
    #[serde(default)]
    pub admin_privileges: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub realm: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub realm_attributes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_names: Option<Vec<String>>,
    #[serde(default)]
    pub watch_manager: bool,
    #[serde(default)]
    pub policy_manager: bool,
    #[serde(default)]
    pub reports_manager: bool,
}

/// Build the payload from state.
pub(crate) fn pack(state: &GroupState) -> GroupPayload {
    GroupPayload {
        name: state.name.clone(),
        description: state.description.clone().unwrap_or_default(),
        external_id: state.external_id.clone().unwrap_or_default(),
        auto_join: state.auto_join,
        admin_privileges: state.admin_privileges,
        realm: state.realm.clone().unwrap_or_default(),
        realm_attributes: state.realm_attributes.clone().unwrap_or_default(),
        user_names: state.users_names.clone(),
        watch_manager: state.watch_manager,
        policy_manager: state.policy_manager,
        reports_manager: state.reports_manager,
    }
}

/// Build state from the payload.
pub(crate) fn unpack(payload: GroupPayload) -> GroupState {
    let users = payload
        .user_names
        .filter(|users| !users.is_empty())
        .map(|mut users| {
            users.sort();
            users
        });
    GroupState {
        id: payload.name.clone(),
        name: payload.name,
        description: non_empty(payload.description),
        external_id: non_empty(payload.external_id),
        auto_join: payload.auto_join,
        admin_privileges: payload.admin_privileges,
        realm: non_empty(payload.realm),
        realm_attributes: non_empty(payload.realm_attributes),
        users_names: users,
        watch_manager: payload.watch_manager,
        policy_manager: payload.policy_manager,
        reports_manager: payload.reports_manager,
    }
}

fn group_path(name: &str) -> String {
    format!("/artifactory/api/security/groups/{}", segment(name))
}

/// The group resource.
#[derive(Debug, Default)]
pub struct Group;

impl Group {
    /// Constructor used by the registry.
    pub fn boxed() -> Box<dyn Resource> {
        Box::new(Self)
    }

    async fn fetch(&self, client: &ArtifactoryClient, name: &str) -> Result<Value, ProviderError> {
        let payload: GroupPayload = client
            .get_json_with_query(&group_path(name), &[("includeUsers", "true")])
            .await?;
        to_state(&unpack(payload))
    }
}

#[async_trait]
impl Resource for Group {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Provides an Artifactory group resource.")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Name of the group.")
                    .with_validator(StringValidator::length_at_least(1)),
            )
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "external_id",
                Attribute::optional_string().with_description("New external group ID used to configure the corresponding group in Azure AD."),
            )
            .with_attribute(
                "auto_join",
                Attribute::optional_bool()
                    .with_default(json!(false))
                    .with_description(
                        "When this parameter is set, any new users defined in the system are \
                         automatically assigned to this group.",
                    ),
            )
            .with_attribute(
                "admin_privileges",
                Attribute::optional_bool()
                    .with_default(json!(false))
                    .with_description("Any users added to this group will automatically be assigned with admin privileges."),
            )
            .with_attribute("realm", Attribute::optional_computed_string())
            .with_attribute("realm_attributes", Attribute::optional_string())
            .with_attribute(
                "users_names",
                Attribute::optional_computed_string_set()
                    .with_description("List of users assigned to the group."),
            )
            .with_attribute("watch_manager", Attribute::optional_bool().with_default(json!(false)))
            .with_attribute("policy_manager", Attribute::optional_bool().with_default(json!(false)))
            .with_attribute("reports_manager", Attribute::optional_bool().with_default(json!(false)))
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validate(&self.schema(), config);
        let enabled = |name: &str| config.get(name).and_then(Value::as_bool).unwrap_or(false);
        if enabled("auto_join") && enabled("admin_privileges") {
            diagnostics.push(
                Diagnostic::error("Invalid attribute combination")
                    .with_detail("auto_join can not be set when admin_privileges is set")
                    .with_attribute("auto_join"),
            );
        }
        diagnostics
    }

    async fn create(&self, client: &ArtifactoryClient, planned: Value) -> Result<Value, ProviderError> {
        let state: GroupState = from_state(planned)?;
        client.put_json(&group_path(&state.name), &pack(&state)).await?;
        info!(name = %state.name, "Created group");
        self.fetch(client, &state.name).await
    }

    async fn read(&self, client: &ArtifactoryClient, state: Value) -> Result<Value, ProviderError> {
        let state: GroupState = from_state(state)?;
        self.fetch(client, &state.name).await
    }

    async fn update(
        &self,
        client: &ArtifactoryClient,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let state: GroupState = from_state(planned)?;
        client.post_json(&group_path(&state.name), &pack(&state)).await?;
        self.fetch(client, &state.name).await
    }

    async fn delete(&self, client: &ArtifactoryClient, state: Value) -> Result<(), ProviderError> {
        let state: GroupState = from_state(state)?;
        client.delete(&group_path(&state.name)).await
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
    use crate::testing::{assert_error_contains, assert_no_errors, assert_plan_no_changes};
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_validate_rejects_auto_join_with_admin() {
        let diagnostics = Group.validate(&json!({
            "name": "admins",
            "auto_join": true,
            "admin_privileges": true
        }));
        assert_error_contains(&diagnostics, "Invalid attribute combination");

        assert_no_errors(&Group.validate(&json!({"name": "devs", "auto_join": true})));
    }

    #[tokio::test]
    async fn test_create_and_read_users() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/artifactory/api/security/groups/devs"))
            .and(body_partial_json(json!({"name": "devs", "userNames": ["alice"]})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/security/groups/devs"))
            .and(query_param("includeUsers", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "devs",
                "description": "",
                "autoJoin": false,
                "adminPrivileges": false,
                "realm": "internal",
                "userNames": ["bob", "alice"]
            })))
            .mount(&server)
            .await;

        let planned = json!({"name": "devs", "users_names": ["alice"]});
        let state = Group.create(&client_for(&server), planned).await.unwrap();
        assert_eq!(state["users_names"], json!(["alice", "bob"]));
        assert_eq!(state["realm"], "internal");
        assert!(state["description"].is_null());
    }

    #[tokio::test]
    async fn test_server_filled_realm_and_members_do_not_drift() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/artifactory/api/security/groups/devs"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/security/groups/devs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "devs",
                "description": "d",
                "realm": "internal",
                "userNames": ["alice"]
            })))
            .mount(&server)
            .await;

        let config = json!({"name": "devs", "description": "d"});
        let planned = plan(&Group.schema(), None, config.clone()).unwrap().planned_state;
        let state = Group.create(&client_for(&server), planned).await.unwrap();

        let result = plan(&Group.schema(), Some(state), config).unwrap();
        assert_plan_no_changes(&result);
        assert_eq!(result.planned_state["realm"], "internal");
        assert_eq!(result.planned_state["users_names"], json!(["alice"]));

        let requests = server.received_requests().await.unwrap();
        let created: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(created.get("userNames").is_none());
        assert!(created.get("realm").is_none());
    }

    #[tokio::test]
    async fn test_empty_members_clears_group() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/artifactory/api/security/groups/devs"))
            .and(body_partial_json(json!({"userNames": []})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/security/groups/devs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "devs", "userNames": []})))
            .mount(&server)
            .await;

        let prior = json!({
            "name": "devs",
            "id": "devs",
            "auto_join": false,
            "admin_privileges": false,
            "users_names": ["alice"],
            "watch_manager": false,
            "policy_manager": false,
            "reports_manager": false
        });
        let config = json!({"name": "devs", "users_names": []});
        let result = plan(&Group.schema(), Some(prior.clone()), config.clone()).unwrap();
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].path, "users_names");

        let state = Group
            .update(&client_for(&server), prior, result.planned_state)
            .await
            .unwrap();
        assert!(state["users_names"].is_null());
        assert_plan_no_changes(&plan(&Group.schema(), Some(state), config).unwrap());
    }

    #[tokio::test]
    async fn test_update_posts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/artifactory/api/security/groups/devs"))
            .and(body_partial_json(json!({"description": "developers"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/security/groups/devs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"name": "devs", "description": "developers"})),
            )
            .mount(&server)
            .await;

        let state = Group
            .update(
                &client_for(&server),
                json!({"name": "devs"}),
                json!({"name": "devs", "description": "developers"}),
            )
            .await
            .unwrap();
        assert_eq!(state["description"], "developers");
    }
}
