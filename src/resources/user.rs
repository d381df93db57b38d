//! `artifactory_user`: a user managed through the Access API.
//!
//! The server never returns the password, so it is carried over from the
//! incoming state on every read.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{from_state, null_as_default, segment, to_state, Resource};
use crate::client::ArtifactoryClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, StringValidator};

/// Resource type name.
pub const TYPE_NAME: &str = "artifactory_user";

const USERS_PATH: &str = "/access/api/v2/users";

fn default_true() -> bool {
    true
}

/// User state as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    /// Username.
    pub name: String,
    /// Same as `name`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// Email address.
    pub email: String,
    /// Write-only password.
    #[serde(default)]
    pub password: Option<String>,
    /// Administrator flag.
    #[serde(default, deserialize_with = "null_as_default")]
    pub admin: bool,
    /// The user may edit their own profile.
    #[serde(default = "default_true")]
    pub profile_updatable: bool,
    /// REST API access only.
    #[serde(default = "default_true")]
    pub disable_ui_access: bool,
    /// Disable the internal password (external auth only).
    #[serde(default, deserialize_with = "null_as_default")]
    pub internal_password_disabled: bool,
    /// Group memberships. `None` leaves them to the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}

/// User as the Access API reads and writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct UserPayload {
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub profile_updatable: bool,
    #[serde(default)]
    pub disable_ui_access: bool,
    #[serde(default)]
    pub internal_password_disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}

/// Build the payload from state. The password is only sent when `include_password` is set.
pub(crate) fn pack(state: &UserState, include_password: bool) -> UserPayload {
    UserPayload {
        username: state.name.clone(),
        email: state.email.clone(),
        password: state.password.clone().filter(|_| include_password),
        admin: state.admin,
        profile_updatable: state.profile_updatable,
        disable_ui_access: state.disable_ui_access,
        internal_password_disabled: state.internal_password_disabled,
        groups: state.groups.clone(),
    }
}

/// Build state from the payload, keeping `password` from the previous state.
pub(crate) fn unpack(payload: UserPayload, password: Option<String>) -> UserState {
    let groups = payload.groups.filter(|groups| !groups.is_empty()).map(|mut groups| {
        groups.sort();
        groups
    });
    UserState {
        id: payload.username.clone(),
        name: payload.username,
        email: payload.email,
        password,
        admin: payload.admin,
        profile_updatable: payload.profile_updatable,
        disable_ui_access: payload.disable_ui_access,
        internal_password_disabled: payload.internal_password_disabled,
        groups,
    }
}

fn user_path(name: &str) -> String {
    format!("{}/{}", USERS_PATH, segment(name))
}

/// The user resource.
#[derive(Debug, Default)]
pub struct User;

impl User {
    /// Constructor used by the registry.
    pub fn boxed() -> Box<dyn Resource> {
        Box::new(Self)
    }

    async fn fetch(
        &self,
        client: &ArtifactoryClient,
        name: &str,
        password: Option<String>,
    ) -> Result<Value, ProviderError> {
        let payload: UserPayload = client.get_json(&user_path(name)).await?;
        to_state(&unpack(payload, password))
    }
}

#[async_trait]
impl Resource for User {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Provides an Artifactory user resource.")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Username for user.")
                    .with_validator(StringValidator::length_at_least(1)),
            )
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "email",
                Attribute::required_string()
                    .with_description("Email for user.")
                    .with_validator(StringValidator::length_at_least(1)),
            )
            .with_attribute(
                "password",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("Password for the user. Never read back from the server.")
                    .with_validator(StringValidator::length_at_least(1)),
            )
            .with_attribute(
                "admin",
                Attribute::optional_bool()
                    .with_default(json!(false))
                    .with_description("When enabled, this user is an administrator."),
            )
            .with_attribute(
                "profile_updatable",
                Attribute::optional_bool()
                    .with_default(json!(true))
                    .with_description("When enabled, this user can update their profile details."),
            )
            .with_attribute(
                "disable_ui_access",
                Attribute::optional_bool()
                    .with_default(json!(true))
                    .with_description("When enabled, this user can only access the system through the REST API."),
            )
            .with_attribute(
                "internal_password_disabled",
                Attribute::optional_bool().with_default(json!(false)),
            )
            .with_attribute(
                "groups",
                Attribute::optional_computed_string_set()
                    .with_description("List of groups this user is a part of."),
            )
    }

    async fn create(&self, client: &ArtifactoryClient, planned: Value) -> Result<Value, ProviderError> {
        let state: UserState = from_state(planned)?;
        client.post_json(USERS_PATH, &pack(&state, true)).await?;
        info!(name = %state.name, "Created user");
        self.fetch(client, &state.name, state.password).await
    }

    async fn read(&self, client: &ArtifactoryClient, state: Value) -> Result<Value, ProviderError> {
        let state: UserState = from_state(state)?;
        self.fetch(client, &state.name, state.password).await
    }

    async fn update(
        &self,
        client: &ArtifactoryClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: UserState = from_state(prior)?;
        let state: UserState = from_state(planned)?;
        let password_changed = prior.password != state.password;
        client
            .patch_json(&user_path(&state.name), &pack(&state, password_changed))
            .await?;
        self.fetch(client, &state.name, state.password).await
    }

    async fn delete(&self, client: &ArtifactoryClient, state: Value) -> Result<(), ProviderError> {
        let state: UserState = from_state(state)?;
        client.delete(&user_path(&state.name)).await
    }

    async fn import(&self, client: &ArtifactoryClient, id: &str) -> Result<Value, ProviderError> {
        self.fetch(client, id, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::plan;
    use crate::resources::test_support::client_for;
    use crate::testing::assert_plan_no_changes;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn server_user() -> Value {
        json!({
            "username": "alice",
            "email": "alice@example.com",
            "admin": false,
            "profile_updatable": true,
            "disable_ui_access": true,
            "internal_password_disabled": false,
            "groups": ["readers", "devs"],
            "realm": "internal",
            "status": "enabled"
        })
    }

    async fn mount_get(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/access/api/v2/users/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(server_user()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_create_sends_password_and_keeps_it_in_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/access/api/v2/users"))
            .and(body_json(json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "s3cret-Passw0rd",
                "admin": false,
                "profile_updatable": true,
                "disable_ui_access": true,
                "internal_password_disabled": false,
                "groups": ["devs", "readers"]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(server_user()))
            .expect(1)
            .mount(&server)
            .await;
        mount_get(&server).await;

        let user = User;
        let planned = plan(
            &user.schema(),
            None,
            json!({
                "name": "alice",
                "email": "alice@example.com",
                "password": "s3cret-Passw0rd",
                "groups": ["readers", "devs"]
            }),
        )
        .unwrap()
        .planned_state;

        let state = user.create(&client_for(&server), planned).await.unwrap();
        assert_eq!(state["password"], "s3cret-Passw0rd");
        assert_eq!(state["groups"], json!(["devs", "readers"]));
        assert_eq!(state["id"], "alice");
    }

    #[tokio::test]
    async fn test_server_assigned_groups_do_not_drift() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/access/api/v2/users"))
            .respond_with(ResponseTemplate::new(201).set_body_json(server_user()))
            .expect(1)
            .mount(&server)
            .await;
        mount_get(&server).await;

        let user = User;
        let config = json!({"name": "alice", "email": "alice@example.com", "password": "p"});
        let planned = plan(&user.schema(), None, config.clone()).unwrap().planned_state;
        let state = user.create(&client_for(&server), planned).await.unwrap();
        assert_eq!(state["groups"], json!(["devs", "readers"]));

        let result = plan(&user.schema(), Some(state), config).unwrap();
        assert_plan_no_changes(&result);

        let requests = server.received_requests().await.unwrap();
        let created: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(created.get("groups").is_none());
    }

    #[tokio::test]
    async fn test_update_omits_unchanged_password() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/access/api/v2/users/alice"))
            .and(body_json(json!({
                "username": "alice",
                "email": "alice@example.com",
                "admin": true,
                "profile_updatable": true,
                "disable_ui_access": true,
                "internal_password_disabled": false
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        mount_get(&server).await;

        let prior = json!({"name": "alice", "email": "alice@example.com", "password": "p"});
        let planned = json!({"name": "alice", "email": "alice@example.com", "password": "p", "admin": true});
        let state = User
            .update(&client_for(&server), prior, planned)
            .await
            .unwrap();
        assert_eq!(state["password"], "p");
    }

    #[tokio::test]
    async fn test_import_has_no_password() {
        let server = MockServer::start().await;
        mount_get(&server).await;

        let state = User.import(&client_for(&server), "alice").await.unwrap();
        assert!(state["password"].is_null());
        assert_eq!(state["email"], "alice@example.com");
    }

    #[tokio::test]
    async fn test_delete() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/access/api/v2/users/alice"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        User.delete(&client_for(&server), json!({"name": "alice", "email": "a@example.com"}))
            .await
            .unwrap();
    }
}
