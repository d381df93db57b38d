//! Singleton security policies: `artifactory_user_lock_policy` and
//! `artifactory_password_expiration_policy`.
//!
//! The server holds exactly one of each. Create and update both write it,
//! delete writes the server defaults back.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{from_state, null_as_default, to_state, Resource};
use crate::client::ArtifactoryClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema, StringValidator};

/// What distinguishes one singleton policy from another.
pub trait PolicySpec: Send + Sync + 'static {
    /// Resource type name.
    const TYPE_NAME: &'static str;
    /// Server path of the policy document.
    const PATH: &'static str;

    /// Typed state.
    type State: Serialize + DeserializeOwned + Send + Sync;
    /// Server document.
    type Payload: Serialize + DeserializeOwned + Send + Sync;

    /// Resource schema.
    fn schema() -> Schema;
    /// The user-chosen name of the policy.
    fn name(state: &Self::State) -> &str;
    /// State to payload.
    fn pack(state: &Self::State) -> Self::Payload;
    /// Payload to state, under the given name.
    fn unpack(name: &str, payload: Self::Payload) -> Self::State;
    /// The document written back on delete.
    fn reset() -> Self::Payload;
}

/// A singleton policy resource.
pub struct Policy<S>(PhantomData<S>);

impl<S: PolicySpec> Policy<S> {
    /// Constructor used by the registry.
    pub fn boxed() -> Box<dyn Resource> {
        Box::new(Self(PhantomData))
    }

    async fn fetch(&self, client: &ArtifactoryClient, name: &str) -> Result<Value, ProviderError> {
        let payload: S::Payload = client.get_json(S::PATH).await?;
        to_state(&S::unpack(name, payload))
    }

    async fn write(&self, client: &ArtifactoryClient, planned: Value) -> Result<Value, ProviderError> {
        let state: S::State = from_state(planned)?;
        client.put_json(S::PATH, &S::pack(&state)).await?;
        self.fetch(client, S::name(&state)).await
    }
}

#[async_trait]
impl<S: PolicySpec> Resource for Policy<S> {
    fn type_name(&self) -> &'static str {
        S::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        S::schema()
    }

    async fn create(&self, client: &ArtifactoryClient, planned: Value) -> Result<Value, ProviderError> {
        let state = self.write(client, planned).await?;
        info!(resource_type = S::TYPE_NAME, "Policy written");
        Ok(state)
    }

    async fn read(&self, client: &ArtifactoryClient, state: Value) -> Result<Value, ProviderError> {
        let state: S::State = from_state(state)?;
        self.fetch(client, S::name(&state)).await
    }

    async fn update(
        &self,
        client: &ArtifactoryClient,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        self.write(client, planned).await
    }

    async fn delete(&self, client: &ArtifactoryClient, _state: Value) -> Result<(), ProviderError> {
        client.put_json(S::PATH, &S::reset()).await?;
        info!(resource_type = S::TYPE_NAME, "Policy reset to defaults");
        Ok(())
    }

    async fn import(&self, client: &ArtifactoryClient, id: &str) -> Result<Value, ProviderError> {
        self.fetch(client, id).await
    }
}

fn name_attribute() -> Attribute {
    Attribute::required_string()
        .with_force_new()
        .with_description("Name of the resource. Only used for importing.")
        .with_validator(StringValidator::length_at_least(1))
}

fn required_int64() -> Attribute {
    Attribute::new(AttributeType::Int64, AttributeFlags::required())
}

/// Locks users out after repeated failed logins.
pub struct UserLockPolicySpec;

/// User lock policy state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLockPolicyState {
    /// Name used for import.
    pub name: String,
    /// Same as `name`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// Policy switch.
    pub enabled: bool,
    /// Failed logins before lockout.
    pub login_attempts: i64,
}

/// User lock policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLockPolicyPayload {
    /// Policy switch.
    pub enabled: bool,
    /// Failed logins before lockout.
    pub login_attempts: i64,
}

impl PolicySpec for UserLockPolicySpec {
    const TYPE_NAME: &'static str = "artifactory_user_lock_policy";
    const PATH: &'static str = "/artifactory/api/security/userLockPolicy";

    type State = UserLockPolicyState;
    type Payload = UserLockPolicyPayload;

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Manages the user lock policy.")
            .with_attribute("name", name_attribute())
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "enabled",
                Attribute::required_bool().with_description("Enable User Lock Policy."),
            )
            .with_attribute(
                "login_attempts",
                required_int64().with_description(
                    "Max failed login attempts before the user is locked out.",
                ),
            )
    }

    fn name(state: &Self::State) -> &str {
        &state.name
    }

    fn pack(state: &Self::State) -> Self::Payload {
        UserLockPolicyPayload {
            enabled: state.enabled,
            login_attempts: state.login_attempts,
        }
    }

    fn unpack(name: &str, payload: Self::Payload) -> Self::State {
        UserLockPolicyState {
            name: name.to_string(),
            id: name.to_string(),
            enabled: payload.enabled,
            login_attempts: payload.login_attempts,
        }
    }

    fn reset() -> Self::Payload {
        UserLockPolicyPayload {
            enabled: false,
            login_attempts: 5,
        }
    }
}

/// Forces periodic password changes.
pub struct PasswordExpirationPolicySpec;

/// Password expiration policy state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordExpirationPolicyState {
    /// Name used for import.
    pub name: String,
    /// Same as `name`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// Policy switch.
    pub enabled: bool,
    /// Days until a password expires.
    pub password_max_age: i64,
    /// Email users before their password expires.
    pub notify_by_email: bool,
}

/// Password expiration policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordExpirationPolicyPayload {
    /// Policy switch.
    pub enabled: bool,
    /// Days until a password expires.
    pub password_max_age: i64,
    /// Email users before their password expires.
    pub notify_by_email: bool,
}

impl PolicySpec for PasswordExpirationPolicySpec {
    const TYPE_NAME: &'static str = "artifactory_password_expiration_policy";
    const PATH: &'static str = "/artifactory/api/security/configuration/passwordExpirationPolicy";

    type State = PasswordExpirationPolicyState;
    type Payload = PasswordExpirationPolicyPayload;

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Manages the password expiration policy.")
            .with_attribute("name", name_attribute())
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "enabled",
                Attribute::required_bool().with_description("Enable the password expiration policy."),
            )
            .with_attribute(
                "password_max_age",
                required_int64().with_description("Number of days for password to expire."),
            )
            .with_attribute(
                "notify_by_email",
                Attribute::required_bool()
                    .with_description("Send mail notification before password expiration."),
            )
    }

    fn name(state: &Self::State) -> &str {
        &state.name
    }

    fn pack(state: &Self::State) -> Self::Payload {
        PasswordExpirationPolicyPayload {
            enabled: state.enabled,
            password_max_age: state.password_max_age,
            notify_by_email: state.notify_by_email,
        }
    }

    fn unpack(name: &str, payload: Self::Payload) -> Self::State {
        PasswordExpirationPolicyState {
            name: name.to_string(),
            id: name.to_string(),
            enabled: payload.enabled,
            password_max_age: payload.password_max_age,
            notify_by_email: payload.notify_by_email,
        }
    }

    fn reset() -> Self::Payload {
        PasswordExpirationPolicyPayload {
            enabled: false,
            password_max_age: 60,
            notify_by_email: true,
        }
    }
}

/// `artifactory_user_lock_policy`.
pub type UserLockPolicy = Policy<UserLockPolicySpec>;

/// `artifactory_password_expiration_policy`.
pub type PasswordExpirationPolicy = Policy<PasswordExpirationPolicySpec>;
