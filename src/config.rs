//! Provider block configuration and connection parameter resolution.
//!
//! The provider block, the process environment and an optional OIDC token
//! exchange each may supply the URL and credential. Resolution goes through
//! [`resolve_url`] and [`resolve_credential`], which list their sources in
//! priority order so the precedence can be read (and tested) in one place.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, StringValidator};

/// URL environment variables, checked in order.
pub const URL_ENV_VARS: [&str; 2] = ["JFROG_URL", "ARTIFACTORY_URL"];

/// Access token environment variables, checked in order.
pub const ACCESS_TOKEN_ENV_VARS: [&str; 2] = ["JFROG_ACCESS_TOKEN", "ARTIFACTORY_ACCESS_TOKEN"];

/// Environment variable holding the workload identity token used for OIDC exchange.
pub const OIDC_ID_TOKEN_ENV_VAR: &str = "TFC_WORKLOAD_IDENTITY_TOKEN";

const API_KEY_DEPRECATION: &str = "An upcoming version will support the option to block the \
usage/creation of API Keys (for admins to set on their platform). API Keys will be deprecated \
all together and the option to use them will no longer be available. See the JFrog API key \
deprecation process for more details.";

/// Source of environment variables.
///
/// Production code reads the process environment; tests supply a fixed map.
pub trait Environment: Send + Sync {
    /// Look up a variable. Unset and non-unicode values are `None`.
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed set of variables.
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment(HashMap<String, String>);

impl StaticEnvironment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl Environment for StaticEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// The provider block as written by the user.
///
/// Empty strings are treated the same as absent values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Artifactory URL.
    pub url: Option<String>,
    /// Access token (bearer).
    pub access_token: Option<String>,
    /// Deprecated API key.
    pub api_key: Option<String>,
    /// Name of the OIDC integration configured on the platform.
    pub oidc_provider_name: Option<String>,
    /// Whether to check the license tier while configuring. Defaults to `true`.
    pub check_license: Option<bool>,
}

impl ProviderConfig {
    /// Decode the provider block. A null block is an empty configuration.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// The configured URL, if non-empty.
    pub fn url(&self) -> Option<&str> {
        non_empty(self.url.as_deref())
    }

    /// The configured access token, if non-empty.
    pub fn access_token(&self) -> Option<&str> {
        non_empty(self.access_token.as_deref())
    }

    /// The configured API key, if non-empty.
    pub fn api_key(&self) -> Option<&str> {
        non_empty(self.api_key.as_deref())
    }

    /// The configured OIDC provider name, if non-empty.
    pub fn oidc_provider_name(&self) -> Option<&str> {
        non_empty(self.oidc_provider_name.as_deref())
    }

    /// Whether the license preflight check runs.
    pub fn check_license(&self) -> bool {
        self.check_license.unwrap_or(true)
    }

    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Manage JFrog Artifactory repositories, users, groups and security settings.")
            .with_attribute(
                "url",
                Attribute::optional_string()
                    .with_description("Artifactory URL.")
                    .with_validator(StringValidator::url_http_or_https()),
            )
            .with_attribute(
                "access_token",
                Attribute::optional_string()
                    .sensitive()
                    .with_description(
                        "Access token given by an admin under `User Management -> Access Tokens`. \
                         If not set, the 'api_key' attribute value will be used.",
                    )
                    .with_validator(StringValidator::length_at_least(1)),
            )
            .with_attribute(
                "api_key",
                Attribute::optional_string()
                    .sensitive()
                    .with_description(
                        "API key. If `access_token` attribute, `JFROG_ACCESS_TOKEN` or \
                         `ARTIFACTORY_ACCESS_TOKEN` environment variable is set, the provider \
                         will ignore this attribute.",
                    )
                    .with_deprecation(API_KEY_DEPRECATION),
            )
            .with_attribute(
                "oidc_provider_name",
                Attribute::optional_string()
                    .with_description("OIDC provider name configured in the JFrog platform.")
                    .with_validator(StringValidator::length_at_least(1)),
            )
            .with_attribute(
                "check_license",
                Attribute::optional_bool().with_description(
                    "Toggle for pre-flight checking of Artifactory Pro and Enterprise license. \
                     Default to `true`.",
                ),
            )
    }
}

/// The credential attached to every request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Sent as `Authorization: Bearer <token>`.
    AccessToken(String),
    /// Sent as `X-JFrog-Art-Api: <key>`.
    ApiKey(String),
}

impl Credential {
    /// Short name of the credential kind, safe to log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccessToken(_) => "access_token",
            Self::ApiKey(_) => "api_key",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential::{}(<redacted>)", self.kind())
    }
}

/// Return the first candidate holding a non-empty value.
pub fn first_non_empty<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
}

/// The first non-empty value among the given environment variables.
pub fn env_first(env: &dyn Environment, keys: &[&str]) -> Option<String> {
    first_non_empty(keys.iter().map(|key| env.var(key)))
}

/// Resolve the server URL: the provider block wins over `JFROG_URL`, which wins
/// over `ARTIFACTORY_URL`.
pub fn resolve_url(config: &ProviderConfig, env: &dyn Environment) -> Option<String> {
    first_non_empty(
        std::iter::once(config.url().map(str::to_owned))
            .chain(URL_ENV_VARS.iter().map(|key| env.var(key))),
    )
}

/// Resolve the credential.
///
/// Access tokens, highest priority first: provider block `access_token`, the
/// token obtained by OIDC exchange, `JFROG_ACCESS_TOKEN`,
/// `ARTIFACTORY_ACCESS_TOKEN`. Any access token beats the provider block
/// `api_key`. Returns `None` when nothing resolves.
pub fn resolve_credential(
    config: &ProviderConfig,
    oidc_token: Option<&str>,
    env: &dyn Environment,
) -> Option<Credential> {
    let access_token = first_non_empty(
        [
            config.access_token().map(str::to_owned),
            oidc_token.map(str::to_owned),
        ]
        .into_iter()
        .chain(ACCESS_TOKEN_ENV_VARS.iter().map(|key| env.var(key))),
    );

    access_token
        .map(Credential::AccessToken)
        .or_else(|| config.api_key().map(|key| Credential::ApiKey(key.to_owned())))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use serde_json::json;

    fn config(value: Value) -> ProviderConfig {
        ProviderConfig::from_value(value).unwrap()
    }

    #[test]
    fn test_from_value() {
        let cfg = config(json!({
            "url": "https://x.example/artifactory",
            "api_key": "k1",
            "check_license": false
        }));
        assert_eq!(cfg.url(), Some("https://x.example/artifactory"));
        assert_eq!(cfg.api_key(), Some("k1"));
        assert!(!cfg.check_license());

        let cfg = config(Value::Null);
        assert_eq!(cfg, ProviderConfig::default());
        assert!(cfg.check_license());
    }

    #[test]
    fn test_from_value_rejects_wrong_types() {
        assert!(ProviderConfig::from_value(json!({"check_license": "yes"})).is_err());
    }

    #[test]
    fn test_empty_strings_are_unset() {
        let cfg = config(json!({"url": "", "access_token": "", "oidc_provider_name": ""}));
        assert_eq!(cfg.url(), None);
        assert_eq!(cfg.access_token(), None);
        assert_eq!(cfg.oidc_provider_name(), None);
    }

    #[test]
    fn test_resolve_url_missing_everywhere() {
        let env = StaticEnvironment::new();
        assert_eq!(resolve_url(&config(json!({})), &env), None);

        let env = StaticEnvironment::new()
            .with("JFROG_URL", "")
            .with("ARTIFACTORY_URL", "");
        assert_eq!(resolve_url(&config(json!({"url": ""})), &env), None);
    }

    #[test]
    fn test_resolve_url_config_overrides_env() {
        let env = StaticEnvironment::new()
            .with("JFROG_URL", "https://jfrog.example")
            .with("ARTIFACTORY_URL", "https://artifactory.example");
        let cfg = config(json!({"url": "https://config.example"}));
        assert_eq!(
            resolve_url(&cfg, &env).as_deref(),
            Some("https://config.example")
        );
    }

    #[test]
    fn test_resolve_url_env_order() {
        let env = StaticEnvironment::new()
            .with("JFROG_URL", "https://jfrog.example")
            .with("ARTIFACTORY_URL", "https://artifactory.example");
        assert_eq!(
            resolve_url(&config(json!({})), &env).as_deref(),
            Some("https://jfrog.example")
        );

        let env = StaticEnvironment::new().with("ARTIFACTORY_URL", "https://artifactory.example");
        assert_eq!(
            resolve_url(&config(json!({})), &env).as_deref(),
            Some("https://artifactory.example")
        );
    }

    #[test]
    fn test_resolve_credential_env_token_only() {
        let env = StaticEnvironment::new().with("ARTIFACTORY_ACCESS_TOKEN", "env-token");
        assert_eq!(
            resolve_credential(&config(json!({})), None, &env),
            Some(Credential::AccessToken("env-token".to_string()))
        );
    }

    #[test]
    fn test_resolve_credential_jfrog_env_wins_over_artifactory_env() {
        let env = StaticEnvironment::new()
            .with("JFROG_ACCESS_TOKEN", "jfrog")
            .with("ARTIFACTORY_ACCESS_TOKEN", "artifactory");
        assert_eq!(
            resolve_credential(&config(json!({})), None, &env),
            Some(Credential::AccessToken("jfrog".to_string()))
        );
    }

    #[test]
    fn test_resolve_credential_precedence() {
        let env = StaticEnvironment::new().with("JFROG_ACCESS_TOKEN", "env-token");

        let cfg = config(json!({"access_token": "config-token", "api_key": "k1"}));
        assert_eq!(
            resolve_credential(&cfg, Some("oidc-token"), &env),
            Some(Credential::AccessToken("config-token".to_string()))
        );

        let cfg = config(json!({"api_key": "k1"}));
        assert_eq!(
            resolve_credential(&cfg, Some("oidc-token"), &env),
            Some(Credential::AccessToken("oidc-token".to_string()))
        );

        assert_eq!(
            resolve_credential(&cfg, None, &env),
            Some(Credential::AccessToken("env-token".to_string()))
        );

        assert_eq!(
            resolve_credential(&cfg, None, &StaticEnvironment::new()),
            Some(Credential::ApiKey("k1".to_string()))
        );
    }

    #[test]
    fn test_resolve_credential_missing() {
        let cfg = config(json!({"access_token": "", "api_key": ""}));
        assert_eq!(
            resolve_credential(&cfg, Some(""), &StaticEnvironment::new()),
            None
        );
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let rendered = format!("{:?}", Credential::ApiKey("secret".to_string()));
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("api_key"));
    }

    #[test]
    fn test_schema_validation() {
        let schema = ProviderConfig::schema();
        assert!(schema.attribute("access_token").unwrap().flags.sensitive);
        assert!(schema.attribute("api_key").unwrap().deprecation_message.is_some());

        let diagnostics = validate(&schema, &json!({"url": "ftp://x.example"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("url"));

        let diagnostics = validate(&schema, &json!({"oidc_provider_name": ""}));
        assert_eq!(diagnostics.len(), 1);
    }
}
