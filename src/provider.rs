//! The Artifactory provider: configuration handshake and dispatch to the
//! registered resources and data sources.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::client::ArtifactoryClient;
use crate::config::{
    resolve_credential, resolve_url, Environment, ProcessEnvironment, ProviderConfig, OIDC_ID_TOKEN_ENV_VAR,
};
use crate::error::ProviderError;
use crate::plan;
use crate::preflight::{self, ALLOWED_LICENSE_TIERS, USAGE_FEATURE};
use crate::registry;
use crate::resources::{DataSource, Resource};
use crate::schema::{Diagnostic, Diagnostics, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

/// Product id sent as `User-Agent` and in usage reports.
pub const PRODUCT_ID: &str = concat!("hemmer-provider-artifactory/", env!("CARGO_PKG_VERSION"));

/// Everything a resource call needs, built once by a successful configure.
#[derive(Debug)]
pub struct ProviderMetadata {
    /// Authenticated client.
    pub client: ArtifactoryClient,
    /// Product id reported to the server.
    pub product_id: String,
    /// Server version, empty if it could not be read.
    pub artifactory_version: String,
}

/// Provider for JFrog Artifactory.
pub struct ArtifactoryProvider {
    metadata: RwLock<Option<Arc<ProviderMetadata>>>,
    env: Arc<dyn Environment>,
}

impl Default for ArtifactoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactoryProvider {
    /// A provider reading the process environment.
    pub fn new() -> Self {
        Self::with_environment(ProcessEnvironment)
    }

    /// A provider reading variables from `env`.
    pub fn with_environment(env: impl Environment + 'static) -> Self {
        Self {
            metadata: RwLock::new(None),
            env: Arc::new(env),
        }
    }

    /// The metadata installed by the last successful configure.
    pub async fn configured(&self) -> Option<Arc<ProviderMetadata>> {
        self.metadata.read().await.clone()
    }

    async fn client(&self) -> Result<ArtifactoryClient, ProviderError> {
        self.configured()
            .await
            .map(|metadata| metadata.client.clone())
            .ok_or_else(|| ProviderError::FailedPrecondition("provider is not configured".to_string()))
    }

    /// Resolve connection parameters, authenticate and run the preflight
    /// checks. Fatal problems come back as the error diagnostic, warnings
    /// are appended to `diagnostics`.
    async fn connect(
        &self,
        config: &ProviderConfig,
        diagnostics: &mut Diagnostics,
    ) -> Result<ProviderMetadata, Diagnostic> {
        let env = self.env.as_ref();

        let url = resolve_url(config, env).ok_or_else(|| {
            Diagnostic::error("Missing URL Configuration").with_detail(
                "Set the url attribute in the provider block, or the JFROG_URL or ARTIFACTORY_URL \
                 environment variable.",
            )
        })?;

        let client = ArtifactoryClient::build(&url, PRODUCT_ID).map_err(|e| {
            Diagnostic::error("Error creating HTTP client")
                .with_detail(e.to_string())
                .with_attribute("url")
        })?;

        let oidc_token = match config.oidc_provider_name() {
            Some(provider_name) => Some(self.exchange_oidc_token(&client, provider_name).await?),
            None => None,
        };

        let credential = resolve_credential(config, oidc_token.as_deref(), env).ok_or_else(|| {
            Diagnostic::error("Missing JFrog API key or Access Token").with_detail(
                "Set access_token (or the deprecated api_key) in the provider block, configure \
                 oidc_provider_name, or set JFROG_ACCESS_TOKEN or ARTIFACTORY_ACCESS_TOKEN.",
            )
        })?;

        info!(url = %client.base_url(), credential = credential.kind(), "Configuring Artifactory provider");

        let client = client
            .with_auth(&credential)
            .map_err(|e| Diagnostic::error("Error adding Auth to HTTP client").with_detail(e.to_string()))?;

        if config.check_license() {
            preflight::check_license(&client, &ALLOWED_LICENSE_TIERS)
                .await
                .map_err(|e| {
                    Diagnostic::error("Error checking Artifactory license").with_detail(e.to_string())
                })?;
        } else {
            debug!("License check disabled");
        }

        let artifactory_version = match preflight::get_version(&client).await {
            Ok(version) => version,
            Err(e) => {
                warn!(error = %e, "Could not read the Artifactory version");
                diagnostics.push(
                    Diagnostic::warning("Error getting Artifactory version").with_detail(e.to_string()),
                );
                String::new()
            },
        };

        preflight::send_usage(&client, PRODUCT_ID, &[USAGE_FEATURE]);

        Ok(ProviderMetadata {
            client,
            product_id: PRODUCT_ID.to_string(),
            artifactory_version,
        })
    }

    async fn exchange_oidc_token(
        &self,
        client: &ArtifactoryClient,
        provider_name: &str,
    ) -> Result<String, Diagnostic> {
        let failed = |detail: String| {
            Diagnostic::error("Failed OIDC ID token exchange")
                .with_detail(detail)
                .with_attribute("oidc_provider_name")
        };

        let id_token = self
            .env
            .var(OIDC_ID_TOKEN_ENV_VAR)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| failed(format!("{} is not set", OIDC_ID_TOKEN_ENV_VAR)))?;

        preflight::oidc_token_exchange(client, &id_token, provider_name)
            .await
            .map_err(|e| failed(e.to_string()))
    }
}

fn resource(resource_type: &str) -> Result<Box<dyn Resource>, ProviderError> {
    registry::resource(resource_type).ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
}

fn data_source(data_source_type: &str) -> Result<Box<dyn DataSource>, ProviderError> {
    registry::data_source(data_source_type)
        .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
}

#[async_trait]
impl ProviderService for ArtifactoryProvider {
    fn schema(&self) -> ProviderSchema {
        registry::provider_schema()
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&ProviderConfig::schema(), &config))
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = Diagnostics::new();
        let connected = match ProviderConfig::from_value(config) {
            Ok(config) => self.connect(&config, &mut diagnostics).await,
            Err(err) => Err(Diagnostic::error("Invalid provider configuration").with_detail(err.to_string())),
        };

        let installed = match connected {
            Ok(metadata) => {
                info!(version = %metadata.artifactory_version, "Artifactory provider configured");
                Some(Arc::new(metadata))
            },
            Err(diagnostic) => {
                warn!(summary = %diagnostic.summary, "Artifactory provider configuration failed");
                diagnostics.push(diagnostic);
                None
            },
        };
        *self.metadata.write().await = installed;

        Ok(diagnostics.into_vec())
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.metadata.write().await.take();
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(resource(resource_type)?.validate(&config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = resource(resource_type)?;
        plan::plan(&resource.schema(), prior_state, proposed_state)
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = resource(resource_type)?;
        resource.create(&self.client().await?, planned_state).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = resource(resource_type)?;
        match resource.read(&self.client().await?, current_state).await {
            Err(e) if e.is_not_found() => {
                info!(resource_type, "Resource no longer exists, removing from state");
                Ok(Value::Null)
            },
            other => other,
        }
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = resource(resource_type)?;
        resource
            .update(&self.client().await?, prior_state, planned_state)
            .await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = resource(resource_type)?;
        resource.delete(&self.client().await?, current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = resource(resource_type)?;
        let state = resource.import(&self.client().await?, id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(data_source(data_source_type)?.validate(&config))
    }

    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        let data_source = data_source(data_source_type)?;
        data_source.read(&self.client().await?, config).await
    }
}
