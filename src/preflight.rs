//! Calls made while configuring the provider, before any resource operation.

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::client::ArtifactoryClient;
use crate::error::ProviderError;

/// License tiers the provider works with. Matched as substrings of the
/// reported type, so "Enterprise Plus" is accepted.
pub const ALLOWED_LICENSE_TIERS: [&str; 3] = ["Enterprise", "Commercial", "Edge"];

/// Feature id reported in usage telemetry.
pub const USAGE_FEATURE: &str = "Hemmer";

const OIDC_TOKEN_PATH: &str = "/access/api/v1/oidc/token";
const LICENSES_PATH: &str = "/artifactory/api/system/licenses";
const VERSION_PATH: &str = "/artifactory/api/system/version";
const USAGE_PATH: &str = "/artifactory/api/system/usage";

#[derive(Debug, Serialize)]
struct OidcTokenRequest<'a> {
    grant_type: &'a str,
    subject_token_type: &'a str,
    subject_token: &'a str,
    provider_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct OidcTokenResponse {
    #[serde(default)]
    access_token: String,
}

/// Exchange a workload identity token for an Artifactory access token.
pub async fn oidc_token_exchange(
    client: &ArtifactoryClient,
    id_token: &str,
    provider_name: &str,
) -> Result<String, ProviderError> {
    let request = OidcTokenRequest {
        grant_type: "urn:ietf:params:oauth:grant-type:token-exchange",
        subject_token_type: "urn:ietf:params:oauth:token-type:id_token",
        subject_token: id_token,
        provider_name,
    };
    let response: OidcTokenResponse = client.post_json_for(OIDC_TOKEN_PATH, &request).await?;
    if response.access_token.is_empty() {
        return Err(ProviderError::Configuration(format!(
            "OIDC provider '{}' returned no access token",
            provider_name
        )));
    }
    debug!(provider_name, "OIDC token exchange succeeded");
    Ok(response.access_token)
}

#[derive(Debug, Deserialize)]
struct LicenseEntry {
    #[serde(rename = "type", default)]
    license_type: String,
}

/// Either a single-node license or the license list of an HA cluster.
#[derive(Debug, Deserialize)]
struct LicensesResponse {
    #[serde(rename = "type")]
    license_type: Option<String>,
    licenses: Option<Vec<LicenseEntry>>,
}

impl LicensesResponse {
    fn license_type(&self) -> Option<&str> {
        match (&self.license_type, &self.licenses) {
            (Some(license_type), _) => Some(license_type.as_str()),
            (None, Some(licenses)) => licenses.first().map(|l| l.license_type.as_str()),
            (None, None) => None,
        }
    }
}

/// Fetch the license type and check it against `allowed_tiers`.
///
/// Returns the license type on success.
pub async fn check_license(
    client: &ArtifactoryClient,
    allowed_tiers: &[&str],
) -> Result<String, ProviderError> {
    let response: LicensesResponse = client.get_json(LICENSES_PATH).await?;
    let license_type = response.license_type().unwrap_or_default();

    if allowed_tiers.iter().any(|tier| license_type.contains(tier)) {
        debug!(license_type, "License check passed");
        Ok(license_type.to_string())
    } else {
        Err(ProviderError::FailedPrecondition(format!(
            "Artifactory requires one of the license types {} to work with Hemmer, found '{}'",
            allowed_tiers.join(", "),
            license_type
        )))
    }
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

/// Fetch the Artifactory version string.
pub async fn get_version(client: &ArtifactoryClient) -> Result<String, ProviderError> {
    let response: VersionResponse = client.get_json(VERSION_PATH).await?;
    Ok(response.version)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UsageFeature {
    feature_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UsageReport {
    product_id: String,
    features: Vec<UsageFeature>,
}

/// Report usage in the background. The outcome is only logged.
pub fn send_usage(client: &ArtifactoryClient, product_id: &str, features: &[&str]) -> JoinHandle<()> {
    let client = client.clone();
    let report = UsageReport {
        product_id: product_id.to_string(),
        features: features
            .iter()
            .map(|f| UsageFeature {
                feature_id: f.to_string(),
            })
            .collect(),
    };

    tokio::spawn(async move {
        match client.post_json(USAGE_PATH, &report).await {
            Ok(()) => debug!("Usage report sent"),
            Err(e) => debug!(error = %e, "Usage report failed"),
        }
    })
}
