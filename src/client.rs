//! HTTP client for the Artifactory REST API.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::config::Credential;
use crate::error::ProviderError;

/// Header carrying a (deprecated) Artifactory API key, `X-JFrog-Art-Api`.
pub const API_KEY_HEADER: &str = "x-jfrog-art-api";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A client bound to one Artifactory instance.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ArtifactoryClient {
    http: Client,
    base_url: String,
    product_id: String,
}

impl ArtifactoryClient {
    /// Build an unauthenticated client for `url`.
    ///
    /// Only `http` and `https` URLs are accepted. Request paths are platform
    /// paths (`/artifactory/api/...`, `/access/api/...`), so a trailing `/` and
    /// a trailing `/artifactory` segment are dropped from `url`.
    pub fn build(url: &str, product_id: &str) -> Result<Self, ProviderError> {
        let parsed = Url::parse(url)
            .map_err(|e| ProviderError::Configuration(format!("invalid URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProviderError::Configuration(format!(
                "URL '{}' must use http or https",
                url
            )));
        }

        Ok(Self {
            http: http_client(product_id, HeaderMap::new())?,
            base_url: platform_url(url),
            product_id: product_id.to_string(),
        })
    }

    /// Return a copy of this client that sends `credential` on every request.
    ///
    /// Access tokens go in `Authorization: Bearer`, API keys in
    /// `X-JFrog-Art-Api`.
    pub fn with_auth(&self, credential: &Credential) -> Result<Self, ProviderError> {
        let (name, value) = match credential {
            Credential::AccessToken(token) => (AUTHORIZATION, format!("Bearer {}", token)),
            Credential::ApiKey(key) => (HeaderName::from_static(API_KEY_HEADER), key.clone()),
        };
        let mut value = HeaderValue::from_str(&value).map_err(|_| {
            ProviderError::Configuration(format!(
                "{} contains characters that are not allowed in an HTTP header",
                credential.kind()
            ))
        })?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(name, value);

        Ok(Self {
            http: http_client(&self.product_id, headers)?,
            base_url: self.base_url.clone(),
            product_id: self.product_id.clone(),
        })
    }

    /// The server URL without a trailing `/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a server-relative path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Start a request; the caller adds a body or query and calls [`send`](Self::send).
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Send a request, mapping non-2xx statuses to errors.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ProviderError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "Artifactory request completed");

        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::from_status(status.as_u16(), body))
        }
    }

    /// `GET` a JSON document.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let response = self.send(self.request(Method::GET, path)).await?;
        decode_body(response).await
    }

    /// `GET` a JSON document with query parameters. Empty values are skipped.
    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let query: Vec<_> = query.iter().filter(|(_, v)| !v.is_empty()).collect();
        let response = self
            .send(self.request(Method::GET, path).query(&query))
            .await?;
        decode_body(response).await
    }

    /// `PUT` a JSON body, ignoring the response body.
    pub async fn put_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ProviderError> {
        self.send(self.request(Method::PUT, path).json(body)).await?;
        Ok(())
    }

    /// `POST` a JSON body, ignoring the response body.
    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ProviderError> {
        self.send(self.request(Method::POST, path).json(body)).await?;
        Ok(())
    }

    /// `POST` a JSON body and decode the JSON response.
    pub async fn post_json_for<B, T>(&self, path: &str, body: &B) -> Result<T, ProviderError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::POST, path).json(body)).await?;
        decode_body(response).await
    }

    /// `PATCH` a JSON body, ignoring the response body.
    pub async fn patch_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ProviderError> {
        self.send(self.request(Method::PATCH, path).json(body)).await?;
        Ok(())
    }

    /// `DELETE` a path.
    pub async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }
}

fn platform_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    trimmed
        .strip_suffix("/artifactory")
        .unwrap_or(trimmed)
        .to_string()
}

fn http_client(product_id: &str, mut headers: HeaderMap) -> Result<Client, ProviderError> {
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    Client::builder()
        .user_agent(product_id)
        .timeout(REQUEST_TIMEOUT)
        .default_headers(headers)
        .build()
        .map_err(ProviderError::from)
}

async fn decode_body<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_build_rejects_bad_urls() {
        assert!(matches!(
            ArtifactoryClient::build("not a url", "test/0.1"),
            Err(ProviderError::Configuration(_))
        ));
        assert!(matches!(
            ArtifactoryClient::build("ftp://x.example", "test/0.1"),
            Err(ProviderError::Configuration(_))
        ));
    }

    #[test]
    fn test_build_normalizes_platform_url() {
        let client = ArtifactoryClient::build("https://x.example/artifactory/", "test/0.1").unwrap();
        assert_eq!(client.base_url(), "https://x.example");
        assert_eq!(
            client.url("/artifactory/api/system/version"),
            "https://x.example/artifactory/api/system/version"
        );

        let client = ArtifactoryClient::build("http://localhost:8082/", "test/0.1").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8082");

        let client = ArtifactoryClient::build("https://x.example/proxy", "test/0.1").unwrap();
        assert_eq!(client.base_url(), "https://x.example/proxy");
    }

    #[test]
    fn test_with_auth_rejects_unencodable_values() {
        let client = ArtifactoryClient::build("https://x.example", "test/0.1").unwrap();
        let result = client.with_auth(&Credential::AccessToken("bad\ntoken".to_string()));
        assert!(matches!(result, Err(ProviderError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_bearer_header_and_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/system/version"))
            .and(header("authorization", "Bearer t0k3n"))
            .and(header("user-agent", "test/0.1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "7.77.3"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ArtifactoryClient::build(&server.uri(), "test/0.1")
            .unwrap()
            .with_auth(&Credential::AccessToken("t0k3n".to_string()))
            .unwrap();
        let body: Value = client.get_json("/artifactory/api/system/version").await.unwrap();
        assert_eq!(body["version"], "7.77.3");
    }

    #[tokio::test]
    async fn test_api_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/artifactory/api/security/groups/devs"))
            .and(header(API_KEY_HEADER, "k1"))
            .and(body_json(json!({"name": "devs"})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = ArtifactoryClient::build(&server.uri(), "test/0.1")
            .unwrap()
            .with_auth(&Credential::ApiKey("k1".to_string()))
            .unwrap();
        client
            .put_json("/artifactory/api/security/groups/devs", &json!({"name": "devs"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        for (status, route) in [(404u16, "/missing"), (403, "/forbidden"), (409, "/conflict"), (503, "/down")] {
            Mock::given(path(route))
                .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
                .mount(&server)
                .await;
        }

        let client = ArtifactoryClient::build(&server.uri(), "test/0.1").unwrap();
        assert!(client.delete("/missing").await.unwrap_err().is_not_found());
        assert!(matches!(
            client.get_json::<Value>("/forbidden").await,
            Err(ProviderError::PermissionDenied(body)) if body == "nope"
        ));
        assert!(matches!(
            client.post_json("/conflict", &json!({})).await,
            Err(ProviderError::AlreadyExists(_))
        ));
        assert!(matches!(
            client.patch_json("/down", &json!({})).await,
            Err(ProviderError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_query_skips_empty_values() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/repositories"))
            .and(query_param("type", "local"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = ArtifactoryClient::build(&server.uri(), "test/0.1").unwrap();
        let repos: Vec<Value> = client
            .get_json_with_query(
                "/artifactory/api/repositories",
                &[("type", "local"), ("packageType", "")],
            )
            .await
            .unwrap();
        assert!(repos.is_empty());
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].url.query(), Some("type=local"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_serialization_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = ArtifactoryClient::build(&server.uri(), "test/0.1").unwrap();
        assert!(matches!(
            client.get_json::<Value>("/artifactory/api/system/version").await,
            Err(ProviderError::Serialization(_))
        ));
    }
}
