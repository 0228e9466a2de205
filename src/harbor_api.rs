use super::config::Config;
use async_trait::async_trait;
use log::debug;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarborApiError {
    // The `#[from]` attribute generates `From<reqwest::Error> for HarborApiError`
    #[error("Request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Unauthorized: {0}")]
    UnauthorizedError(String),

    #[error("ApiStatusError: expected {expected}, got {status}: {body}")]
    ApiStatusError {
        expected: u16,
        status: u16,
        body: String,
    },
}

/// Sends a single request to the Harbor REST api.
///
/// Implementations resolve `path` against their base url, take care of
/// authentication and return the raw response body when the response status
/// equals `expected_status`. Any other status, or a transport failure, is an
/// error.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn send_request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
        expected_status: u16,
    ) -> Result<String, HarborApiError>;
}

#[derive(Debug)]
pub struct HarborApi {
    api_url: String,
    username: String,
    password: SecretString,
    client: reqwest::Client,
}

impl HarborApi {
    pub fn new(
        api_url: &str,
        username: &str,
        password: SecretString,
        insecure: bool,
    ) -> Result<Self, HarborApiError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .build()?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, HarborApiError> {
        Self::new(
            &config.url,
            &config.username,
            config.password.clone(),
            config.insecure,
        )
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_url, path))
            .basic_auth(&self.username, Some(self.password.expose_secret()))
    }
}

#[async_trait]
impl ApiClient for HarborApi {
    async fn send_request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
        expected_status: u16,
    ) -> Result<String, HarborApiError> {
        // Bodies carry registry credentials, only method and path are logged.
        debug!("Harbor request: {} {}", method, path);

        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let res = request.send().await?;
        if res.status().as_u16() == expected_status {
            Ok(res.text().await?)
        } else {
            Err(process_api_status_error_from_response(res, expected_status).await)
        }
    }
}

pub async fn process_api_status_error_from_response(
    res: reqwest::Response,
    expected: u16,
) -> HarborApiError {
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    if status == 401 {
        HarborApiError::UnauthorizedError(body)
    } else {
        HarborApiError::ApiStatusError {
            expected,
            status,
            body,
        }
    }
}
