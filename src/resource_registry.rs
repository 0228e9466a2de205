use crate::harbor_api::{ApiClient, HarborApiError};
use crate::lifecycle::Resource;
use crate::schema::{Attribute, Schema};
use crate::state::ResourceState;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;
use url::form_urlencoded;

pub const PATH_REGISTRY: &str = "/api/registries";

pub const NAME: &str = "name";
pub const DESCRIPTION: &str = "description";
pub const PROVIDER_TYPE: &str = "provider_type";
pub const URL_ENDPOINT: &str = "url_endpoint";
pub const ACCESS_ID: &str = "access_id";
pub const ACCESS_SECRET: &str = "access_secret";

// Only credential type this resource manages
const CREDENTIAL_TYPE_BASIC: &str = "basic";

/// Schema of the registry resource.
pub fn registry_schema() -> Schema {
    Schema {
        attributes: vec![
            Attribute::required(NAME),
            Attribute::optional(DESCRIPTION, ""),
            Attribute::required(PROVIDER_TYPE).force_new(),
            Attribute::required(URL_ENDPOINT).force_new(),
            Attribute::required(ACCESS_ID),
            Attribute::required(ACCESS_SECRET).sensitive(),
        ],
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Api Error: ({0})")]
    ApiError(#[from] HarborApiError),

    #[error("Unable to unmarshal: {0}")]
    DeserializationError(String),

    #[error("Unable to marshal: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Registry not found: {0}")]
    NotFound(String),

    #[error("Registry has no id, it was never created")]
    MissingId,

    #[error("Cannot update {}, the registry must be replaced", .0.join(", "))]
    ReplacementRequired(Vec<String>),

    #[error("Invalid registry configuration: {0}")]
    ConfigError(String),
}

/// User supplied configuration of a registry.
#[derive(Debug)]
pub struct RegistryConfig {
    pub name: String,
    pub description: String,
    pub provider_type: String,
    pub url_endpoint: String,
    pub access_id: String,
    pub access_secret: SecretString,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryConfigFile {
    name: String,
    description: Option<String>,
    provider_type: String,
    url_endpoint: String,
    access_id: String,
    access_secret: String,
}

impl From<RegistryConfigFile> for RegistryConfig {
    fn from(file: RegistryConfigFile) -> Self {
        Self {
            name: file.name,
            description: file.description.unwrap_or_else(|| {
                registry_schema()
                    .attribute(DESCRIPTION)
                    .and_then(|a| a.default)
                    .unwrap_or_default()
                    .to_string()
            }),
            provider_type: file.provider_type,
            url_endpoint: file.url_endpoint,
            access_id: file.access_id,
            access_secret: SecretString::from(file.access_secret),
        }
    }
}

impl RegistryConfig {
    pub fn from_yaml(content: &str) -> Result<Self, RegistryError> {
        let file: RegistryConfigFile = serde_yaml::from_str(content)
            .map_err(|e| RegistryError::ConfigError(e.to_string()))?;
        Ok(file.into())
    }

    /// State the orchestration layer keeps for this configuration. The
    /// secret is only recorded as a fingerprint.
    pub fn desired_state(&self) -> ResourceState {
        let mut state = ResourceState::default();
        state.set(NAME, self.name.as_str());
        state.set(DESCRIPTION, self.description.as_str());
        state.set(PROVIDER_TYPE, self.provider_type.as_str());
        state.set(URL_ENDPOINT, self.url_endpoint.as_str());
        state.set(ACCESS_ID, self.access_id.as_str());
        state.set_fingerprint(ACCESS_SECRET, self.access_secret.expose_secret());
        state
    }
}

// Harbor sends `null` for unset strings
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn is_zero(id: &i64) -> bool {
    *id == 0
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub access_key: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub access_secret: String,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub credential_type: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key", &self.access_key)
            .field("access_secret", &"[REDACTED]")
            .field("credential_type", &self.credential_type)
            .finish()
    }
}

/// Wire representation of a Harbor registry.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub credential: Credential,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub insecure: bool,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub registry_type: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub description: String,

    // The update endpoint expects flat credential fields
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub access_key: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub access_secret: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub credential_type: String,
}

impl fmt::Debug for RegistryRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RegistryRecord")
            .field("credential", &self.credential)
            .field("id", &self.id)
            .field("name", &self.name)
            .field("url", &self.url)
            .field("insecure", &self.insecure)
            .field("registry_type", &self.registry_type)
            .field("description", &self.description)
            .field("access_key", &self.access_key)
            .field("access_secret", &"[REDACTED]")
            .field("credential_type", &self.credential_type)
            .finish()
    }
}

impl From<&RegistryConfig> for RegistryRecord {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            name: config.name.clone(),
            url: config.url_endpoint.clone(),
            insecure: false,
            registry_type: config.provider_type.clone(),
            description: config.description.clone(),
            credential: Credential {
                access_key: config.access_id.clone(),
                access_secret: config.access_secret.expose_secret().to_string(),
                credential_type: CREDENTIAL_TYPE_BASIC.to_string(),
            },
            ..Default::default()
        }
    }
}

/// What `delete` does when the remote call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Delete failures are returned to the caller.
    #[default]
    Propagate,
    /// Delete failures are logged and swallowed, `delete` always succeeds.
    /// Kept for configurations relying on the historical behavior.
    IgnoreErrors,
}

/// Manages the lifecycle of a Harbor registry through an `ApiClient`.
pub struct RegistryResource<C: ApiClient> {
    client: C,
    delete_policy: DeletePolicy,
}

impl<C: ApiClient> RegistryResource<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            delete_policy: DeletePolicy::default(),
        }
    }

    pub fn with_delete_policy(mut self, delete_policy: DeletePolicy) -> Self {
        self.delete_policy = delete_policy;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    // The remote object exists at this point, a failing read does not undo it.
    async fn read_after_write(
        &self,
        operation: &str,
        state: ResourceState,
    ) -> Result<ResourceState, RegistryError> {
        let name = state.get(NAME).unwrap_or_default().to_string();
        self.read(state).await.inspect_err(|e| {
            error!(
                "Registry {} was {} but reading it back failed: {}",
                name, operation, e
            )
        })
    }
}

fn registry_path(id: &str) -> String {
    format!("{}/{}", PATH_REGISTRY, id)
}

#[async_trait]
impl<C: ApiClient> Resource for RegistryResource<C> {
    type Config = RegistryConfig;
    type Error = RegistryError;

    fn schema(&self) -> Schema {
        registry_schema()
    }

    fn desired_state(&self, config: &RegistryConfig) -> ResourceState {
        config.desired_state()
    }

    async fn create(&self, config: &RegistryConfig) -> Result<ResourceState, RegistryError> {
        let body = serde_json::to_value(RegistryRecord::from(config))?;
        self.client
            .send_request(Method::POST, PATH_REGISTRY, Some(body), 201)
            .await?;
        info!("Registry {} created", config.name);

        self.read_after_write("created", config.desired_state())
            .await
    }

    async fn read(&self, mut state: ResourceState) -> Result<ResourceState, RegistryError> {
        let name = state
            .get(NAME)
            .ok_or_else(|| RegistryError::ConfigError(format!("missing {}", NAME)))?
            .to_string();
        let path = format!(
            "{}?name={}",
            PATH_REGISTRY,
            form_urlencoded::byte_serialize(name.as_bytes()).collect::<String>()
        );

        let body = self.client.send_request(Method::GET, &path, None, 200).await?;
        let records: Vec<RegistryRecord> = serde_json::from_str(&body)
            .map_err(|e| RegistryError::DeserializationError(e.to_string()))?;

        // The name filter is fuzzy. A tracked registry is only ever matched by
        // its id; the name is used for the first read after create.
        let record = match state.id() {
            Some(id) => records.iter().find(|r| r.id.to_string() == id),
            None => {
                if records.len() > 1 {
                    warn!(
                        "{} registries returned for name {}, using the exact match",
                        records.len(),
                        name
                    );
                }
                records
                    .iter()
                    .find(|r| r.name == name)
                    .or_else(|| records.first())
            }
        }
        .ok_or_else(|| RegistryError::NotFound(name.clone()))?;
        debug!("Registry {} read with id {}", record.name, record.id);

        state.set(DESCRIPTION, record.description.as_str());
        state.set(NAME, record.name.as_str());
        state.set_id(record.id.to_string());

        Ok(state)
    }

    async fn update(
        &self,
        config: &RegistryConfig,
        state: ResourceState,
    ) -> Result<ResourceState, RegistryError> {
        let id = state.id().ok_or(RegistryError::MissingId)?.to_string();

        let mut desired = config.desired_state();
        let replaced: Vec<String> = registry_schema()
            .force_new_attributes()
            .filter(|a| state.get(a.name).is_some_and(|prior| desired.get(a.name) != Some(prior)))
            .map(|a| a.name.to_string())
            .collect();
        if !replaced.is_empty() {
            return Err(RegistryError::ReplacementRequired(replaced));
        }

        let mut record = RegistryRecord::from(config);
        record.access_key = config.access_id.clone();
        record.access_secret = config.access_secret.expose_secret().to_string();
        let body = serde_json::to_value(record)?;

        self.client
            .send_request(Method::PUT, &registry_path(&id), Some(body), 200)
            .await?;
        info!("Registry {} ({}) updated", config.name, id);

        desired.set_id(id);
        self.read_after_write("updated", desired).await
    }

    async fn delete(&self, state: &ResourceState) -> Result<(), RegistryError> {
        let id = state.id().ok_or(RegistryError::MissingId)?;

        let result = self
            .client
            .send_request(Method::DELETE, &registry_path(id), None, 200)
            .await;

        match (result, self.delete_policy) {
            (Ok(_), _) => {
                info!("Registry {} deleted", id);
                Ok(())
            }
            (Err(e), DeletePolicy::IgnoreErrors) => {
                warn!("Ignoring failure deleting registry {}: {}", id, e);
                Ok(())
            }
            (Err(e), DeletePolicy::Propagate) => Err(e.into()),
        }
    }
}
