use crate::schema::{PlanAction, Schema};
use crate::state::ResourceState;
use async_trait::async_trait;
use log::{debug, info, warn};
use thiserror::Error;

/// Lifecycle contract of a managed resource.
///
/// Every call receives the configuration and state it needs and returns the
/// new state; nothing is kept between calls.
#[async_trait]
pub trait Resource: Send + Sync {
    type Config: Send + Sync;
    type Error: std::error::Error + Send + Sync + 'static;

    fn schema(&self) -> Schema;

    /// State that would be recorded for `config` before talking to the server.
    fn desired_state(&self, config: &Self::Config) -> ResourceState;

    async fn create(&self, config: &Self::Config) -> Result<ResourceState, Self::Error>;

    async fn read(&self, state: ResourceState) -> Result<ResourceState, Self::Error>;

    async fn update(
        &self,
        config: &Self::Config,
        state: ResourceState,
    ) -> Result<ResourceState, Self::Error>;

    async fn delete(&self, state: &ResourceState) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub action: PlanAction,
    pub state: ResourceState,
}

/// Failed `apply`.
///
/// `prior_destroyed` is set when a replacement deleted the prior object but
/// could not create the new one: the prior state no longer exists remotely
/// and must be discarded.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct ApplyError<E: std::error::Error + 'static> {
    pub source: E,
    pub prior_destroyed: bool,
}

impl<E: std::error::Error + 'static> From<E> for ApplyError<E> {
    fn from(source: E) -> Self {
        Self {
            source,
            prior_destroyed: false,
        }
    }
}

/// Reconciles the remote object with `config`.
pub async fn apply<R: Resource>(
    resource: &R,
    config: &R::Config,
    prior: Option<ResourceState>,
) -> Result<Applied, ApplyError<R::Error>> {
    let desired = resource.desired_state(config);
    let action = resource.schema().plan(prior.as_ref(), &desired);
    info!("Plan: {}", action);

    let state = match (&action, prior) {
        (PlanAction::Update { .. }, Some(prior)) => resource.update(config, prior).await?,
        (PlanAction::Replace { .. }, Some(prior)) => {
            debug!("Destroying {:?} before recreating it", prior.id());
            resource.delete(&prior).await?;
            resource.create(config).await.map_err(|source| {
                warn!("{:?} was destroyed but its replacement failed", prior.id());
                ApplyError {
                    source,
                    prior_destroyed: true,
                }
            })?
        }
        (PlanAction::NoOp, Some(prior)) => resource.read(prior).await?,
        _ => resource.create(config).await?,
    };

    Ok(Applied { action, state })
}

/// Refreshes `prior` from the server.
pub async fn refresh<R: Resource>(resource: &R, prior: ResourceState) -> Result<ResourceState, R::Error> {
    resource.read(prior).await
}

/// Destroys the remote object tracked by `prior`.
pub async fn destroy<R: Resource>(resource: &R, prior: &ResourceState) -> Result<(), R::Error> {
    resource.delete(prior).await
}
