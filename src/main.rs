use harbor_provider::config::{get_config, Command, Config};
use harbor_provider::harbor_api::HarborApi;
use harbor_provider::lifecycle;
use harbor_provider::resource_registry::{
    registry_schema, DeletePolicy, RegistryConfig, RegistryResource,
};
use harbor_provider::state::StateFile;
use harbor_provider::utils::initialize_logger;
use log::{error, info};
use std::fs;

extern crate log;

#[tokio::main]
async fn main() {
    let config = get_config();
    initialize_logger(config.log_level);

    if let Err(e) = run(config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let state_file = StateFile::new(config.state_file.clone());

    match &config.command {
        Command::Schema => print!("{}", registry_schema()),
        Command::Apply { file } => {
            let registry = RegistryConfig::from_yaml(&fs::read_to_string(file)?)?;
            let prior = state_file.load()?;
            let resource = RegistryResource::new(HarborApi::from_config(config)?);

            info!("Applying registry {} on {}", registry.name, config.url);
            let applied = match lifecycle::apply(&resource, &registry, prior).await {
                Ok(applied) => applied,
                Err(e) => {
                    if e.prior_destroyed {
                        state_file.remove()?;
                    }
                    return Err(e.into());
                }
            };
            state_file.save(&applied.state)?;
            info!(
                "Registry {} applied ({}), id: {}",
                registry.name,
                applied.action,
                applied.state.id().unwrap_or_default()
            );
        }
        Command::Refresh => {
            let Some(prior) = state_file.load()? else {
                return Err(format!("No state found in {}", state_file.path().display()).into());
            };
            let resource = RegistryResource::new(HarborApi::from_config(config)?);

            let state = lifecycle::refresh(&resource, prior).await?;
            state_file.save(&state)?;
            info!("Registry refreshed, id: {}", state.id().unwrap_or_default());
        }
        Command::Destroy { ignore_errors } => {
            let Some(prior) = state_file.load()? else {
                info!("Nothing to destroy");
                return Ok(());
            };
            let delete_policy = if *ignore_errors {
                DeletePolicy::IgnoreErrors
            } else {
                DeletePolicy::Propagate
            };
            let resource = RegistryResource::new(HarborApi::from_config(config)?)
                .with_delete_policy(delete_policy);

            lifecycle::destroy(&resource, &prior).await?;
            state_file.remove()?;
            info!("Registry {} destroyed", prior.id().unwrap_or_default());
        }
    }

    Ok(())
}
