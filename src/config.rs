use clap::{Parser, Subcommand};
use log::LevelFilter;
use once_cell::sync::Lazy;
use secrecy::SecretString;
use std::convert::Infallible;
use std::path::PathBuf;

// Returns a reference to a lazily created Config object.
static CONFIG: Lazy<Config> = Lazy::new(|| {
    if cfg!(test) {
        Config {
            log_level: LevelFilter::Error,
            url: String::from("http://127.0.0.1:8080"),
            username: String::from("admin"),
            password: SecretString::from(String::from("Harbor12345")),
            insecure: false,
            state_file: PathBuf::from("/tmp/test/registry.state.json"),
            command: Command::Refresh,
        }
    } else {
        Config::parse()
    }
});

pub fn get_config() -> &'static Config {
    &CONFIG
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Log level (error, warn, info, debug and trace), defaults to info
    #[arg(short, long, default_value("info"), env("LOG_LEVEL"))]
    pub log_level: LevelFilter,

    /// Harbor base url, e.g. https://harbor.example.com
    #[arg(long, env("HARBOR_URL"))]
    pub url: String,

    #[arg(long, default_value("admin"), env("HARBOR_USERNAME"))]
    pub username: String,

    #[arg(long, env("HARBOR_PASSWORD"), hide_env_values = true, value_parser = parse_secret)]
    pub password: SecretString,

    /// Accept invalid TLS certificates
    #[arg(long, default_value_t = false, env("HARBOR_INSECURE"))]
    pub insecure: bool,

    /// Where the state of the managed registry is kept
    #[arg(
        long,
        default_value("registry.state.json"),
        env("HARBOR_STATE_FILE")
    )]
    pub state_file: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

fn parse_secret(value: &str) -> Result<SecretString, Infallible> {
    Ok(SecretString::from(value.to_string()))
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Creates, updates or replaces the registry described in a yaml file
    Apply {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Reads the registry back from Harbor into the state file
    Refresh,
    /// Deletes the registry and its state file
    Destroy {
        /// Report success even if Harbor refuses the deletion
        #[arg(long)]
        ignore_errors: bool,
    },
    /// Prints the registry schema
    Schema,
}
