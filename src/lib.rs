pub mod config;
pub mod harbor_api;
pub mod lifecycle;
pub mod resource_registry;
pub mod schema;
pub mod state;
pub mod utils;

extern crate log;

#[cfg(test)]
mod test_utils;
