//! # docbot-app — Terminal front end
//!
//! Wires configuration, services and a [`docbot_collab::CollabSession`]
//! into an interactive loop. The `docbot-relay` binary in `src/bin` runs the
//! reference relay from the same configuration file.

pub mod app;
pub mod command;
pub mod config;
pub mod view;

pub use app::{App, Flow};
pub use config::AppConfig;

/// Initialise `env_logger` with `RUST_LOG`, falling back to `default_filter`.
pub fn init_logging(default_filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}
