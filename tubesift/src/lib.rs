pub mod auth;
pub mod cli;
pub mod load_config;
pub mod logging;
pub mod probe;
pub mod youtube;

pub use cli::{run, Cli, Commands};
