pub mod activation;
pub mod config;
pub mod direnv;
pub mod env;
pub mod error;
pub mod hook;
pub mod io;
pub mod manager;
pub mod paths;
pub mod registry;
pub mod shell;
pub mod state;
pub mod toml_update;
pub mod types;

pub use error::{Result, XenvError};
