use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XenvError {
    #[error("{0} is not installed")]
    NotInstalled(String),

    #[error("{0} is not currently active")]
    NotActive(String),

    #[error("sdk '{0}' is not defined in config")]
    SdkNotDefined(String),

    #[error("invalid tool spec '{0}': expected name:version")]
    InvalidSpec(String),

    #[error("invalid environment variable name '{0}'")]
    InvalidEnvName(String),

    #[error("unknown config key '{0}': expected one of bin_dir, install_dir, shell_hooks_dir")]
    UnknownConfigKey(String),

    #[error("invalid session id '{0}': use letters, digits, '.', '-' or '_'")]
    InvalidSessionId(String),

    #[error("unsupported shell '{0}': expected one of bash, zsh, pwsh, cmd")]
    UnsupportedShell(String),

    #[error("failed to parse state file {path}: {message}")]
    StateParse { path: PathBuf, message: String },

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, XenvError>;
