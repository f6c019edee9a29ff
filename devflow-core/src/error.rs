//! Error types and result aliases.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error in {context}: {error}")]
    Toml {
        error: toml::de::Error,
        context: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to run '{command}': {message}")]
    Spawn { command: String, message: String },

    #[error("Command '{command}' exited with {}", describe_code(.code))]
    NonZeroExit { command: String, code: Option<i32> },

    #[error("Interrupted while running '{command}'")]
    Interrupted { command: String },

    #[error("Invalid ignore pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Watcher error: {0}")]
    Watch(String),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Toml {
            error,
            context: "devflow.toml".to_string(),
        }
    }
}

impl From<notify::Error> for Error {
    fn from(error: notify::Error) -> Self {
        Error::Watch(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
