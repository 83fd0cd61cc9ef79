use std::{error::Error, fmt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    ConfigError(String),
    NetworkError(String),
    CatalogFetchError(String),
    ManifestFetchError(String),
    ManifestParseError(String),
    EngineInitError(String),
    PlaybackError(String),
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            PlayerError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            PlayerError::CatalogFetchError(msg) => {
                write!(f, "Could not load video catalog: {}", msg)
            }
            PlayerError::ManifestFetchError(msg) => {
                write!(f, "Could not fetch video manifest: {}", msg)
            }
            PlayerError::ManifestParseError(msg) => write!(
                f,
                "Could not parse video manifest to get quality levels: {}",
                msg
            ),
            PlayerError::EngineInitError(msg) => {
                write!(f, "Failed to initialize playback engine: {}", msg)
            }
            PlayerError::PlaybackError(msg) => write!(f, "Playback error: {}", msg),
        }
    }
}

impl Error for PlayerError {}
