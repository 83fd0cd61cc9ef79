use crate::errors::ServerError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Setting {
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default = "Listener::catalog")]
    pub catalog: Listener,
    #[serde(default = "Listener::stream")]
    pub stream: Listener,
    #[serde(default)]
    pub library: Library,
}

impl Setting {
    pub fn from_toml(data: &str) -> Result<Self, ServerError> {
        let mut setting: Setting =
            toml::from_str(data).map_err(|e| ServerError::ConfigError(e.to_string()))?;
        setting.library.validate()?;
        while setting.library.public_url.ends_with('/') {
            setting.library.public_url.pop();
        }
        Ok(setting)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Runtime {
    pub threads: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct Listener {
    pub addr: String,
}

impl Listener {
    fn catalog() -> Self {
        Listener {
            addr: ":8080".to_string(),
        }
    }

    fn stream() -> Self {
        Listener {
            addr: ":8081".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Library {
    #[serde(default = "Library::default_path")]
    pub path: String,
    /// Base URL the stream listener is reachable at from the player.
    #[serde(default = "Library::default_public_url")]
    pub public_url: String,
    /// Manifest file name inside every video directory.
    #[serde(default = "Library::default_manifest")]
    pub manifest: String,
}

impl Library {
    fn default_path() -> String {
        "./videos_dash".to_string()
    }

    fn default_public_url() -> String {
        "http://localhost:8081".to_string()
    }

    fn default_manifest() -> String {
        "stream.mpd".to_string()
    }

    fn validate(&self) -> Result<(), ServerError> {
        if self.path.is_empty() {
            return Err(ServerError::ConfigError(
                "library path must not be empty".to_string(),
            ));
        }
        if !self.public_url.starts_with("http://") && !self.public_url.starts_with("https://") {
            return Err(ServerError::ConfigError(format!(
                "library public url '{}' must be an http(s) url",
                self.public_url
            )));
        }
        if self.manifest.is_empty() || self.manifest.contains('/') {
            return Err(ServerError::ConfigError(format!(
                "library manifest '{}' must be a plain file name",
                self.manifest
            )));
        }
        Ok(())
    }
}

impl Default for Library {
    fn default() -> Self {
        Library {
            path: Library::default_path(),
            public_url: Library::default_public_url(),
            manifest: Library::default_manifest(),
        }
    }
}
