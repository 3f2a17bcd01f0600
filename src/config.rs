//! Environment-driven configuration.
//!
//! The library never reads the environment on its own; everything comes in
//! through [`UsimConfig`] and the data-root helper, which the binary (or a
//! test) populates explicitly.

use std::path::PathBuf;

/// Default Unity Simulation API endpoint.
pub const DEFAULT_USIM_API_ENDPOINT: &str = "https://api.simulation.unity3d.com";

/// Environment variable overriding the Unity Simulation API endpoint.
pub const ENV_API_ENDPOINT: &str = "SIMDATA_API_ENDPOINT";

/// Environment variable holding a Unity Simulation access token.
pub const ENV_ACCESS_TOKEN: &str = "SIMDATA_ACCESS_TOKEN";

/// Environment variable overriding the default output data root.
pub const ENV_DATA_ROOT: &str = "SIMDATA_DATA_ROOT";

/// Configuration for talking to the Unity Simulation run data service.
#[derive(Debug, Clone)]
pub struct UsimConfig {
    /// Base URL of the run data service, without a trailing slash.
    pub api_endpoint: String,
    /// Access token used when the source URI does not embed one.
    pub access_token: Option<String>,
}

impl UsimConfig {
    /// Creates a config against the given endpoint with no ambient token.
    pub fn new(api_endpoint: impl Into<String>) -> Self {
        let mut api_endpoint = api_endpoint.into();
        while api_endpoint.ends_with('/') {
            api_endpoint.pop();
        }
        Self {
            api_endpoint,
            access_token: None,
        }
    }

    /// Sets the ambient access token.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Builds the config from the environment, falling back to the public
    /// endpoint.
    ///
    /// Reads `SIMDATA_API_ENDPOINT` and `SIMDATA_ACCESS_TOKEN`. Empty
    /// values are treated as unset.
    #[must_use]
    pub fn from_env() -> Self {
        let endpoint = env_nonempty(ENV_API_ENDPOINT)
            .unwrap_or_else(|| DEFAULT_USIM_API_ENDPOINT.to_string());
        let mut config = Self::new(endpoint);
        config.access_token = env_nonempty(ENV_ACCESS_TOKEN);
        config
    }
}

impl Default for UsimConfig {
    fn default() -> Self {
        Self::new(DEFAULT_USIM_API_ENDPOINT)
    }
}

/// Default root directory for downloaded dataset files.
///
/// `SIMDATA_DATA_ROOT` if set, otherwise `./data`.
#[must_use]
pub fn default_data_root() -> PathBuf {
    env_nonempty(ENV_DATA_ROOT).map_or_else(|| PathBuf::from("./data"), PathBuf::from)
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
