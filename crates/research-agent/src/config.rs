//! Configuration loaded from the environment.

use std::env;
use std::fmt::{self, Debug};
use std::path::PathBuf;

use research_agent_core::DEFAULT_MAX_ITERATIONS;
use research_agent_openai_model::{OpenAIConfig, OpenAIConfigBuilder};

/// Name of the variable holding the API key.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Name of the variable overriding the API base URL.
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
/// Name of the variable overriding the model.
pub const MODEL_VAR: &str = "OPENAI_MODEL";
/// Name of the variable overriding the sampling temperature.
pub const TEMPERATURE_VAR: &str = "OPENAI_TEMPERATURE";
/// Name of the variable bounding model calls per query, `0` for no bound.
pub const MAX_ITERATIONS_VAR: &str = "RESEARCH_AGENT_MAX_ITERATIONS";
/// Name of the variable setting where the save tool writes files.
pub const OUTPUT_DIR_VAR: &str = "RESEARCH_AGENT_OUTPUT_DIR";

/// Sampling temperature used unless [`TEMPERATURE_VAR`] is set.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// All variables read by [`Config::from_env`].
pub const ALL_VARS: [&str; 6] = [
    API_KEY_VAR,
    BASE_URL_VAR,
    MODEL_VAR,
    TEMPERATURE_VAR,
    MAX_ITERATIONS_VAR,
    OUTPUT_DIR_VAR,
];

/// Errors for loading the configuration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} is not set, add it to the environment or a `.env` file")]
    Missing(&'static str),
    /// A variable holds a value that can't be used.
    #[error("{var} has an invalid value `{value}`: {reason}")]
    Invalid {
        /// Name of the variable.
        var: &'static str,
        /// The value as found.
        value: String,
        /// Why the value is rejected.
        reason: &'static str,
    },
}

/// The application configuration.
#[derive(Clone, PartialEq)]
pub struct Config {
    /// The API key for the model provider.
    pub api_key: String,
    /// Custom base URL of the API.
    pub base_url: Option<String>,
    /// Custom model name.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum number of model calls per query, `None` if unbounded.
    pub max_iterations: Option<usize>,
    /// Directory that the save tool writes into.
    pub output_dir: PathBuf,
}

impl Config {
    /// Loads the configuration from the process environment.
    ///
    /// Call [`dotenv::dotenv`] before this to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Loads the configuration with a custom variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let api_key =
            get(API_KEY_VAR).ok_or(ConfigError::Missing(API_KEY_VAR))?;

        let temperature = match get(TEMPERATURE_VAR) {
            None => DEFAULT_TEMPERATURE,
            Some(value) => match value.parse::<f32>() {
                Ok(temperature) if (0.0..=2.0).contains(&temperature) => {
                    temperature
                }
                _ => {
                    return Err(ConfigError::Invalid {
                        var: TEMPERATURE_VAR,
                        value,
                        reason: "expected a number between 0 and 2",
                    });
                }
            },
        };

        let max_iterations = match get(MAX_ITERATIONS_VAR) {
            None => Some(DEFAULT_MAX_ITERATIONS),
            Some(value) => match value.parse::<usize>() {
                Ok(0) => None,
                Ok(max) => Some(max),
                Err(_) => {
                    return Err(ConfigError::Invalid {
                        var: MAX_ITERATIONS_VAR,
                        value,
                        reason: "expected a non-negative integer",
                    });
                }
            },
        };

        let base_url = get(BASE_URL_VAR);
        if let Some(base_url) = &base_url {
            let scheme_ok = base_url.starts_with("http://")
                || base_url.starts_with("https://");
            if !scheme_ok {
                return Err(ConfigError::Invalid {
                    var: BASE_URL_VAR,
                    value: base_url.clone(),
                    reason: "expected an http or https URL",
                });
            }
        }

        Ok(Config {
            api_key,
            base_url,
            model: get(MODEL_VAR),
            temperature,
            max_iterations,
            output_dir: get(OUTPUT_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }

    /// Returns the configuration of the OpenAI-compatible provider.
    pub fn openai_config(&self) -> OpenAIConfig {
        let mut builder = OpenAIConfigBuilder::with_api_key(&self.api_key)
            .with_temperature(self.temperature);
        if let Some(base_url) = &self.base_url {
            builder = builder.with_base_url(base_url);
        }
        if let Some(model) = &self.model {
            builder = builder.with_model(model);
        }
        builder.build()
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<deducted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_iterations", &self.max_iterations)
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[(API_KEY_VAR, "sk-test")]).unwrap();
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.base_url, None);
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.max_iterations, Some(DEFAULT_MAX_ITERATIONS));
        assert_eq!(config.output_dir, PathBuf::from("."));

        let openai_config = config.openai_config();
        assert_eq!(openai_config.model(), "gpt-5.2");
        assert_eq!(openai_config.base_url(), "https://api.openai.com/v1");
        assert_eq!(openai_config.temperature(), Some(DEFAULT_TEMPERATURE));
        assert!(!format!("{config:?}").contains("sk-test"));
    }

    #[test]
    fn test_missing_api_key() {
        assert_eq!(load(&[]), Err(ConfigError::Missing(API_KEY_VAR)));
        assert_eq!(
            load(&[(API_KEY_VAR, "  ")]),
            Err(ConfigError::Missing(API_KEY_VAR))
        );
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            (API_KEY_VAR, "sk-test"),
            (BASE_URL_VAR, "http://localhost:11434/v1/"),
            (MODEL_VAR, "llama3.1"),
            (TEMPERATURE_VAR, "0.7"),
            (MAX_ITERATIONS_VAR, "0"),
            (OUTPUT_DIR_VAR, "/tmp/research"),
        ])
        .unwrap();
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_iterations, None);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/research"));

        let openai_config = config.openai_config();
        assert_eq!(openai_config.model(), "llama3.1");
        assert_eq!(openai_config.base_url(), "http://localhost:11434/v1");
        assert_eq!(openai_config.temperature(), Some(0.7));
    }

    #[test]
    fn test_invalid_values() {
        let err = load(&[(API_KEY_VAR, "sk-test"), (TEMPERATURE_VAR, "hot")])
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { var: TEMPERATURE_VAR, .. }
        ));

        let err = load(&[(API_KEY_VAR, "sk-test"), (MAX_ITERATIONS_VAR, "-1")])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "RESEARCH_AGENT_MAX_ITERATIONS has an invalid value `-1`: \
             expected a non-negative integer"
        );

        let err = load(&[(API_KEY_VAR, "sk-test"), (BASE_URL_VAR, "localhost")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: BASE_URL_VAR, .. }));
    }
}
