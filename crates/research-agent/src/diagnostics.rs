//! Self-check of the installation and configuration.

use std::env;
use std::fmt::{self, Display};
use std::path::Path;

use crate::config::{
    ALL_VARS, API_KEY_VAR, Config, ConfigError, OUTPUT_DIR_VAR,
};
use crate::tools::default_registry;

/// Tools the research workflow relies on.
pub const REQUIRED_TOOLS: [&str; 3] = ["search_tool", "wiki_tool", "save_tool"];

/// A component of the installation and its version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Component {
    /// Name of the component.
    pub name: &'static str,
    /// Version of the component.
    pub version: &'static str,
}

/// The state of one configuration variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarStatus {
    /// Name of the variable.
    pub name: &'static str,
    /// The value, if set. Secrets are redacted.
    pub value: Option<String>,
}

/// The result of a self-check.
#[derive(Clone, Debug)]
pub struct Report {
    /// Crates making up this build.
    pub components: Vec<Component>,
    /// Optional features and whether they are compiled in.
    pub features: Vec<(&'static str, bool)>,
    /// Tools in the default registry, in registration order.
    pub tools: Vec<String>,
    /// Configuration variables found in the environment.
    pub vars: Vec<VarStatus>,
    /// The error of loading the configuration, if any.
    pub config_error: Option<ConfigError>,
    /// Whether the output directory exists.
    pub output_dir_exists: bool,
}

impl Report {
    /// Checks the current process environment.
    pub fn collect() -> Self {
        Self::collect_with(|var| env::var(var).ok())
    }

    /// Checks with a custom variable lookup.
    pub fn collect_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let components = vec![
            Component {
                name: "research-agent",
                version: env!("CARGO_PKG_VERSION"),
            },
            Component {
                name: "research-agent-core",
                version: research_agent_core::VERSION,
            },
            Component {
                name: "research-agent-model",
                version: research_agent_model::VERSION,
            },
            Component {
                name: "research-agent-openai-model",
                version: research_agent_openai_model::VERSION,
            },
        ];
        let features = vec![("cli", cfg!(feature = "cli"))];

        let config = Config::from_lookup(&lookup);
        let output_dir = config.as_ref().ok().map(|config| &config.output_dir);
        let tools = tool_names(
            output_dir.map_or(Path::new("."), |dir| dir.as_path()),
        );
        let output_dir_exists = output_dir.is_none_or(|dir| dir.is_dir());
        let config_error = config.err();

        let vars = ALL_VARS
            .iter()
            .map(|&name| {
                let value =
                    lookup(name).filter(|value| !value.trim().is_empty());
                let value = if name == API_KEY_VAR {
                    value.map(|key| redact(&key))
                } else {
                    value
                };
                VarStatus { name, value }
            })
            .collect();

        Report {
            components,
            features,
            tools,
            vars,
            config_error,
            output_dir_exists,
        }
    }

    /// Returns the required tools that are not registered.
    pub fn missing_tools(&self) -> Vec<&'static str> {
        REQUIRED_TOOLS
            .into_iter()
            .filter(|name| !self.tools.iter().any(|tool| tool == *name))
            .collect()
    }

    /// Returns the steps that would fix the problems found, empty if
    /// everything looks good.
    pub fn recommendations(&self) -> Vec<String> {
        let mut steps = Vec::new();
        match &self.config_error {
            Some(ConfigError::Missing(var)) => steps.push(format!(
                "Set {var} in your environment or add `{var}=...` to a \
                 `.env` file in the working directory."
            )),
            Some(err @ ConfigError::Invalid { var, .. }) => {
                steps.push(format!("Fix {var}: {err}."))
            }
            None => {}
        }
        if !self.output_dir_exists {
            steps.push(format!(
                "Create the output directory, or point {OUTPUT_DIR_VAR} to an \
                 existing one."
            ));
        }
        let missing_tools = self.missing_tools();
        if !missing_tools.is_empty() {
            steps.push(format!(
                "Rebuild research-agent, the build lacks tools: {}.",
                missing_tools.join(", ")
            ));
        }
        if !self.features.iter().any(|(name, on)| *name == "cli" && *on) {
            steps.push(
                "Rebuild with `--features cli` to get the research-agent \
                 command."
                    .to_owned(),
            );
        }
        steps
    }

    /// Returns `true` if nothing needs fixing.
    #[inline]
    pub fn is_healthy(&self) -> bool {
        self.recommendations().is_empty()
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        let thin_rule = "-".repeat(60);

        writeln!(f, "{rule}\nRESEARCH AGENT DIAGNOSTICS\n{rule}")?;
        for component in &self.components {
            writeln!(
                f,
                "  ✓ {}: version {}",
                component.name, component.version
            )?;
        }

        writeln!(f, "\n{thin_rule}\nOptional features:\n{thin_rule}")?;
        for (name, enabled) in &self.features {
            let (mark, state) = if *enabled {
                ("✓", "ENABLED")
            } else {
                ("✗", "DISABLED")
            };
            writeln!(f, "  {mark} {name} - {state}")?;
        }

        writeln!(
            f,
            "\n{thin_rule}\nChecking for required tools:\n{thin_rule}"
        )?;
        for name in REQUIRED_TOOLS {
            if self.tools.iter().any(|tool| tool == name) {
                writeln!(f, "  ✓ {name} - FOUND")?;
            } else {
                writeln!(f, "  ✗ {name} - NOT FOUND")?;
            }
        }

        writeln!(f, "\n{thin_rule}\nConfiguration:\n{thin_rule}")?;
        for var in &self.vars {
            match &var.value {
                Some(value) => writeln!(f, "  ✓ {}: {value}", var.name)?,
                None if var.name == API_KEY_VAR => {
                    writeln!(f, "  ✗ {}: NOT SET (required)", var.name)?
                }
                None => writeln!(f, "  - {}: not set", var.name)?,
            }
        }

        writeln!(f, "\n{rule}\nRECOMMENDATIONS:\n{rule}")?;
        let steps = self.recommendations();
        if steps.is_empty() {
            writeln!(f, "\n✓ Your installation looks good!")?;
            writeln!(f, "  Run `research-agent` to start researching.")?;
        } else {
            for (idx, step) in steps.iter().enumerate() {
                writeln!(f, "{}. {step}", idx + 1)?;
            }
        }
        write!(f, "{rule}")
    }
}

fn tool_names(output_dir: &Path) -> Vec<String> {
    match default_registry(output_dir) {
        Ok(registry) => registry.names().map(str::to_owned).collect(),
        Err(err) => {
            error!("failed to build the default tools: {err}");
            vec![]
        }
    }
}

fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(3).collect();
    format!("{prefix}… ({} chars)", secret.chars().count())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::tempdir;

    use super::*;
    use crate::config::MODEL_VAR;

    fn collect(vars: &[(&str, &str)]) -> Report {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Report::collect_with(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_healthy() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().to_string_lossy().into_owned();
        let report = collect(&[
            (API_KEY_VAR, "sk-secret-key"),
            (OUTPUT_DIR_VAR, &output_dir),
        ]);

        assert_eq!(report.tools, REQUIRED_TOOLS);
        assert!(report.missing_tools().is_empty());
        assert_eq!(report.components.len(), 4);
        assert_eq!(report.is_healthy(), cfg!(feature = "cli"));

        let text = report.to_string();
        assert!(text.contains("✓ wiki_tool - FOUND"));
        assert!(text.contains("OPENAI_API_KEY: sk-… (13 chars)"));
        assert!(!text.contains("sk-secret-key"));
        assert!(text.contains("OPENAI_MODEL: not set"));
    }

    #[test]
    fn test_missing_api_key() {
        let report = collect(&[(MODEL_VAR, "gpt-5.2")]);
        assert_eq!(
            report.config_error,
            Some(ConfigError::Missing(API_KEY_VAR))
        );

        let steps = report.recommendations();
        assert!(steps[0].contains("OPENAI_API_KEY"));
        assert!(!report.is_healthy());

        let text = report.to_string();
        assert!(text.contains("OPENAI_API_KEY: NOT SET (required)"));
        assert!(text.contains("OPENAI_MODEL: gpt-5.2"));
        assert!(text.contains("1. Set OPENAI_API_KEY"));
    }

    #[test]
    fn test_missing_output_dir() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("nope").to_string_lossy().into_owned();
        let report = collect(&[
            (API_KEY_VAR, "sk-secret-key"),
            (OUTPUT_DIR_VAR, &output_dir),
        ]);
        assert!(!report.output_dir_exists);
        assert!(
            report
                .recommendations()
                .iter()
                .any(|step| step.contains(OUTPUT_DIR_VAR))
        );
    }
}
