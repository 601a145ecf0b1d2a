// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution-type templates.
//!
//! Non-local execution types (`shell`, `pbrun`, `p7s`, `wwrs`, ...) are
//! rendered from templates loaded once at startup from a YAML file with
//! per-platform sections. `local` and `shell` are always built in; a
//! missing or malformed config degrades to the built-ins with a warning.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors surfaced while loading or rendering execution types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("unknown execution type '{0}'")]
    UnknownExec(String),

    #[error("execution type '{name}' has an empty command_template")]
    EmptyTemplate { name: String },

    #[error("validation_test for '{name}' needs expected_exit or expected_output")]
    IncompleteValidationTest { name: String },
}

/// Connectivity probe attached to an execution type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValidationTest {
    pub command: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    pub expected_exit: Option<i32>,
    pub expected_output: Option<String>,
}

/// One named execution type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecTypeDef {
    pub binary: String,
    /// Ordered argv tokens with `{binary}`, `{hostname}`, `{command}`,
    /// `{arguments}` (single string) and `{arguments_split}`
    /// (pre-tokenized) placeholders.
    pub command_template: Vec<String>,
    pub validation_test: Option<ValidationTest>,
}

/// Raw file shape: platform sections plus an alias table.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    linux: HashMap<String, ExecTypeDef>,
    #[serde(default)]
    windows: HashMap<String, ExecTypeDef>,
    #[serde(default)]
    aliases: HashMap<String, String>,
}

/// Values substituted into a command template.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub hostname: &'a str,
    pub command: &'a str,
    pub arguments: &'a str,
}

/// Loaded execution-type registry.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    types: HashMap<String, ExecTypeDef>,
    aliases: HashMap<String, String>,
}

impl ExecConfig {
    /// Registry with only the built-in `local` and `shell` types.
    pub fn builtin() -> Self {
        let mut types = HashMap::new();
        types.insert(
            "local".to_string(),
            ExecTypeDef {
                binary: String::new(),
                command_template: vec!["{command}".into(), "{arguments_split}".into()],
                validation_test: None,
            },
        );
        types.insert(
            "shell".to_string(),
            ExecTypeDef {
                binary: "/bin/sh".to_string(),
                command_template: vec![
                    "{binary}".into(),
                    "-c".into(),
                    "{command} {arguments}".into(),
                ],
                validation_test: None,
            },
        );
        let mut aliases = HashMap::new();
        aliases.insert("bash".to_string(), "shell".to_string());
        ExecConfig { types, aliases }
    }

    /// Load the YAML registry for the current platform, merged over the
    /// built-ins.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file: ConfigFile =
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        let platform = if cfg!(windows) { file.windows } else { file.linux };

        let mut config = ExecConfig::builtin();
        for (name, def) in platform {
            if def.command_template.is_empty() {
                return Err(ConfigError::EmptyTemplate { name });
            }
            if let Some(test) = &def.validation_test {
                if test.expected_exit.is_none() && test.expected_output.is_none() {
                    return Err(ConfigError::IncompleteValidationTest { name });
                }
            }
            config.types.insert(name, def);
        }
        config.aliases.extend(file.aliases);
        Ok(config)
    }

    /// Load `path` if given, degrading to the built-ins on any failure.
    pub fn load_or_builtin(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };
        match Self::load(path) {
            Ok(config) => config,
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "execution-type config unusable; falling back to local/shell only"
                );
                Self::builtin()
            }
        }
    }

    /// Resolve aliases to the canonical type name.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn get(&self, name: &str) -> Option<&ExecTypeDef> {
        self.types.get(self.resolve(name))
    }

    pub fn known(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names (including aliases) that resolve to the shell type; these get
    /// shell-metacharacter leniency during security validation.
    pub fn shell_execs(&self) -> Vec<String> {
        let mut names = vec!["shell".to_string()];
        for (alias, target) in &self.aliases {
            if target == "shell" {
                names.push(alias.clone());
            }
        }
        names.sort();
        names
    }

    /// Render argv for a task. Empty rendered tokens are dropped, so a
    /// `{arguments}` placeholder with no arguments vanishes instead of
    /// producing an empty argv entry.
    pub fn render(&self, name: &str, ctx: &RenderContext<'_>) -> Result<Vec<String>, ConfigError> {
        let def = self
            .get(name)
            .ok_or_else(|| ConfigError::UnknownExec(name.to_string()))?;

        let mut argv = Vec::new();
        for token in &def.command_template {
            if token == "{arguments_split}" {
                argv.extend(ctx.arguments.split_whitespace().map(str::to_string));
                continue;
            }
            let rendered = token
                .replace("{binary}", &def.binary)
                .replace("{hostname}", ctx.hostname)
                .replace("{command}", ctx.command)
                .replace("{arguments}", ctx.arguments)
                .trim()
                .to_string();
            if !rendered.is_empty() {
                argv.push(rendered);
            }
        }
        if argv.is_empty() {
            return Err(ConfigError::EmptyTemplate {
                name: name.to_string(),
            });
        }
        Ok(argv)
    }

    /// Test-only registry extension.
    #[cfg(test)]
    pub(crate) fn insert_type(&mut self, name: &str, def: ExecTypeDef) {
        self.types.insert(name.to_string(), def);
    }

    pub fn validation_test(&self, name: &str) -> Option<&ValidationTest> {
        self.get(name).and_then(|def| def.validation_test.as_ref())
    }

    /// Binary to look up in PATH during exec-type validation. `local` has
    /// none — the task's own command is the binary.
    pub fn binary(&self, name: &str) -> Option<&str> {
        self.get(name)
            .map(|def| def.binary.as_str())
            .filter(|b| !b.is_empty())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
