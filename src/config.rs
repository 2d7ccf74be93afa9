use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use xdg::BaseDirectories;

use crate::context::{DEFAULT_NUMBER_ENV, DEFAULT_REPO_ENV};
use crate::keybinding::Keybindings;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Editor command for the scratch region. Falls back to $VISUAL/$EDITOR.
    pub editor: Option<String>,
    pub pull_request: PullRequestConfig,
    pub signs: SignsConfig,
    pub keybindings: Keybindings,
}

/// Environment variables that carry the PR context
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PullRequestConfig {
    pub number_env: String,
    pub repo_env: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignsConfig {
    /// Gutter text for commented lines (at most 2 columns are shown)
    pub text: String,
}

impl Default for PullRequestConfig {
    fn default() -> Self {
        Self {
            number_env: DEFAULT_NUMBER_ENV.to_owned(),
            repo_env: DEFAULT_REPO_ENV.to_owned(),
        }
    }
}

impl Default for SignsConfig {
    fn default() -> Self {
        Self {
            text: "💬".to_owned(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the XDG config home when `None`.
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let config_path = Self::config_path();
                if config_path.exists() {
                    Self::load_from(&config_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn config_path() -> PathBuf {
        BaseDirectories::with_prefix("prsign")
            .map(|dirs| dirs.get_config_home().join("config.toml"))
            .unwrap_or_else(|_| PathBuf::from("config.toml"))
    }
}
