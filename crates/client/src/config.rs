#![forbid(unsafe_code)]

use serde::Deserialize;
use std::path::{Path, PathBuf};
use vil_core::{API_VERSION, RepositoryRef, Severity};

pub const TOKEN_ENV: &str = "VIL_TOKEN";
pub const USER_ENV: &str = "VIL_USER";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_logging_level() -> String {
    "information".to_string()
}

/// Client settings, usually read from `vil.yaml`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub git_base_url: Option<String>,
    #[serde(default)]
    pub git_token: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default = "default_logging_level")]
    pub logging_level: String,
}

impl ClientConfig {
    /// Reads the file, applies `VIL_TOKEN`/`VIL_USER` from the environment and validates.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&text)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(token) = non_empty(TOKEN_ENV) {
            self.token = Some(token);
        }
        if let Some(user) = non_empty(USER_ENV) {
            self.user = Some(user);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if normalize_base_url(&self.base_url).is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty"));
        }
        if self.api_version.trim().is_empty() {
            return Err(ConfigError::Invalid("api_version must not be empty"));
        }
        if Severity::parse(&self.logging_level).is_none() {
            return Err(ConfigError::Invalid(
                "logging_level must be verbose, information, warning, error or critical",
            ));
        }
        Ok(())
    }

    /// Collection URL of the Git service; defaults to the organization on dev.azure.com.
    pub fn git_base_url(&self) -> String {
        match self.git_base_url.as_deref().map(normalize_base_url) {
            Some(url) if !url.is_empty() => url,
            _ => format!("https://dev.azure.com/{}", self.organization),
        }
    }

    pub fn repository_ref(&self) -> RepositoryRef {
        RepositoryRef {
            organization: self.organization.clone(),
            project: self.project.clone(),
            repository: self.repository.clone(),
            branch: self.branch.clone(),
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::parse(&self.logging_level).unwrap_or(Severity::Information)
    }

    pub fn user_name(&self) -> String {
        self.user.clone().unwrap_or_default()
    }
}

/// Trims whitespace and every trailing `/`.
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
