use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Everything one checkout run needs. Built once by the caller and consumed
/// read-only.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Name of the template client whose view is copied.
    pub template: String,
    /// Use the template client itself instead of a host-qualified client.
    pub use_template_name: bool,
    pub root: PathBuf,
    /// Changelist, label or revision specifier to sync to. Empty means head.
    pub reference: String,
    pub user: String,
    pub port: String,
    /// Overrides the host name used for client naming and the `Host:` field.
    pub host: Option<String>,
    pub p4_bin: PathBuf,
    /// Purge and recreate the workspace even when no drift is found.
    pub force_clean: bool,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.template.trim().is_empty() {
            return Err(Error::Config("template client name cannot be empty".into()));
        }
        if self.template.contains(char::is_whitespace) || self.template.contains('/') {
            return Err(Error::Config(format!(
                "template client name '{}' contains invalid characters",
                self.template
            )));
        }
        if self.user.trim().is_empty() {
            return Err(Error::Config("user cannot be empty".into()));
        }
        if self.port.trim().is_empty() {
            return Err(Error::Config("server address cannot be empty".into()));
        }
        if !self.root.is_absolute() {
            return Err(Error::Config(format!(
                "workspace root must be an absolute path, got {}",
                self.root.display()
            )));
        }
        Ok(())
    }

    /// True when the server address requires an SSL fingerprint to be trusted.
    #[must_use]
    pub fn is_ssl(&self) -> bool {
        self.port.starts_with("ssl:")
            || self.port.starts_with("ssl4:")
            || self.port.starts_with("ssl6:")
            || self.port.starts_with("ssl46:")
            || self.port.starts_with("ssl64:")
    }
}

/// Optional settings file. Every field is a default that the command line
/// may override.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    pub template: Option<String>,
    pub use_template_name: Option<bool>,
    pub root: Option<PathBuf>,
    pub reference: Option<String>,
    pub user: Option<String>,
    pub port: Option<String>,
    pub host: Option<String>,
    pub p4_bin: Option<PathBuf>,
}

impl SettingsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            Error::Config(format!("failed to parse {}: {e}", path.display()))
        })
    }
}
