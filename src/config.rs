// Runtime configuration, read once from the environment.

use crate::archive::MAX_UPLOAD_BYTES;
use crate::store::JsonFileStore;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://hostme.space";
pub const DEFAULT_SITE_DOMAIN: &str = "hostme.space";
/// Pre-filled project name when no workspace is open.
pub const FALLBACK_PROJECT_NAME: &str = "my-website";

/// How the deploy folder is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderPicker {
    /// Native folder dialog.
    Dialog,
    /// Path typed in the terminal.
    Prompt,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub site_domain: String,
    pub state_file: PathBuf,
    /// Folder the command runs in; `None` behaves like an empty editor window.
    pub workspace: Option<PathBuf>,
    /// Where `<slug>.zip` is written.
    pub archive_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub folder_picker: FolderPicker,
    pub upload_timeout: Option<Duration>,
    pub accept_invalid_certs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            site_domain: DEFAULT_SITE_DOMAIN.to_string(),
            state_file: JsonFileStore::default_path(),
            workspace: None,
            archive_dir: PathBuf::from("."),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            folder_picker: FolderPicker::Dialog,
            upload_timeout: None,
            accept_invalid_certs: false,
        }
    }
}

impl Config {
    /// Build the configuration from `HOSTME_*` environment variables, falling
    /// back to the defaults and the current directory.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let cwd = std::env::current_dir().ok();
        let mut config = Config::default();

        if let Some(url) = var("HOSTME_API_URL") {
            config.api_url = url;
        }
        if let Some(domain) = var("HOSTME_SITE_DOMAIN") {
            config.site_domain = domain;
        }
        if let Some(path) = var("HOSTME_STATE_FILE") {
            config.state_file = PathBuf::from(path);
        }
        config.workspace = match var("HOSTME_WORKSPACE") {
            Some(value) if value.eq_ignore_ascii_case("none") => None,
            Some(value) => Some(PathBuf::from(value)),
            None => cwd.clone(),
        };
        config.archive_dir = var("HOSTME_ARCHIVE_DIR")
            .map(PathBuf::from)
            .or(cwd)
            .unwrap_or_else(|| PathBuf::from("."));
        if let Some(limit) = var("HOSTME_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = limit
                .parse()
                .with_context(|| format!("HOSTME_MAX_UPLOAD_BYTES is not a number: {limit}"))?;
        }
        if let Some(picker) = var("HOSTME_FOLDER_PICKER") {
            config.folder_picker = match picker.to_ascii_lowercase().as_str() {
                "dialog" => FolderPicker::Dialog,
                "prompt" => FolderPicker::Prompt,
                other => anyhow::bail!("HOSTME_FOLDER_PICKER must be `dialog` or `prompt`, got `{other}`"),
            };
        }
        if let Some(secs) = var("HOSTME_UPLOAD_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("HOSTME_UPLOAD_TIMEOUT_SECS is not a number: {secs}"))?;
            config.upload_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(flag) = var("HOSTME_ACCEPT_INVALID_CERTS") {
            config.accept_invalid_certs = parse_bool(&flag)
                .with_context(|| format!("HOSTME_ACCEPT_INVALID_CERTS is not a boolean: {flag}"))?;
        }
        Ok(config)
    }

    /// Public address of a deployed project.
    pub fn site_url(&self, slug: &str) -> String {
        format!("https://{}.{}", slug, self.site_domain)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("expected true or false"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.max_upload_bytes, 127_000_000);
        assert_eq!(config.folder_picker, FolderPicker::Dialog);
        assert_eq!(config.upload_timeout, None);
        assert!(!config.accept_invalid_certs);
        assert_eq!(config.workspace, std::env::current_dir().ok());
    }

    #[test]
    fn reads_overrides() {
        let config = config_with(&[
            ("HOSTME_API_URL", "http://localhost:3000"),
            ("HOSTME_WORKSPACE", "none"),
            ("HOSTME_MAX_UPLOAD_BYTES", "1000"),
            ("HOSTME_FOLDER_PICKER", "Prompt"),
            ("HOSTME_UPLOAD_TIMEOUT_SECS", "600"),
            ("HOSTME_ACCEPT_INVALID_CERTS", "yes"),
        ])
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:3000");
        assert_eq!(config.workspace, None);
        assert_eq!(config.max_upload_bytes, 1000);
        assert_eq!(config.folder_picker, FolderPicker::Prompt);
        assert_eq!(config.upload_timeout, Some(Duration::from_secs(600)));
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config_with(&[("HOSTME_MAX_UPLOAD_BYTES", "lots")]).is_err());
        assert!(config_with(&[("HOSTME_FOLDER_PICKER", "gui")]).is_err());
        assert!(config_with(&[("HOSTME_ACCEPT_INVALID_CERTS", "maybe")]).is_err());
    }

    #[test]
    fn site_url_uses_domain() {
        let config = Config::default();
        assert_eq!(config.site_url("my-site"), "https://my-site.hostme.space");
    }
}
