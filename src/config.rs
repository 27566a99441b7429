//! Configuration handling for the form merger

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Form whose items open every merged form
pub const DEFAULT_INTRO_FORM_ID: &str = "13LE8e3p_PPel6otrvtDHxHF6me0DMhfAxEoTfZAx4JQ";
/// Empty form copied as the target of every merge
pub const DEFAULT_TEMPLATE_FORM_ID: &str = "1AVVAOVjjZBWXaOlYSFAVXxs8OpCoNVrJ9Dq0oSEvuVA";
const DEFAULT_FORMS_API: &str = "https://forms.googleapis.com";
const DEFAULT_DRIVE_API: &str = "https://www.googleapis.com";

const ENV_ACCESS_TOKEN: &str = "FORM_MERGE_ACCESS_TOKEN";
const ENV_INTRO_FORM_ID: &str = "FORM_MERGE_INTRO_FORM_ID";
const ENV_TEMPLATE_FORM_ID: &str = "FORM_MERGE_TEMPLATE_FORM_ID";
const ENV_FORMS_API: &str = "FORM_MERGE_FORMS_API";
const ENV_DRIVE_API: &str = "FORM_MERGE_DRIVE_API";

/// Settings for talking to the provider and running merges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// OAuth bearer token
    pub access_token: Option<String>,
    pub intro_form_id: String,
    pub template_form_id: String,
    pub forms_api_base: String,
    pub drive_api_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            access_token: None,
            intro_form_id: DEFAULT_INTRO_FORM_ID.to_string(),
            template_form_id: DEFAULT_TEMPLATE_FORM_ID.to_string(),
            forms_api_base: DEFAULT_FORMS_API.to_string(),
            drive_api_base: DEFAULT_DRIVE_API.to_string(),
        }
    }
}

impl Settings {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("io", "form-merge", "form-merge")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load settings from the config file, then apply environment overrides
    pub fn load() -> Result<Self> {
        let settings = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        Ok(settings.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Replace fields with values found through `lookup`
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(token) = lookup(ENV_ACCESS_TOKEN) {
            self.access_token = Some(token);
        }
        if let Some(id) = lookup(ENV_INTRO_FORM_ID) {
            self.intro_form_id = id;
        }
        if let Some(id) = lookup(ENV_TEMPLATE_FORM_ID) {
            self.template_form_id = id;
        }
        if let Some(url) = lookup(ENV_FORMS_API) {
            self.forms_api_base = url;
        }
        if let Some(url) = lookup(ENV_DRIVE_API) {
            self.drive_api_base = url;
        }
        self
    }

    /// The access token, required for any provider call
    pub fn access_token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| anyhow!("No access token configured (set {ENV_ACCESS_TOKEN})"))
    }
}
