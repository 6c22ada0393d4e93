use crate::error::{EstimatorError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// WizardConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardConfig {
    /// How long a saved draft stays restorable.
    #[serde(default = "default_draft_ttl")]
    pub draft_ttl_minutes: u32,
    /// Delay between picking a single-select option and committing it.
    #[serde(default = "default_commit_delay")]
    pub commit_delay_ms: u32,
    /// How long the "progress restored" notice stays up.
    #[serde(default = "default_notice")]
    pub notice_ms: u32,
    /// Move to the next step once a single-select choice commits.
    #[serde(default)]
    pub auto_advance: bool,
}

fn default_draft_ttl() -> u32 {
    120
}

fn default_commit_delay() -> u32 {
    420
}

fn default_notice() -> u32 {
    2_500
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            draft_ttl_minutes: default_draft_ttl(),
            commit_delay_ms: default_commit_delay(),
            notice_ms: default_notice(),
            auto_advance: false,
        }
    }
}

// ---------------------------------------------------------------------------
// BookingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Scheduling page offered from the review step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

// ---------------------------------------------------------------------------
// ContentConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_project_id")]
    pub project_id: String,
    #[serde(default = "default_dataset")]
    pub dataset: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_use_cdn")]
    pub use_cdn: bool,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Overrides the host derived from `project_id`; used for staging and tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_project_id() -> String {
    "u007fwie".to_string()
}

fn default_dataset() -> String {
    "production".to_string()
}

fn default_api_version() -> String {
    "2025-10-21".to_string()
}

fn default_use_cdn() -> bool {
    true
}

fn default_page_size() -> u32 {
    9
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            project_id: default_project_id(),
            dataset: default_dataset(),
            api_version: default_api_version(),
            use_cdn: default_use_cdn(),
            page_size: default_page_size(),
            base_url: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub wizard: WizardConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub content: ContentConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            wizard: WizardConfig::default(),
            booking: BookingConfig::default(),
            content: ContentConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(EstimatorError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Like [`Config::load`], but an uninitialized project gets the defaults.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(EstimatorError::NotInitialized) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.wizard.draft_ttl_minutes == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "wizard.draft_ttl_minutes is 0: drafts expire immediately".to_string(),
            });
        }

        if self.wizard.commit_delay_ms > 5_000 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "wizard.commit_delay_ms={} (>5000 makes selections feel unresponsive)",
                    self.wizard.commit_delay_ms
                ),
            });
        }

        match self.booking.url.as_deref() {
            None => warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "booking.url is not set: the review step has no call-to-action"
                    .to_string(),
            }),
            Some(url) if !(url.starts_with("https://") || url.starts_with("http://")) => {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("booking.url '{url}' is not an http(s) URL"),
                });
            }
            Some(_) => {}
        }

        if self.content.page_size == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "content.page_size must be at least 1".to_string(),
            });
        }

        if self.content.project_id.trim().is_empty() || self.content.dataset.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "content.project_id and content.dataset are required".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
