use crate::error::{EstimatorError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const ESTIMATOR_DIR: &str = ".estimator";
pub const DRAFTS_DIR: &str = ".estimator/drafts";
pub const REPORTS_DIR: &str = ".estimator/reports";

pub const CONFIG_FILE: &str = ".estimator/config.yaml";

/// Store key for the wizard's step position.
pub const STEP_KEY: &str = "estimate_step";
/// Store key for the wizard's answer draft.
pub const DATA_KEY: &str = "estimate_data";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn estimator_dir(root: &Path) -> PathBuf {
    root.join(ESTIMATOR_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn drafts_dir(root: &Path) -> PathBuf {
    root.join(DRAFTS_DIR)
}

pub fn reports_dir(root: &Path) -> PathBuf {
    root.join(REPORTS_DIR)
}

pub fn report_path(root: &Path, id: &str) -> PathBuf {
    reports_dir(root).join(format!("estimate-{id}.html"))
}

// ---------------------------------------------------------------------------
// Slug validation
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-_]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

/// Post slugs and store keys share one shape: lowercase, digits, `-` and `_`.
pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 96 || !slug_re().is_match(slug) {
        return Err(EstimatorError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
