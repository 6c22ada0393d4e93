use anyhow::Context;
use estimator_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing estimator in: {}", root.display());

    for dir in [paths::ESTIMATOR_DIR, paths::DRAFTS_DIR, paths::REPORTS_DIR] {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let yaml = serde_yaml::to_string(&Config::default()).context("failed to render config")?;
    let written = io::write_if_missing(&paths::config_path(root), yaml.as_bytes())
        .context("failed to write config.yaml")?;
    if written {
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }

    println!("\nNext: set booking.url in {}, then run 'estimator wizard show'.", paths::CONFIG_FILE);
    Ok(())
}
