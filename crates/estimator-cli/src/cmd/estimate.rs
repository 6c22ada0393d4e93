use crate::output::print_json;
use anyhow::Context;
use clap::Args;
use estimator_core::answers::{
    AnswerSet, Compliance, DesignScope, Feature, IntegrationsCount, Migration, Platform,
    ProjectType, Stage, Timeline, UserVolume,
};
use estimator_core::config::Config;
use estimator_core::engine::{compute_estimate, Estimate};
use estimator_core::{io, report};
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct EstimateArgs {
    /// YAML or JSON file holding an answer set; flags override it
    #[arg(long, value_name = "FILE")]
    answers: Option<PathBuf>,

    #[arg(long)]
    project_type: Option<ProjectType>,

    /// Repeat for each feature; replaces the features from --answers
    #[arg(long = "feature", value_name = "FEATURE")]
    features: Vec<Feature>,

    #[arg(long)]
    stage: Option<Stage>,

    #[arg(long = "integrations")]
    integrations_count: Option<IntegrationsCount>,

    #[arg(long)]
    user_volume: Option<UserVolume>,

    #[arg(long)]
    compliance: Option<Compliance>,

    #[arg(long)]
    timeline: Option<Timeline>,

    #[arg(long = "design")]
    design_scope: Option<DesignScope>,

    #[arg(long)]
    migration: Option<Migration>,

    /// Repeat for each platform; replaces the platforms from --answers
    #[arg(long = "platform", value_name = "PLATFORM")]
    platforms: Vec<Platform>,

    /// Also write the printable report to FILE
    #[arg(long, value_name = "FILE")]
    html: Option<PathBuf>,
}

impl EstimateArgs {
    fn answer_set(&self) -> anyhow::Result<AnswerSet> {
        let mut answers = match &self.answers {
            Some(path) => {
                let data = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_yaml::from_str::<AnswerSet>(&data)
                    .with_context(|| format!("failed to parse answers in {}", path.display()))?
            }
            None => AnswerSet::default(),
        };

        answers.project_type = self.project_type.or(answers.project_type);
        answers.stage = self.stage.or(answers.stage);
        answers.integrations_count = self.integrations_count.or(answers.integrations_count);
        answers.user_volume = self.user_volume.or(answers.user_volume);
        answers.compliance = self.compliance.or(answers.compliance);
        answers.timeline = self.timeline.or(answers.timeline);
        answers.design_scope = self.design_scope.or(answers.design_scope);
        answers.migration = self.migration.or(answers.migration);
        if !self.features.is_empty() {
            answers.features = self.features.iter().copied().collect();
        }
        if !self.platforms.is_empty() {
            answers.platforms = self.platforms.iter().copied().collect();
        }
        Ok(answers)
    }
}

pub fn run(root: &Path, args: &EstimateArgs, json: bool) -> anyhow::Result<()> {
    let answers = args.answer_set()?;
    let estimate = compute_estimate(&answers);

    if let Some(out) = &args.html {
        let config = Config::load_or_default(root).context("failed to load config")?;
        let html = report::render_html(&answers, &estimate, config.booking.url.as_deref())?;
        io::atomic_write(out, html.as_bytes())
            .with_context(|| format!("failed to write {}", out.display()))?;
    }

    if json {
        print_json(&serde_json::json!({
            "answers": answers,
            "estimate": estimate,
        }))?;
    } else {
        print_summary(&answers);
        println!();
        print_estimate(&estimate);
        if let Some(out) = &args.html {
            println!("\nReport written to {}", out.display());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared text output
// ---------------------------------------------------------------------------

pub fn print_summary(answers: &AnswerSet) {
    println!("Selections");
    for line in report::summary(answers) {
        println!("  {:<36} {}", format!("{}:", line.title), line.value);
    }
}

pub fn print_estimate(e: &Estimate) {
    println!("Estimate");
    println!(
        "  Cost:       ${} - ${}",
        report::thousands(e.cost_low),
        report::thousands(e.cost_high)
    );
    println!("  Timeline:   {} weeks ({} sprints)", e.weeks, e.sprints);
    println!("  Team:       {} (tier {})", e.team, e.tier.as_str());
    println!(
        "  Hours:      {} total, {} dev (core {} / integrations {} / hardening {})",
        e.total_hours, e.dev_hours, e.phases.core, e.phases.integrations, e.phases.hardening
    );
    println!(
        "  Score:      base {}, complexity {}",
        e.base_score, e.total_complexity
    );
    println!("  Stack:      {}", e.stack.join(", "));
    if e.notes.rush {
        println!("  Note:       rush timeline; expect a larger team or parallel workstreams");
    }
}
