use crate::cmd::estimate::{print_estimate, print_summary};
use crate::output::{print_json, print_table};
use anyhow::Context;
use chrono::Utc;
use clap::Subcommand;
use estimator_core::answers::{Choice, Field, FieldKind, Toggle};
use estimator_core::config::Config;
use estimator_core::report;
use estimator_core::store::{FileStore, KvStore};
use estimator_core::wizard::{Step, Wizard, WizardSettings, STEP_COUNT};
use estimator_core::{io, paths};
use serde::Serialize;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum WizardSubcommand {
    /// List every step with its options
    Steps,

    /// Show the current step, its options and the live estimate
    Show,

    /// Choose an option on a single-select question
    Select {
        /// Question, e.g. project_type
        field: Field,
        /// Option value, e.g. crm_portal
        value: String,
    },

    /// Add or remove an option on a multi-select question
    Toggle {
        /// features or platforms
        field: Field,
        value: String,
    },

    /// Unset a question
    Clear { field: Field },

    /// Validate the current step and move forward
    Next,

    /// Move back one step
    Back,

    /// Return to the first question, keeping answers
    Edit,

    /// Discard all answers and the saved draft
    Reset,

    /// Freeze the estimate and write the report (review step only)
    Submit,

    /// Write the printable report for the current answers
    Export {
        /// Output file (default: .estimator/reports/estimate-draft.html)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Open the booking page
    Book {
        /// Print the URL instead of opening a browser
        #[arg(long)]
        no_open: bool,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: WizardSubcommand, json: bool) -> anyhow::Result<()> {
    if let WizardSubcommand::Steps = subcmd {
        return steps(json);
    }

    let config = Config::load(root).context("failed to load config")?;
    let settings = WizardSettings::from(&config.wizard);
    let mut wizard = Wizard::mount(FileStore::new(root), settings, Utc::now());

    match subcmd {
        WizardSubcommand::Steps => steps(json),
        WizardSubcommand::Show => show(&wizard, json),
        WizardSubcommand::Select { field, value } => select(&mut wizard, field, &value, json),
        WizardSubcommand::Toggle { field, value } => toggle(&mut wizard, field, &value, json),
        WizardSubcommand::Clear { field } => {
            wizard.clear(field, Utc::now());
            report_answer(&wizard, field, json)
        }
        WizardSubcommand::Next => {
            wizard.next(Utc::now())?;
            report_position(&wizard, json)
        }
        WizardSubcommand::Back => {
            wizard.back(Utc::now());
            report_position(&wizard, json)
        }
        WizardSubcommand::Edit => {
            wizard.restart_editing(Utc::now());
            report_position(&wizard, json)
        }
        WizardSubcommand::Reset => {
            wizard.reset();
            if json {
                print_json(&serde_json::json!({ "reset": true }))?;
            } else {
                println!("Wizard reset.");
            }
            Ok(())
        }
        WizardSubcommand::Submit => submit(root, &config, &mut wizard, json),
        WizardSubcommand::Export { out } => export(root, &config, &wizard, out, json),
        WizardSubcommand::Book { no_open } => book(&config, no_open, json),
    }
}

// ---------------------------------------------------------------------------
// steps / show
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct OptionView {
    value: &'static str,
    label: &'static str,
    selected: bool,
}

#[derive(Serialize)]
struct StepView {
    index: usize,
    step: Step,
    title: &'static str,
    kind: &'static str,
    options: Vec<OptionView>,
}

fn step_view<S: KvStore>(wizard: Option<&Wizard<S>>, index: usize) -> StepView {
    let step = Step::at(index);
    let selected = |field: Field, value: &str| {
        wizard.is_some_and(|w| w.answers().values(field).contains(&value))
    };
    let options = step
        .field()
        .map(|field| {
            field
                .options()
                .into_iter()
                .map(|o| OptionView {
                    value: o.value,
                    label: o.label,
                    selected: selected(field, o.value),
                })
                .collect()
        })
        .unwrap_or_default();
    StepView {
        index,
        step,
        title: step.title(),
        kind: step.kind_str(),
        options,
    }
}

fn steps(json: bool) -> anyhow::Result<()> {
    let views: Vec<StepView> = (0..STEP_COUNT)
        .map(|i| step_view::<FileStore>(None, i))
        .collect();
    if json {
        return print_json(&views);
    }
    let rows = views
        .iter()
        .map(|v| {
            vec![
                (v.index + 1).to_string(),
                v.step.to_string(),
                v.kind.to_string(),
                v.title.to_string(),
                v.options
                    .iter()
                    .map(|o| o.value)
                    .collect::<Vec<_>>()
                    .join(", "),
            ]
        })
        .collect();
    print_table(&["#", "STEP", "KIND", "TITLE", "OPTIONS"], rows);
    Ok(())
}

fn show<S: KvStore>(wizard: &Wizard<S>, json: bool) -> anyhow::Result<()> {
    let now = Utc::now();
    let view = step_view(Some(wizard), wizard.current_step());
    let notice = wizard.notice(now).map(|n| n.message.clone());

    if json {
        return print_json(&serde_json::json!({
            "current": view,
            "total": STEP_COUNT,
            "answers": wizard.answers(),
            "estimate": wizard.estimate(),
            "notice": notice,
        }));
    }

    if let Some(message) = notice {
        println!("{message}\n");
    }
    println!(
        "Step {} of {}: {}",
        view.index + 1,
        STEP_COUNT,
        view.title
    );

    match view.step {
        Step::Question(field) => {
            println!("({})", field.kind().as_str());
            for o in &view.options {
                let mark = match (field.kind(), o.selected) {
                    (FieldKind::Single, true) => "(x)",
                    (FieldKind::Single, false) => "( )",
                    (FieldKind::Multi, true) => "[x]",
                    (FieldKind::Multi, false) => "[ ]",
                };
                println!("  {mark} {:<22} {}", o.value, o.label);
            }
            let e = wizard.estimate();
            println!(
                "\nLive estimate: ${} - ${}, {} weeks",
                report::thousands(e.cost_low),
                report::thousands(e.cost_high),
                e.weeks
            );
        }
        Step::Review => {
            print_summary(wizard.answers());
            println!();
            print_estimate(wizard.estimate());
            println!("\nRun 'estimator wizard submit' to finalize, or 'estimator wizard edit' to change answers.");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Answer commands
// ---------------------------------------------------------------------------

fn select<S: KvStore>(
    wizard: &mut Wizard<S>,
    field: Field,
    value: &str,
    json: bool,
) -> anyhow::Result<()> {
    let choice = Choice::parse(field, value)?;
    let step_before = wizard.current_step();
    wizard.select(choice, Utc::now());
    wait_for_commit(wizard)?;

    if !json && wizard.current_step() != step_before {
        report_answer(wizard, field, false)?;
        return report_position(wizard, false);
    }
    report_answer(wizard, field, json)
}

/// Sleep until the pending selection is due, then commit it.
fn wait_for_commit<S: KvStore>(wizard: &mut Wizard<S>) -> anyhow::Result<Option<Field>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let committed = rt.block_on(async {
        while let Some(pending) = wizard.pending().copied() {
            let wait = (pending.due - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            if let Some(field) = wizard.poll(Utc::now()) {
                return Some(field);
            }
        }
        None
    });
    Ok(committed)
}

fn toggle<S: KvStore>(
    wizard: &mut Wizard<S>,
    field: Field,
    value: &str,
    json: bool,
) -> anyhow::Result<()> {
    let toggle = Toggle::parse(field, value)?;
    let selected = wizard.toggle(toggle, Utc::now());
    if !json {
        println!("{} {value}", if selected { "added" } else { "removed" });
    }
    report_answer(wizard, field, json)
}

fn report_answer<S: KvStore>(wizard: &Wizard<S>, field: Field, json: bool) -> anyhow::Result<()> {
    let values = wizard.answers().values(field);
    let e = wizard.estimate();
    if json {
        return print_json(&serde_json::json!({
            "field": field,
            "values": values,
            "step": wizard.current_step(),
            "cost_low": e.cost_low,
            "cost_high": e.cost_high,
        }));
    }
    let shown = if values.is_empty() {
        "(none)".to_string()
    } else {
        values.join(", ")
    };
    println!("{field} = {shown}");
    println!(
        "Live estimate: ${} - ${}",
        report::thousands(e.cost_low),
        report::thousands(e.cost_high)
    );
    Ok(())
}

fn report_position<S: KvStore>(wizard: &Wizard<S>, json: bool) -> anyhow::Result<()> {
    let step = wizard.step();
    if json {
        return print_json(&serde_json::json!({
            "index": wizard.current_step(),
            "step": step,
            "title": step.title(),
        }));
    }
    println!(
        "Step {} of {}: {}",
        wizard.current_step() + 1,
        STEP_COUNT,
        step.title()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// submit / export / book
// ---------------------------------------------------------------------------

fn submit<S: KvStore>(
    root: &Path,
    config: &Config,
    wizard: &mut Wizard<S>,
    json: bool,
) -> anyhow::Result<()> {
    let submission = wizard.submit(Utc::now())?.clone();
    let html = report::render_html(
        &submission.answers,
        &submission.estimate,
        config.booking.url.as_deref(),
    )?;
    let path = paths::report_path(root, &submission.id.to_string());
    io::atomic_write(&path, html.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    if json {
        return print_json(&serde_json::json!({
            "submission": submission,
            "report": path,
        }));
    }
    println!("Estimate submitted: {}", submission.id);
    print_estimate(&submission.estimate);
    println!("\nReport written to {}", path.display());
    if let Some(url) = &config.booking.url {
        println!("Book a call: {url}");
    }
    Ok(())
}

fn export<S: KvStore>(
    root: &Path,
    config: &Config,
    wizard: &Wizard<S>,
    out: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let html = report::render_html(
        wizard.answers(),
        wizard.estimate(),
        config.booking.url.as_deref(),
    )?;
    let path = out.unwrap_or_else(|| paths::report_path(root, "draft"));
    io::atomic_write(&path, html.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    if json {
        print_json(&serde_json::json!({ "report": path }))
    } else {
        println!("Report written to {}", path.display());
        Ok(())
    }
}

fn book(config: &Config, no_open: bool, json: bool) -> anyhow::Result<()> {
    let url = config
        .booking
        .url
        .as_deref()
        .with_context(|| format!("booking.url is not set in {}", paths::CONFIG_FILE))?;

    if !no_open {
        open::that(url).with_context(|| format!("failed to open {url}"))?;
    }
    if json {
        print_json(&serde_json::json!({ "url": url, "opened": !no_open }))
    } else {
        println!("{url}");
        Ok(())
    }
}
