//! Review summary and the printable HTML export.

use crate::answers::{AnswerSet, Field, FieldKind};
use crate::engine::Estimate;
use crate::error::Result;
use serde::Serialize;
use tera::{Context, Tera};

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryLine {
    pub field: Field,
    pub title: &'static str,
    pub value: String,
}

/// One line per question, in questionnaire order.
pub fn summary(answers: &AnswerSet) -> Vec<SummaryLine> {
    Field::all()
        .iter()
        .map(|&field| {
            let labels = answers.labels(field);
            let value = match (labels.is_empty(), field.kind()) {
                (false, _) => labels.join(", "),
                (true, FieldKind::Multi) => "(none)".to_string(),
                (true, FieldKind::Single) => "(not set)".to_string(),
            };
            SummaryLine {
                field,
                title: field.title(),
                value,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// `27250` → `27,250`.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ---------------------------------------------------------------------------
// HTML export
// ---------------------------------------------------------------------------

const TEMPLATE_NAME: &str = "estimate.html";
const TEMPLATE: &str = include_str!("../templates/estimate.html");

/// `&`, `<`, `>` and `"`, so values are safe in text and in quoted attributes.
fn escape(s: &str) -> String {
    html_escape::encode_double_quoted_attribute(s).into_owned()
}

fn templates() -> Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)?;
    tera.set_escape_fn(escape);
    Ok(tera)
}

/// A standalone page suitable for printing or saving as PDF.
pub fn render_html(
    answers: &AnswerSet,
    estimate: &Estimate,
    booking_url: Option<&str>,
) -> Result<String> {
    let mut ctx = Context::new();
    ctx.insert("estimate", estimate);
    ctx.insert("tier", estimate.tier.as_str());
    ctx.insert("cost_low", &thousands(estimate.cost_low));
    ctx.insert("cost_high", &thousands(estimate.cost_high));
    ctx.insert("lines", &summary(answers));
    ctx.insert("answers_json", &serde_json::to_string_pretty(answers)?);
    ctx.insert("booking_url", &booking_url);

    Ok(templates()?.render(TEMPLATE_NAME, &ctx)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
