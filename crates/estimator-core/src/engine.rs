//! Scoring and pricing.
//!
//! [`compute_estimate`] maps an [`AnswerSet`] to an [`Estimate`]. It is a pure
//! function: no I/O, no clock, no failure cases. Unset answers weigh nothing.
//!
//! Two separate complexity figures are produced. The *base score* is the sum
//! of per-answer weights and only selects a price band. The *total
//! complexity* adds fixed penalties for AI, voice and multi-tenancy and drives
//! duration, team tier and hours.

use crate::answers::{
    AnswerSet, Compliance, DesignScope, Feature, IntegrationsCount, Migration, Platform,
    ProjectType, Stage, Timeline, UserVolume,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

impl ProjectType {
    pub fn weight(self) -> u32 {
        match self {
            ProjectType::NewSaasMvp => 8,
            ProjectType::AutomationTool => 5,
            ProjectType::CrmPortal => 10,
            ProjectType::GhlApp => 9,
        }
    }
}

impl Feature {
    pub fn weight(self) -> u32 {
        match self {
            Feature::AuthRoles => 4,
            Feature::Payments => 6,
            Feature::Dashboards => 5,
            Feature::Scheduling => 4,
            Feature::Messaging => 6,
            Feature::FileUpload => 3,
            Feature::Ai => 8,
            Feature::RealtimeVoice => 10,
            Feature::MultiTenant => 8,
            Feature::MobileUi => 3,
        }
    }
}

impl Stage {
    pub fn weight(self) -> u32 {
        match self {
            Stage::IdeaOnly => 6,
            Stage::NocodeMvp => 4,
            Stage::BackendExists => 3,
            Stage::ScalingAutomation => 5,
        }
    }
}

impl IntegrationsCount {
    pub fn weight(self) -> u32 {
        match self {
            IntegrationsCount::Zero => 0,
            IntegrationsCount::OneToTwo => 4,
            IntegrationsCount::ThreeToFive => 8,
            IntegrationsCount::SixPlus => 14,
        }
    }
}

impl UserVolume {
    pub fn weight(self) -> u32 {
        match self {
            UserVolume::Under100 => 1,
            UserVolume::Under1k => 3,
            UserVolume::Under10k => 6,
            UserVolume::Over10k => 10,
        }
    }
}

impl Compliance {
    pub fn weight(self) -> u32 {
        match self {
            Compliance::Basic => 0,
            Compliance::PiiAudit => 6,
            Compliance::Industry => 10,
        }
    }
}

impl DesignScope {
    pub fn weight(self) -> u32 {
        match self {
            DesignScope::BasicUiKit => 2,
            DesignScope::DesignSystem => 6,
            DesignScope::PrototypeTesting => 10,
        }
    }
}

impl Migration {
    pub fn weight(self) -> u32 {
        match self {
            Migration::None => 0,
            Migration::CsvSimple => 3,
            Migration::ComplexMulti => 8,
        }
    }
}

impl Platform {
    pub fn weight(self) -> u32 {
        match self {
            Platform::Web => 0,
            Platform::GhlEmbedded => 6,
            Platform::AdminClientPortals => 4,
            Platform::PublicApi => 6,
        }
    }
}

impl Timeline {
    /// Price multiplier in percent.
    pub fn rush_percent(self) -> u64 {
        match self {
            Timeline::SixPlusMonths => 100,
            Timeline::ThreeToSixMonths => 110,
            Timeline::Asap => 125,
        }
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Band price charged when the answers describe a near-empty project.
pub const MINIMAL_SCOPE_PRICE: u64 = 800;
/// No quote goes below this.
pub const MIN_COST: u64 = 800;
/// `cost_high` is always at least this much above `cost_low`.
pub const MIN_SPREAD: u64 = 400;

const PRICE_BANDS: &[(u32, u64)] = &[(18, 900), (28, 1_200), (50, 3_000), (80, 7_500)];
const TOP_BAND_PRICE: u64 = 18_000;

const ADDON_AI: u64 = 2_500;
const ADDON_VOICE: u64 = 3_000;
const ADDON_MULTI_TENANT: u64 = 2_000;
const ADDON_COMPLIANCE: u64 = 1_500;
const ADDON_EMBEDDED: u64 = 800;
const ADDON_SCALE_USERS: u64 = 1_200;

const PENALTY_AI: u32 = 15;
const PENALTY_VOICE: u32 = 20;
const PENALTY_MULTI_TENANT: u32 = 12;

const BASE_STACK: &[&str] = &[
    "React",
    "Node (Nest.js)",
    "Postgres",
    "Redis",
    "AWS (S3 + Cloud)",
];

// ---------------------------------------------------------------------------
// Estimate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    A,
    B,
    C,
    D,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
            Tier::D => "D",
        }
    }

    pub fn team(self) -> &'static str {
        match self {
            Tier::A => "1 Full-stack, 0.2 PM",
            Tier::B => "1 FE, 1 BE, 0.4 PM",
            Tier::C => "1 FE, 2 BE, 1 PM, 0.5 QA",
            Tier::D => "1-2 FE, 3 BE, 1 PM, 1 QA, Solution Architect (pt)",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    pub has_ai: bool,
    pub has_voice: bool,
    pub multi_tenant: bool,
    pub platform_embedded: bool,
    pub scale_users: bool,
    pub needs_compliance: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub band_price: u64,
    pub add_on_price: u64,
    pub rush_percent: u64,
    pub minimal_scope: bool,
}

impl Pricing {
    /// Band plus add-ons with the rush multiplier applied, in whole currency
    /// units (rounded down; the range itself uses the exact value).
    pub fn subtotal(&self) -> u64 {
        (self.band_price + self.add_on_price) * self.rush_percent / 100
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseHours {
    pub core: u32,
    pub integrations: u32,
    pub hardening: u32,
}

impl PhaseHours {
    pub fn total(&self) -> u32 {
        self.core + self.integrations + self.hardening
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notes {
    /// Rush timeline was requested and the compressed schedule is still long.
    pub rush: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Estimate {
    pub base_score: u32,
    pub total_complexity: u32,
    pub flags: Flags,
    pub pricing: Pricing,
    pub cost_low: u64,
    pub cost_high: u64,
    pub weeks: u32,
    pub sprints: u32,
    pub tier: Tier,
    pub team: String,
    pub total_hours: u32,
    pub dev_hours: u32,
    pub phases: PhaseHours,
    pub stack: Vec<String>,
    pub notes: Notes,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

pub fn base_score(answers: &AnswerSet) -> u32 {
    answers.project_type.map_or(0, ProjectType::weight)
        + answers.features.iter().map(|f| f.weight()).sum::<u32>()
        + answers.stage.map_or(0, Stage::weight)
        + integrations(answers).weight()
        + answers.user_volume.map_or(0, UserVolume::weight)
        + answers.compliance.map_or(0, Compliance::weight)
        + answers.design_scope.map_or(0, DesignScope::weight)
        + answers.migration.map_or(0, Migration::weight)
        + answers.platforms.iter().map(|p| p.weight()).sum::<u32>()
}

fn integrations(answers: &AnswerSet) -> IntegrationsCount {
    answers.integrations_count.unwrap_or(IntegrationsCount::Zero)
}

pub fn flags(answers: &AnswerSet) -> Flags {
    Flags {
        has_ai: answers.features.contains(&Feature::Ai),
        has_voice: answers.features.contains(&Feature::RealtimeVoice),
        multi_tenant: answers.features.contains(&Feature::MultiTenant),
        platform_embedded: answers.platforms.contains(&Platform::GhlEmbedded),
        scale_users: matches!(
            answers.user_volume,
            Some(UserVolume::Under10k | UserVolume::Over10k)
        ),
        needs_compliance: matches!(
            answers.compliance,
            Some(Compliance::PiiAudit | Compliance::Industry)
        ),
    }
}

/// Nothing beyond a plain web app: no features, no extra platforms, no
/// integrations, basic compliance and the smallest audience.
pub fn is_minimal_scope(answers: &AnswerSet) -> bool {
    answers.features.is_empty()
        && answers.platforms.iter().all(|&p| p == Platform::Web)
        && integrations(answers) == IntegrationsCount::Zero
        && matches!(answers.compliance, None | Some(Compliance::Basic))
        && matches!(answers.user_volume, None | Some(UserVolume::Under100))
}

fn band_price(base: u32) -> u64 {
    PRICE_BANDS
        .iter()
        .find(|&&(max, _)| base <= max)
        .map_or(TOP_BAND_PRICE, |&(_, price)| price)
}

fn add_on_price(flags: &Flags) -> u64 {
    [
        (flags.has_ai, ADDON_AI),
        (flags.has_voice, ADDON_VOICE),
        (flags.multi_tenant, ADDON_MULTI_TENANT),
        (flags.needs_compliance, ADDON_COMPLIANCE),
        (flags.platform_embedded, ADDON_EMBEDDED),
        (flags.scale_users, ADDON_SCALE_USERS),
    ]
    .iter()
    .filter(|(on, _)| *on)
    .map(|(_, price)| price)
    .sum()
}

/// `ceil(numerator / denominator)` rounded up to a multiple of `step`.
fn round_up(numerator: u64, denominator: u64, step: u64) -> u64 {
    numerator.div_ceil(denominator * step) * step
}

/// Low/high quote around the rushed subtotal.
fn cost_range(pricing: &Pricing, base: u32) -> (u64, u64) {
    // Subtotal in hundredths so the rush multiplier stays exact.
    let subtotal_x100 = (pricing.band_price + pricing.add_on_price) * pricing.rush_percent;
    let variance = if base > 80 { 25 } else { 20 };
    let step = if subtotal_x100 < 2_000 * 100 { 100 } else { 250 };

    let low = round_up(subtotal_x100 * (100 - variance), 100 * 100, step);
    let high = round_up(subtotal_x100 * (100 + variance), 100 * 100, step);

    let low = low.max(MIN_COST);
    let high = high.max(low + MIN_SPREAD);
    (low, high)
}

fn duration_band(total_complexity: u32) -> (u32, u32) {
    match total_complexity {
        0..=25 => (3, 2),
        26..=50 => (5, 3),
        51..=80 => (8, 4),
        _ => (12, 6),
    }
}

fn tier(total_complexity: u32) -> Tier {
    match total_complexity {
        0..=30 => Tier::A,
        31..=60 => Tier::B,
        61..=100 => Tier::C,
        _ => Tier::D,
    }
}

/// Rounds `value * percent / 100` half up.
fn percent_of(value: u32, percent: u32) -> u32 {
    (value * percent + 50) / 100
}

fn stack(flags: &Flags) -> Vec<String> {
    let mut stack: Vec<&str> = BASE_STACK.to_vec();
    if flags.has_ai {
        stack.extend(["Python (FastAPI) AI microservice", "LLM (OpenAI/Anthropic)"]);
    }
    if flags.has_voice {
        stack.extend(["WebRTC/Retell", "WebSockets"]);
    }
    if flags.platform_embedded {
        stack.push("GHL OAuth + API");
    }
    stack.into_iter().map(String::from).collect()
}

pub fn compute_estimate(answers: &AnswerSet) -> Estimate {
    let base = base_score(answers);
    let flags = flags(answers);
    let minimal_scope = is_minimal_scope(answers);

    let pricing = Pricing {
        band_price: if minimal_scope {
            MINIMAL_SCOPE_PRICE
        } else {
            band_price(base)
        },
        add_on_price: if minimal_scope { 0 } else { add_on_price(&flags) },
        rush_percent: answers.timeline.map_or(100, Timeline::rush_percent),
        minimal_scope,
    };
    let (cost_low, cost_high) = cost_range(&pricing, base);

    let total_complexity = base
        + if flags.has_ai { PENALTY_AI } else { 0 }
        + if flags.has_voice { PENALTY_VOICE } else { 0 }
        + if flags.multi_tenant { PENALTY_MULTI_TENANT } else { 0 };

    let rush = answers.timeline == Some(Timeline::Asap);
    let (mut weeks, mut sprints) = duration_band(total_complexity);
    if rush && weeks > 4 {
        weeks = (weeks * 7).div_ceil(10).max(4);
        sprints = weeks.div_ceil(2);
    }

    let tier = tier(total_complexity);

    // round(total_complexity * 2.5)
    let total_hours = (total_complexity * 5 + 1) / 2;
    let (core_pct, integrations_pct) = if flags.has_ai || flags.has_voice {
        (40, 40)
    } else {
        (45, 35)
    };
    let core = percent_of(total_hours, core_pct);
    let integrations = percent_of(total_hours, integrations_pct);
    let phases = PhaseHours {
        core,
        integrations,
        hardening: total_hours.saturating_sub(core + integrations),
    };

    Estimate {
        base_score: base,
        total_complexity,
        flags,
        pricing,
        cost_low,
        cost_high,
        weeks,
        sprints,
        tier,
        team: tier.team().to_string(),
        total_hours,
        dev_hours: percent_of(total_hours, 85),
        phases,
        stack: stack(&flags),
        notes: Notes {
            rush: rush && weeks > 8,
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::Toggle;
    use std::collections::BTreeSet;

    fn minimal() -> AnswerSet {
        AnswerSet {
            project_type: Some(ProjectType::AutomationTool),
            ..AnswerSet::default()
        }
    }

    fn heavy() -> AnswerSet {
        AnswerSet {
            project_type: Some(ProjectType::GhlApp),
            features: BTreeSet::from([Feature::Ai, Feature::RealtimeVoice, Feature::MultiTenant]),
            stage: Some(Stage::ScalingAutomation),
            integrations_count: Some(IntegrationsCount::SixPlus),
            user_volume: Some(UserVolume::Over10k),
            compliance: Some(Compliance::Industry),
            timeline: Some(Timeline::Asap),
            design_scope: Some(DesignScope::PrototypeTesting),
            migration: Some(Migration::ComplexMulti),
            platforms: BTreeSet::from([Platform::GhlEmbedded, Platform::PublicApi]),
        }
    }

    /// A spread of answer sets covering every option at least once.
    fn sample_answers() -> Vec<AnswerSet> {
        let mut out = vec![AnswerSet::default(), minimal(), heavy()];
        for (i, &pt) in ProjectType::all().iter().enumerate() {
            for (j, &tl) in Timeline::all().iter().enumerate() {
                let mut a = AnswerSet {
                    project_type: Some(pt),
                    timeline: Some(tl),
                    stage: Some(Stage::all()[(i + j) % Stage::all().len()]),
                    integrations_count: Some(
                        IntegrationsCount::all()[(i * 3 + j) % IntegrationsCount::all().len()],
                    ),
                    user_volume: Some(UserVolume::all()[(i + 2 * j) % UserVolume::all().len()]),
                    compliance: Some(Compliance::all()[j % Compliance::all().len()]),
                    design_scope: Some(DesignScope::all()[i % DesignScope::all().len()]),
                    migration: Some(Migration::all()[(i + j) % Migration::all().len()]),
                    ..AnswerSet::default()
                };
                for &f in Feature::all().iter().skip(i).step_by(j + 2) {
                    a.features.insert(f);
                }
                for &p in Platform::all().iter().skip(j) {
                    a.platforms.insert(p);
                }
                out.push(a);
            }
        }
        out
    }

    #[test]
    fn weights_match_published_tables() {
        assert_eq!(ProjectType::GhlApp.weight(), 9);
        assert_eq!(Feature::RealtimeVoice.weight(), 10);
        assert_eq!(Feature::AuthRoles.weight(), 4);
        assert_eq!(Platform::PublicApi.weight(), 6);
        assert_eq!(IntegrationsCount::SixPlus.weight(), 14);
    }

    #[test]
    fn estimate_is_deterministic() {
        for a in sample_answers() {
            assert_eq!(compute_estimate(&a), compute_estimate(&a));
        }
    }

    #[test]
    fn adding_a_feature_never_lowers_score_or_floor() {
        for a in sample_answers() {
            let before = compute_estimate(&a);
            for &f in Feature::all() {
                if a.features.contains(&f) {
                    continue;
                }
                let mut more = a.clone();
                more.toggle(Toggle::Feature(f));
                let after = compute_estimate(&more);
                assert!(after.base_score >= before.base_score, "{f} lowered the score");
                assert!(after.cost_low >= before.cost_low, "{f} lowered cost_low");
            }
        }
    }

    #[test]
    fn range_is_valid_and_rounded() {
        for a in sample_answers() {
            let e = compute_estimate(&a);
            assert!(e.cost_low >= MIN_COST);
            assert!(e.cost_high >= e.cost_low + MIN_SPREAD);
            let subtotal_x100 =
                (e.pricing.band_price + e.pricing.add_on_price) * e.pricing.rush_percent;
            let step = if subtotal_x100 < 200_000 { 100 } else { 250 };
            assert_eq!(e.cost_low % step, 0, "cost_low {} not a multiple of {step}", e.cost_low);
            assert_eq!(e.cost_high % step, 0, "cost_high {} not a multiple of {step}", e.cost_high);
        }
    }

    #[test]
    fn minimal_scope_always_quotes_the_floor() {
        for &pt in ProjectType::all() {
            for &stage in Stage::all() {
                for &tl in Timeline::all() {
                    for &ds in DesignScope::all() {
                        for &mg in Migration::all() {
                            let a = AnswerSet {
                                project_type: Some(pt),
                                stage: Some(stage),
                                timeline: Some(tl),
                                design_scope: Some(ds),
                                migration: Some(mg),
                                ..AnswerSet::default()
                            };
                            assert!(is_minimal_scope(&a));
                            let e = compute_estimate(&a);
                            assert!(e.pricing.minimal_scope);
                            assert_eq!((e.cost_low, e.cost_high), (800, 1_200));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn web_only_platform_does_not_break_minimal_scope() {
        let mut a = minimal();
        a.platforms.clear();
        assert!(is_minimal_scope(&a));
        a.platforms.insert(Platform::AdminClientPortals);
        assert!(!is_minimal_scope(&a));
    }

    #[test]
    fn rush_compresses_long_schedules() {
        for a in sample_answers() {
            let slow = AnswerSet {
                timeline: Some(Timeline::SixPlusMonths),
                ..a.clone()
            };
            let base = compute_estimate(&slow);
            if base.weeks <= 8 {
                continue;
            }
            let fast = compute_estimate(&AnswerSet {
                timeline: Some(Timeline::Asap),
                ..a
            });
            let expected = ((base.weeks * 7).div_ceil(10)).max(4);
            assert_eq!(fast.weeks, expected);
            assert_eq!(fast.sprints, expected.div_ceil(2));
            assert!(fast.notes.rush);
        }
    }

    #[test]
    fn rush_on_short_schedule_is_not_flagged() {
        let mut a = AnswerSet::default();
        a.features.insert(Feature::Payments);
        a.features.insert(Feature::Dashboards);
        a.features.insert(Feature::Messaging);
        a.timeline = Some(Timeline::Asap);
        let e = compute_estimate(&a);
        // base 8+6+5+6+6+1+2 = 34 → 5 weeks, compressed to 4
        assert_eq!(e.base_score, 34);
        assert_eq!((e.weeks, e.sprints), (4, 2));
        assert!(!e.notes.rush);
    }

    #[test]
    fn minimal_path_scenario() {
        let e = compute_estimate(&minimal());
        assert_eq!(e.base_score, 14);
        assert!(e.pricing.minimal_scope);
        assert_eq!((e.cost_low, e.cost_high), (800, 1_200));
        assert_eq!((e.weeks, e.sprints), (3, 2));
        assert_eq!(e.tier, Tier::A);
        assert_eq!(e.team, "1 Full-stack, 0.2 PM");
        assert_eq!(e.total_hours, 35);
        assert_eq!(e.dev_hours, 30);
        assert_eq!(
            e.phases,
            PhaseHours {
                core: 16,
                integrations: 12,
                hardening: 7
            }
        );
        assert_eq!(e.stack.len(), 5);
        assert!(!e.notes.rush);
    }

    #[test]
    fn high_complexity_scenario() {
        let e = compute_estimate(&heavy());
        assert_eq!(e.base_score, 104);
        assert_eq!(e.total_complexity, 151);
        assert_eq!(e.pricing.band_price, 18_000);
        assert_eq!(e.pricing.add_on_price, 11_000);
        assert_eq!(e.pricing.rush_percent, 125);
        assert_eq!(e.pricing.subtotal(), 36_250);
        assert_eq!((e.cost_low, e.cost_high), (27_250, 45_500));
        assert_eq!((e.weeks, e.sprints), (9, 5));
        assert!(e.notes.rush);
        assert_eq!(e.tier, Tier::D);
        assert_eq!(e.total_hours, 378);
        assert_eq!(e.dev_hours, 321);
        assert_eq!(e.phases.core, 151);
        assert_eq!(e.phases.integrations, 151);
        assert_eq!(e.phases.hardening, 76);
        assert_eq!(e.stack.last().map(String::as_str), Some("GHL OAuth + API"));
        assert_eq!(e.stack.len(), 10);
    }

    #[test]
    fn phases_sum_to_total_hours() {
        for a in sample_answers() {
            let e = compute_estimate(&a);
            assert_eq!(e.phases.total(), e.total_hours);
        }
    }

    #[test]
    fn unset_answers_weigh_nothing() {
        let mut a = AnswerSet::default();
        for &field in crate::answers::Field::all() {
            a.clear(field);
        }
        let e = compute_estimate(&a);
        assert_eq!(e.base_score, 0);
        assert_eq!(e.flags, Flags::default());
        assert_eq!(e.pricing.rush_percent, 100);
        assert_eq!((e.cost_low, e.cost_high), (800, 1_200));
    }

    #[test]
    fn price_bands_are_step_functions() {
        assert_eq!(band_price(0), 900);
        assert_eq!(band_price(18), 900);
        assert_eq!(band_price(19), 1_200);
        assert_eq!(band_price(28), 1_200);
        assert_eq!(band_price(50), 3_000);
        assert_eq!(band_price(80), 7_500);
        assert_eq!(band_price(81), 18_000);
    }

    #[test]
    fn mid_timeline_applies_ten_percent() {
        let mut a = AnswerSet::default();
        a.features.insert(Feature::Payments);
        a.timeline = Some(Timeline::ThreeToSixMonths);
        let e = compute_estimate(&a);
        // base 8+6+6+1+2 = 23 → 1 200 band, ×1.10 = 1 320
        assert_eq!(e.pricing.subtotal(), 1_320);
        // 1056 → 1100, 1584 → 1600
        assert_eq!((e.cost_low, e.cost_high), (1_100, 1_600));
    }
}
