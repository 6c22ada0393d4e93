//! The questionnaire as a linear state machine.
//!
//! One step per [`Field`] in questionnaire order, then a terminal review
//! step. Which steps exist never depends on the answers; only the live
//! estimate does.
//!
//! Single-select choices do not commit immediately: [`Wizard::select`] stages
//! the choice in a single pending slot with a deadline, and [`Wizard::poll`]
//! commits it once the deadline has passed. A newer selection replaces the
//! pending one, so only the settled value commits.
//!
//! Every step change and every answer change is written to the draft store.

use crate::answers::{AnswerSet, Choice, Field, FieldKind, Toggle};
use crate::config::WizardConfig;
use crate::engine::{compute_estimate, Estimate};
use crate::error::{EstimatorError, Result};
use crate::store::{DraftStore, KvStore};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// Number of steps: every question plus review.
pub const STEP_COUNT: usize = 11;
pub const REVIEW_STEP: usize = STEP_COUNT - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum Step {
    Question(Field),
    Review,
}

impl Step {
    pub fn at(index: usize) -> Step {
        Field::all()
            .get(index)
            .map_or(Step::Review, |&f| Step::Question(f))
    }

    pub fn all() -> Vec<Step> {
        (0..STEP_COUNT).map(Step::at).collect()
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::Question(field) => field.title(),
            Step::Review => "Review & submit",
        }
    }

    pub fn kind_str(self) -> &'static str {
        match self {
            Step::Question(field) => match field.kind() {
                FieldKind::Single => "single",
                FieldKind::Multi => "multi",
            },
            Step::Review => "review",
        }
    }

    pub fn field(self) -> Option<Field> {
        match self {
            Step::Question(field) => Some(field),
            Step::Review => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Question(field) => f.write_str(field.as_str()),
            Step::Review => f.write_str("review"),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WizardSettings {
    pub draft_ttl: Duration,
    pub commit_delay: Duration,
    pub notice: Duration,
    pub auto_advance: bool,
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self::from(&WizardConfig::default())
    }
}

impl From<&WizardConfig> for WizardSettings {
    fn from(cfg: &WizardConfig) -> Self {
        Self {
            draft_ttl: Duration::minutes(i64::from(cfg.draft_ttl_minutes)),
            commit_delay: Duration::milliseconds(i64::from(cfg.commit_delay_ms)),
            notice: Duration::milliseconds(i64::from(cfg.notice_ms)),
            auto_advance: cfg.auto_advance,
        }
    }
}

// ---------------------------------------------------------------------------
// Session pieces
// ---------------------------------------------------------------------------

/// A single-select choice waiting for its commit deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSelection {
    pub choice: Choice,
    pub due: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

pub const RESTORED_NOTICE: &str = "Welcome back! Your previous answers were restored.";

/// The frozen result of a completed questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub answers: AnswerSet,
    pub estimate: Estimate,
}

// ---------------------------------------------------------------------------
// Wizard
// ---------------------------------------------------------------------------

pub struct Wizard<S: KvStore> {
    answers: AnswerSet,
    current_step: usize,
    errors: BTreeMap<Field, String>,
    estimate: Estimate,
    pending: Option<PendingSelection>,
    notice: Option<Notice>,
    submission: Option<Submission>,
    settings: WizardSettings,
    drafts: DraftStore<S>,
}

impl<S: KvStore> Wizard<S> {
    /// Start a session, restoring any unexpired draft from `store`.
    pub fn mount(store: S, settings: WizardSettings, now: DateTime<Utc>) -> Self {
        let drafts = DraftStore::new(store, settings.draft_ttl);
        let current_step = drafts
            .load_step(now)
            .map_or(0, |step| step.min(REVIEW_STEP));
        let restored = drafts.load_answers(now);

        let notice = restored
            .as_ref()
            .filter(|answers| **answers != AnswerSet::default())
            .map(|_| Notice {
                message: RESTORED_NOTICE.to_string(),
                expires_at: now + settings.notice,
            });
        if notice.is_some() {
            tracing::debug!(step = current_step, "restored draft");
        }

        let answers = restored.unwrap_or_default();
        Self {
            estimate: compute_estimate(&answers),
            answers,
            current_step,
            errors: BTreeMap::new(),
            pending: None,
            notice,
            submission: None,
            settings,
            drafts,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn step(&self) -> Step {
        Step::at(self.current_step)
    }

    pub fn is_at_review(&self) -> bool {
        self.current_step == REVIEW_STEP
    }

    pub fn errors(&self) -> &BTreeMap<Field, String> {
        &self.errors
    }

    pub fn error(&self, field: Field) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    /// Live estimate for the current answers.
    pub fn estimate(&self) -> &Estimate {
        &self.estimate
    }

    pub fn pending(&self) -> Option<&PendingSelection> {
        self.pending.as_ref()
    }

    pub fn submission(&self) -> Option<&Submission> {
        self.submission.as_ref()
    }

    pub fn settings(&self) -> &WizardSettings {
        &self.settings
    }

    /// The restore notice, while it has not expired.
    pub fn notice(&self, now: DateTime<Utc>) -> Option<&Notice> {
        self.notice.as_ref().filter(|n| now < n.expires_at)
    }

    // -----------------------------------------------------------------------
    // Single-select
    // -----------------------------------------------------------------------

    /// Stage `choice`; it commits on the first [`Wizard::poll`] at or after
    /// `now + commit_delay`. Replaces any pending selection.
    pub fn select(&mut self, choice: Choice, now: DateTime<Utc>) {
        let field = choice.field();
        self.errors.remove(&field);
        if let Some(prev) = self.pending.take() {
            tracing::debug!(field = %prev.choice.field(), value = prev.choice.as_str(), "pending selection replaced");
        }
        self.pending = Some(PendingSelection {
            choice,
            due: now + self.settings.commit_delay,
        });
    }

    /// Commit the pending selection if its deadline has passed. Returns the
    /// committed field.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<Field> {
        if self.notice.as_ref().is_some_and(|n| now >= n.expires_at) {
            self.notice = None;
        }

        let pending = self.pending.filter(|p| now >= p.due)?;
        self.pending = None;

        let field = pending.choice.field();
        self.answers.apply(pending.choice);
        self.answers_changed(now);
        tracing::debug!(%field, value = pending.choice.as_str(), "selection committed");

        if self.settings.auto_advance && self.step() == Step::Question(field) {
            self.move_to(self.current_step + 1, now);
        }
        Some(field)
    }

    /// Drop the pending selection without committing it.
    pub fn cancel_pending(&mut self) -> Option<PendingSelection> {
        self.pending.take()
    }

    /// Unset a single-select field (or empty a multi-select one).
    pub fn clear(&mut self, field: Field, now: DateTime<Utc>) {
        if self.pending.is_some_and(|p| p.choice.field() == field) {
            self.pending = None;
        }
        self.errors.remove(&field);
        self.answers.clear(field);
        self.answers_changed(now);
    }

    // -----------------------------------------------------------------------
    // Multi-select
    // -----------------------------------------------------------------------

    /// Add or remove a multi-select value immediately. Returns whether the
    /// value is now selected.
    pub fn toggle(&mut self, toggle: Toggle, now: DateTime<Utc>) -> bool {
        self.errors.remove(&toggle.field());
        let selected = self.answers.toggle(toggle);
        self.answers_changed(now);
        selected
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Validate the current step and advance one step. On a missing answer
    /// the error is recorded against the field and the step does not change.
    pub fn next(&mut self, now: DateTime<Utc>) -> Result<usize> {
        if let Step::Question(field) = self.step() {
            self.validate(field)?;
        }
        self.move_to(self.current_step + 1, now);
        Ok(self.current_step)
    }

    pub fn back(&mut self, now: DateTime<Utc>) -> usize {
        self.move_to(self.current_step.saturating_sub(1), now);
        self.current_step
    }

    /// Return to the first question keeping all answers.
    pub fn restart_editing(&mut self, now: DateTime<Utc>) {
        self.move_to(0, now);
    }

    /// Back to a blank session: default answers, first step, no saved draft.
    pub fn reset(&mut self) {
        self.answers = AnswerSet::default();
        self.estimate = compute_estimate(&self.answers);
        self.current_step = 0;
        self.errors.clear();
        self.pending = None;
        self.notice = None;
        self.submission = None;
        self.drafts.clear();
        tracing::debug!("wizard reset");
    }

    /// Freeze the answers and estimate. Only available on the review step;
    /// clears the saved draft.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Result<&Submission> {
        if !self.is_at_review() {
            return Err(EstimatorError::NotAtReview(self.current_step));
        }
        for &field in Field::all() {
            self.validate(field)?;
        }

        let submission = Submission {
            id: Uuid::new_v4(),
            submitted_at: now,
            answers: self.answers.clone(),
            estimate: self.estimate.clone(),
        };
        tracing::info!(
            id = %submission.id,
            cost_low = submission.estimate.cost_low,
            cost_high = submission.estimate.cost_high,
            "estimate submitted"
        );
        self.drafts.clear();
        Ok(&*self.submission.insert(submission))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn validate(&mut self, field: Field) -> Result<()> {
        if self.answers.is_answered(field) {
            return Ok(());
        }
        let message = format!("Please choose {} to continue.", field.noun());
        self.errors.insert(field, message.clone());
        Err(EstimatorError::StepIncomplete {
            field: field.to_string(),
            message,
        })
    }

    fn move_to(&mut self, step: usize, now: DateTime<Utc>) {
        let step = step.min(REVIEW_STEP);
        if step == self.current_step {
            return;
        }
        self.current_step = step;
        self.drafts.save_step(step, now);
    }

    fn answers_changed(&mut self, now: DateTime<Utc>) {
        self.estimate = compute_estimate(&self.answers);
        self.drafts.save_answers(&self.answers, now);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::{Feature, Platform, ProjectType, Stage, Timeline};
    use crate::paths;
    use crate::store::tests::BrokenStore;
    use crate::store::MemoryStore;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn ms(n: i64) -> Duration {
        Duration::milliseconds(n)
    }

    fn wizard(store: &MemoryStore) -> Wizard<&MemoryStore> {
        Wizard::mount(store, WizardSettings::default(), t0())
    }

    /// Select and let the commit delay pass.
    fn choose<S: KvStore>(w: &mut Wizard<S>, choice: Choice, now: DateTime<Utc>) -> DateTime<Utc> {
        w.select(choice, now);
        let later = now + w.settings().commit_delay;
        w.poll(later);
        later
    }

    #[test]
    fn step_list_is_every_question_then_review() {
        assert_eq!(STEP_COUNT, Field::all().len() + 1);
        let steps = Step::all();
        assert_eq!(steps[0], Step::Question(Field::ProjectType));
        assert_eq!(steps[1], Step::Question(Field::Features));
        assert_eq!(steps[9], Step::Question(Field::Platforms));
        assert_eq!(steps[REVIEW_STEP], Step::Review);
        assert_eq!(Step::at(42), Step::Review);
    }

    #[test]
    fn fresh_mount_uses_defaults() {
        let mem = MemoryStore::new();
        let w = wizard(&mem);
        assert_eq!(w.current_step(), 0);
        assert_eq!(w.answers(), &AnswerSet::default());
        assert!(w.errors().is_empty());
        assert!(w.notice(t0()).is_none());
        assert_eq!(w.estimate(), &compute_estimate(&AnswerSet::default()));
    }

    #[test]
    fn selection_commits_after_delay() {
        let mem = MemoryStore::new();
        let mut w = wizard(&mem);
        w.select(Choice::ProjectType(ProjectType::CrmPortal), t0());
        assert_eq!(w.poll(t0() + ms(419)), None);
        assert_eq!(w.answers().project_type, Some(ProjectType::NewSaasMvp));
        assert_eq!(w.poll(t0() + ms(420)), Some(Field::ProjectType));
        assert_eq!(w.answers().project_type, Some(ProjectType::CrmPortal));
        assert!(w.pending().is_none());
        assert_eq!(w.current_step(), 0, "auto-advance is off by default");
    }

    #[test]
    fn rapid_reselection_commits_only_the_last_value() {
        let mem = MemoryStore::new();
        let mut w = wizard(&mem);
        w.select(Choice::ProjectType(ProjectType::CrmPortal), t0());
        w.select(Choice::ProjectType(ProjectType::GhlApp), t0() + ms(300));
        // the first deadline has passed but it was replaced
        assert_eq!(w.poll(t0() + ms(500)), None);
        assert_eq!(w.poll(t0() + ms(720)), Some(Field::ProjectType));
        assert_eq!(w.answers().project_type, Some(ProjectType::GhlApp));
    }

    #[test]
    fn cancelled_selection_never_commits() {
        let mem = MemoryStore::new();
        let mut w = wizard(&mem);
        w.select(Choice::Timeline(Timeline::Asap), t0());
        assert!(w.cancel_pending().is_some());
        assert_eq!(w.poll(t0() + ms(10_000)), None);
        assert_eq!(w.answers().timeline, Some(Timeline::SixPlusMonths));
    }

    #[test]
    fn auto_advance_moves_on_commit() {
        let mem = MemoryStore::new();
        let settings = WizardSettings {
            auto_advance: true,
            ..WizardSettings::default()
        };
        let mut w = Wizard::mount(&mem, settings, t0());
        choose(&mut w, Choice::ProjectType(ProjectType::GhlApp), t0());
        assert_eq!(w.current_step(), 1);
        // a commit for a field other than the current step does not advance
        choose(&mut w, Choice::Stage(Stage::BackendExists), t0());
        assert_eq!(w.current_step(), 1);
    }

    #[test]
    fn toggle_is_immediate() {
        let mem = MemoryStore::new();
        let mut w = wizard(&mem);
        let before = w.estimate().base_score;
        assert!(w.toggle(Toggle::Feature(Feature::Payments), t0()));
        assert!(w.answers().features.contains(&Feature::Payments));
        assert_eq!(w.estimate().base_score, before + 6);
        assert!(!w.toggle(Toggle::Feature(Feature::Payments), t0()));
        assert_eq!(w.estimate().base_score, before);
        assert_eq!(w.current_step(), 0);
    }

    #[test]
    fn next_blocks_on_unset_single_select() {
        let mem = MemoryStore::new();
        let mut w = wizard(&mem);
        w.clear(Field::ProjectType, t0());

        let err = w.next(t0()).unwrap_err();
        assert!(matches!(err, EstimatorError::StepIncomplete { .. }));
        assert_eq!(w.current_step(), 0);
        assert!(w.error(Field::ProjectType).is_some());

        // selecting clears the error right away, before the commit
        w.select(Choice::ProjectType(ProjectType::AutomationTool), t0());
        assert!(w.error(Field::ProjectType).is_none());
        w.poll(t0() + ms(420));

        assert_eq!(w.next(t0()).unwrap(), 1);
    }

    #[test]
    fn multi_select_steps_accept_empty_sets() {
        let mem = MemoryStore::new();
        let mut w = wizard(&mem);
        w.next(t0()).unwrap();
        assert_eq!(w.step(), Step::Question(Field::Features));
        assert!(w.answers().features.is_empty());
        assert_eq!(w.next(t0()).unwrap(), 2);
    }

    #[test]
    fn navigation_is_clamped() {
        let mem = MemoryStore::new();
        let mut w = wizard(&mem);
        assert_eq!(w.back(t0()), 0);
        for _ in 0..STEP_COUNT + 3 {
            w.next(t0()).unwrap();
        }
        assert_eq!(w.current_step(), REVIEW_STEP);
        assert!(w.is_at_review());
        assert_eq!(w.back(t0()), REVIEW_STEP - 1);
        w.restart_editing(t0());
        assert_eq!(w.current_step(), 0);
    }

    #[test]
    fn minimal_path_reaches_review_with_floor_price() {
        let mem = MemoryStore::new();
        let mut w = wizard(&mem);
        let now = choose(&mut w, Choice::ProjectType(ProjectType::AutomationTool), t0());
        while !w.is_at_review() {
            w.next(now).unwrap();
        }
        let e = w.estimate();
        assert_eq!((e.cost_low, e.cost_high), (800, 1_200));
        assert_eq!((e.weeks, e.sprints), (3, 2));

        let submission = w.submit(now).unwrap().clone();
        assert_eq!(submission.estimate.cost_low, 800);
        assert_eq!(submission.answers.project_type, Some(ProjectType::AutomationTool));
        assert!(mem.is_empty(), "submitting clears the draft");
    }

    #[test]
    fn submit_requires_review_step() {
        let mem = MemoryStore::new();
        let mut w = wizard(&mem);
        assert!(matches!(w.submit(t0()), Err(EstimatorError::NotAtReview(0))));
        assert!(w.submission().is_none());
    }

    #[test]
    fn submit_rejects_unanswered_questions() {
        let mem = MemoryStore::new();
        let mut w = wizard(&mem);
        while !w.is_at_review() {
            w.next(t0()).unwrap();
        }
        w.clear(Field::Compliance, t0());
        assert!(matches!(
            w.submit(t0()),
            Err(EstimatorError::StepIncomplete { .. })
        ));
        assert!(w.error(Field::Compliance).is_some());
    }

    #[test]
    fn draft_restores_within_ttl() {
        let mem = MemoryStore::new();
        let mut w = wizard(&mem);
        let now = choose(&mut w, Choice::ProjectType(ProjectType::CrmPortal), t0());
        w.toggle(Toggle::Feature(Feature::Ai), now);
        w.toggle(Toggle::Platform(Platform::PublicApi), now);
        for _ in 0..3 {
            w.next(now).unwrap();
        }
        assert_eq!(w.current_step(), 3);
        let answers = w.answers().clone();
        drop(w);

        let later = now + Duration::minutes(30);
        let restored = Wizard::mount(&mem, WizardSettings::default(), later);
        assert_eq!(restored.current_step(), 3);
        assert_eq!(restored.answers(), &answers);
        assert_eq!(restored.estimate(), &compute_estimate(&answers));
        let notice = restored.notice(later).expect("restore notice");
        assert_eq!(notice.message, RESTORED_NOTICE);
        assert!(restored.notice(later + ms(2_499)).is_some());
        assert!(restored.notice(later + ms(2_500)).is_none());
    }

    #[test]
    fn draft_expires_after_ttl() {
        let mem = MemoryStore::new();
        let mut w = wizard(&mem);
        let now = choose(&mut w, Choice::ProjectType(ProjectType::CrmPortal), t0());
        w.next(now).unwrap();
        w.next(now).unwrap();
        drop(w);

        let later = now + Duration::hours(2) + Duration::seconds(1);
        let restored = Wizard::mount(&mem, WizardSettings::default(), later);
        assert_eq!(restored.current_step(), 0);
        assert_eq!(restored.answers(), &AnswerSet::default());
        assert!(restored.notice(later).is_none());
    }

    #[test]
    fn untouched_answers_restore_without_notice() {
        let mem = MemoryStore::new();
        let mut w = wizard(&mem);
        w.next(t0()).unwrap();
        w.toggle(Toggle::Feature(Feature::Ai), t0());
        w.toggle(Toggle::Feature(Feature::Ai), t0());
        drop(w);

        let restored = wizard(&mem);
        assert_eq!(restored.current_step(), 1);
        assert!(restored.notice(t0()).is_none());
    }

    #[test]
    fn out_of_range_stored_step_is_clamped() {
        let mem = MemoryStore::new();
        let expiry = (t0() + Duration::hours(1)).timestamp_millis();
        mem.set(paths::STEP_KEY, &format!("{{\"value\":99,\"expiry\":{expiry}}}"))
            .unwrap();
        let w = wizard(&mem);
        assert_eq!(w.current_step(), REVIEW_STEP);
    }

    #[test]
    fn unknown_stored_value_must_be_answered_again() {
        let mem = MemoryStore::new();
        let expiry = (t0() + Duration::hours(1)).timestamp_millis();
        mem.set(
            paths::DATA_KEY,
            &format!("{{\"value\":{{\"stage\":\"retired_option\"}},\"expiry\":{expiry}}}"),
        )
        .unwrap();
        mem.set(paths::STEP_KEY, &format!("{{\"value\":2,\"expiry\":{expiry}}}"))
            .unwrap();

        let mut w = wizard(&mem);
        assert_eq!(w.step(), Step::Question(Field::Stage));
        assert_eq!(w.answers().stage, None);
        assert!(w.next(t0()).is_err());
        assert_eq!(w.current_step(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let mem = MemoryStore::new();
        let mut w = wizard(&mem);
        let now = choose(&mut w, Choice::Stage(Stage::BackendExists), t0());
        w.next(now).unwrap();
        w.select(Choice::Timeline(Timeline::Asap), now);
        assert!(!mem.is_empty());

        w.reset();
        assert_eq!(w.current_step(), 0);
        assert_eq!(w.answers(), &AnswerSet::default());
        assert!(w.pending().is_none());
        assert!(mem.is_empty());
    }

    #[test]
    fn storage_failures_never_block_the_wizard() {
        let mut w = Wizard::mount(BrokenStore, WizardSettings::default(), t0());
        let now = choose(&mut w, Choice::ProjectType(ProjectType::GhlApp), t0());
        w.toggle(Toggle::Feature(Feature::RealtimeVoice), now);
        w.next(now).unwrap();
        w.back(now);
        while !w.is_at_review() {
            w.next(now).unwrap();
        }
        assert!(w.submit(now).is_ok());
        w.reset();
    }

    #[test]
    fn settings_follow_config() {
        let cfg = WizardConfig {
            draft_ttl_minutes: 30,
            commit_delay_ms: 100,
            notice_ms: 2_500,
            auto_advance: true,
        };
        let s = WizardSettings::from(&cfg);
        assert_eq!(s.draft_ttl, Duration::minutes(30));
        assert_eq!(s.commit_delay, ms(100));
        assert_eq!(s.notice, ms(2_500));
        assert!(s.auto_advance);
    }
}
