use crate::error::{EstimatorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Answer enums
// ---------------------------------------------------------------------------

/// Declares a closed answer enum together with its wire string and the label
/// shown to the user. Wire strings are what the site stored, so persisted
/// drafts and answer files stay readable across versions.
macro_rules! answer_enum {
    (
        $(#[$meta:meta])*
        $name:ident in $field:literal {
            $($variant:ident => $wire:literal, $label:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub fn all() -> &'static [$name] {
                &[$($name::$variant),+]
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = EstimatorError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(EstimatorError::InvalidValue {
                        field: $field.to_string(),
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

answer_enum! {
    ProjectType in "project_type" {
        NewSaasMvp => "new_saas_mvp", "New SaaS / MVP";
        AutomationTool => "automation_tool", "Automation / Internal";
        CrmPortal => "crm_portal", "CRM / Portal";
        GhlApp => "ghl_app", "GoHighLevel App";
    }
}

answer_enum! {
    Feature in "features" {
        AuthRoles => "auth_roles", "Auth Roles";
        Payments => "payments", "Payments";
        Dashboards => "dashboards", "Dashboards";
        Scheduling => "scheduling", "Scheduling";
        Messaging => "messaging", "Messaging";
        FileUpload => "file_upload", "File Upload";
        Ai => "ai", "Ai";
        RealtimeVoice => "realtime_voice", "Realtime Voice";
        MultiTenant => "multi_tenant", "Multi Tenant";
        MobileUi => "mobile_ui", "Mobile Ui";
    }
}

answer_enum! {
    Stage in "stage" {
        IdeaOnly => "idea_only", "Idea only";
        NocodeMvp => "nocode_mvp", "No-code MVP";
        BackendExists => "backend_exists", "Backend exists";
        ScalingAutomation => "scaling_automation", "Scaling / Automation";
    }
}

answer_enum! {
    IntegrationsCount in "integrations_count" {
        Zero => "0", "0";
        OneToTwo => "1_2", "1-2";
        ThreeToFive => "3_5", "3-5";
        SixPlus => "6_plus", "6+";
    }
}

answer_enum! {
    UserVolume in "user_volume" {
        Under100 => "lt_100", "< 100";
        Under1k => "100_1k", "100 - 1,000";
        Under10k => "1k_10k", "1,000 - 10,000";
        Over10k => "gt_10k", "10,000+";
    }
}

answer_enum! {
    Compliance in "compliance" {
        Basic => "basic", "Basic";
        PiiAudit => "pii_audit", "PII / audit";
        Industry => "industry", "Industry (HIPAA, FIN)";
    }
}

answer_enum! {
    Timeline in "timeline" {
        SixPlusMonths => "6_plus_mo", "6+ months";
        ThreeToSixMonths => "3_6_mo", "3 - 6 months";
        Asap => "asap", "ASAP (rush)";
    }
}

answer_enum! {
    DesignScope in "design_scope" {
        BasicUiKit => "basic_ui_kit", "Basic UI kit";
        DesignSystem => "design_system", "Design system";
        PrototypeTesting => "prototype_testing", "Prototype + testing";
    }
}

answer_enum! {
    Migration in "migration" {
        None => "none", "None";
        CsvSimple => "csv_simple", "Simple CSV";
        ComplexMulti => "complex_multi", "Complex / multi-source";
    }
}

answer_enum! {
    Platform in "platforms" {
        Web => "web", "Web";
        GhlEmbedded => "ghl_embedded", "Ghl Embedded";
        AdminClientPortals => "admin_client_portals", "Admin Client Portals";
        PublicApi => "public_api", "Public Api";
    }
}

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    ProjectType,
    Features,
    Stage,
    IntegrationsCount,
    UserVolume,
    Compliance,
    Timeline,
    DesignScope,
    Migration,
    Platforms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Single,
    Multi,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Single => "single-select",
            FieldKind::Multi => "multi-select",
        }
    }
}

/// A selectable option as shown on a question step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OptionInfo {
    pub value: &'static str,
    pub label: &'static str,
}

fn options_of<T: Copy>(
    all: &'static [T],
    wire: fn(T) -> &'static str,
    label: fn(T) -> &'static str,
) -> Vec<OptionInfo> {
    all.iter()
        .map(|&v| OptionInfo {
            value: wire(v),
            label: label(v),
        })
        .collect()
}

impl Field {
    /// Questionnaire order.
    pub fn all() -> &'static [Field] {
        &[
            Field::ProjectType,
            Field::Features,
            Field::Stage,
            Field::IntegrationsCount,
            Field::UserVolume,
            Field::Compliance,
            Field::Timeline,
            Field::DesignScope,
            Field::Migration,
            Field::Platforms,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Field::ProjectType => "project_type",
            Field::Features => "features",
            Field::Stage => "stage",
            Field::IntegrationsCount => "integrations_count",
            Field::UserVolume => "user_volume",
            Field::Compliance => "compliance",
            Field::Timeline => "timeline",
            Field::DesignScope => "design_scope",
            Field::Migration => "migration",
            Field::Platforms => "platforms",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::Features | Field::Platforms => FieldKind::Multi,
            _ => FieldKind::Single,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Field::ProjectType => "What type of project is this?",
            Field::Features => "Which features are must-have?",
            Field::Stage => "Current stage of the product?",
            Field::IntegrationsCount => "How many integrations are needed?",
            Field::UserVolume => "Expected user volume at launch?",
            Field::Compliance => "Security / Compliance needs?",
            Field::Timeline => "Timeline urgency?",
            Field::DesignScope => "Design scope?",
            Field::Migration => "Data migration needs?",
            Field::Platforms => "Which platforms?",
        }
    }

    /// Short noun used in validation messages.
    pub fn noun(self) -> &'static str {
        match self {
            Field::ProjectType => "a project type",
            Field::Features => "features",
            Field::Stage => "the current stage",
            Field::IntegrationsCount => "an integration count",
            Field::UserVolume => "an expected user volume",
            Field::Compliance => "a compliance level",
            Field::Timeline => "a timeline",
            Field::DesignScope => "a design scope",
            Field::Migration => "a migration scope",
            Field::Platforms => "platforms",
        }
    }

    pub fn options(self) -> Vec<OptionInfo> {
        match self {
            Field::ProjectType => options_of(ProjectType::all(), ProjectType::as_str, ProjectType::label),
            Field::Features => options_of(Feature::all(), Feature::as_str, Feature::label),
            Field::Stage => options_of(Stage::all(), Stage::as_str, Stage::label),
            Field::IntegrationsCount => options_of(
                IntegrationsCount::all(),
                IntegrationsCount::as_str,
                IntegrationsCount::label,
            ),
            Field::UserVolume => options_of(UserVolume::all(), UserVolume::as_str, UserVolume::label),
            Field::Compliance => options_of(Compliance::all(), Compliance::as_str, Compliance::label),
            Field::Timeline => options_of(Timeline::all(), Timeline::as_str, Timeline::label),
            Field::DesignScope => options_of(DesignScope::all(), DesignScope::as_str, DesignScope::label),
            Field::Migration => options_of(Migration::all(), Migration::as_str, Migration::label),
            Field::Platforms => options_of(Platform::all(), Platform::as_str, Platform::label),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Field {
    type Err = EstimatorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.replace('-', "_");
        Field::all()
            .iter()
            .copied()
            .find(|f| f.as_str() == normalized)
            .ok_or_else(|| EstimatorError::UnknownField(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Choice / Toggle
// ---------------------------------------------------------------------------

/// A value for a single-select question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    ProjectType(ProjectType),
    Stage(Stage),
    IntegrationsCount(IntegrationsCount),
    UserVolume(UserVolume),
    Compliance(Compliance),
    Timeline(Timeline),
    DesignScope(DesignScope),
    Migration(Migration),
}

impl Choice {
    pub fn field(self) -> Field {
        match self {
            Choice::ProjectType(_) => Field::ProjectType,
            Choice::Stage(_) => Field::Stage,
            Choice::IntegrationsCount(_) => Field::IntegrationsCount,
            Choice::UserVolume(_) => Field::UserVolume,
            Choice::Compliance(_) => Field::Compliance,
            Choice::Timeline(_) => Field::Timeline,
            Choice::DesignScope(_) => Field::DesignScope,
            Choice::Migration(_) => Field::Migration,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Choice::ProjectType(v) => v.as_str(),
            Choice::Stage(v) => v.as_str(),
            Choice::IntegrationsCount(v) => v.as_str(),
            Choice::UserVolume(v) => v.as_str(),
            Choice::Compliance(v) => v.as_str(),
            Choice::Timeline(v) => v.as_str(),
            Choice::DesignScope(v) => v.as_str(),
            Choice::Migration(v) => v.as_str(),
        }
    }

    pub fn parse(field: Field, value: &str) -> Result<Self> {
        Ok(match field {
            Field::ProjectType => Choice::ProjectType(value.parse()?),
            Field::Stage => Choice::Stage(value.parse()?),
            Field::IntegrationsCount => Choice::IntegrationsCount(value.parse()?),
            Field::UserVolume => Choice::UserVolume(value.parse()?),
            Field::Compliance => Choice::Compliance(value.parse()?),
            Field::Timeline => Choice::Timeline(value.parse()?),
            Field::DesignScope => Choice::DesignScope(value.parse()?),
            Field::Migration => Choice::Migration(value.parse()?),
            Field::Features | Field::Platforms => {
                return Err(EstimatorError::WrongStepKind {
                    field: field.to_string(),
                    expected: FieldKind::Single.as_str(),
                    actual: FieldKind::Multi.as_str(),
                })
            }
        })
    }
}

/// A value for a multi-select question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Feature(Feature),
    Platform(Platform),
}

impl Toggle {
    pub fn field(self) -> Field {
        match self {
            Toggle::Feature(_) => Field::Features,
            Toggle::Platform(_) => Field::Platforms,
        }
    }

    pub fn parse(field: Field, value: &str) -> Result<Self> {
        match field {
            Field::Features => Ok(Toggle::Feature(value.parse()?)),
            Field::Platforms => Ok(Toggle::Platform(value.parse()?)),
            other => Err(EstimatorError::WrongStepKind {
                field: other.to_string(),
                expected: FieldKind::Multi.as_str(),
                actual: FieldKind::Single.as_str(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// AnswerSet
// ---------------------------------------------------------------------------

/// Everything the questionnaire collects. Single-select questions are `None`
/// only when cleared or when a stored value was not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSet {
    #[serde(deserialize_with = "lenient::one")]
    pub project_type: Option<ProjectType>,
    #[serde(deserialize_with = "lenient::many")]
    pub features: BTreeSet<Feature>,
    #[serde(deserialize_with = "lenient::one")]
    pub stage: Option<Stage>,
    #[serde(deserialize_with = "lenient::integrations")]
    pub integrations_count: Option<IntegrationsCount>,
    #[serde(deserialize_with = "lenient::one")]
    pub user_volume: Option<UserVolume>,
    #[serde(deserialize_with = "lenient::one")]
    pub compliance: Option<Compliance>,
    #[serde(deserialize_with = "lenient::one")]
    pub timeline: Option<Timeline>,
    #[serde(deserialize_with = "lenient::one")]
    pub design_scope: Option<DesignScope>,
    #[serde(deserialize_with = "lenient::one")]
    pub migration: Option<Migration>,
    #[serde(deserialize_with = "lenient::many")]
    pub platforms: BTreeSet<Platform>,
}

impl Default for AnswerSet {
    fn default() -> Self {
        Self {
            project_type: Some(ProjectType::NewSaasMvp),
            features: BTreeSet::new(),
            stage: Some(Stage::IdeaOnly),
            integrations_count: Some(IntegrationsCount::Zero),
            user_volume: Some(UserVolume::Under100),
            compliance: Some(Compliance::Basic),
            timeline: Some(Timeline::SixPlusMonths),
            design_scope: Some(DesignScope::BasicUiKit),
            migration: Some(Migration::None),
            platforms: BTreeSet::from([Platform::Web]),
        }
    }
}

impl AnswerSet {
    pub fn apply(&mut self, choice: Choice) {
        match choice {
            Choice::ProjectType(v) => self.project_type = Some(v),
            Choice::Stage(v) => self.stage = Some(v),
            Choice::IntegrationsCount(v) => self.integrations_count = Some(v),
            Choice::UserVolume(v) => self.user_volume = Some(v),
            Choice::Compliance(v) => self.compliance = Some(v),
            Choice::Timeline(v) => self.timeline = Some(v),
            Choice::DesignScope(v) => self.design_scope = Some(v),
            Choice::Migration(v) => self.migration = Some(v),
        }
    }

    /// Flip membership of a multi-select value. Returns whether the value is
    /// now selected.
    pub fn toggle(&mut self, toggle: Toggle) -> bool {
        fn flip<T: Ord>(set: &mut BTreeSet<T>, value: T) -> bool {
            if set.remove(&value) {
                false
            } else {
                set.insert(value);
                true
            }
        }
        match toggle {
            Toggle::Feature(v) => flip(&mut self.features, v),
            Toggle::Platform(v) => flip(&mut self.platforms, v),
        }
    }

    /// Unset a single-select field. Multi-select fields are emptied.
    pub fn clear(&mut self, field: Field) {
        match field {
            Field::ProjectType => self.project_type = None,
            Field::Features => self.features.clear(),
            Field::Stage => self.stage = None,
            Field::IntegrationsCount => self.integrations_count = None,
            Field::UserVolume => self.user_volume = None,
            Field::Compliance => self.compliance = None,
            Field::Timeline => self.timeline = None,
            Field::DesignScope => self.design_scope = None,
            Field::Migration => self.migration = None,
            Field::Platforms => self.platforms.clear(),
        }
    }

    /// Whether a single-select field holds a value. Multi-select fields are
    /// always considered answered.
    pub fn is_answered(&self, field: Field) -> bool {
        match field {
            Field::ProjectType => self.project_type.is_some(),
            Field::Stage => self.stage.is_some(),
            Field::IntegrationsCount => self.integrations_count.is_some(),
            Field::UserVolume => self.user_volume.is_some(),
            Field::Compliance => self.compliance.is_some(),
            Field::Timeline => self.timeline.is_some(),
            Field::DesignScope => self.design_scope.is_some(),
            Field::Migration => self.migration.is_some(),
            Field::Features | Field::Platforms => true,
        }
    }

    /// Wire values currently held by `field`, in option order.
    pub fn values(&self, field: Field) -> Vec<&'static str> {
        fn one<T: Copy>(v: Option<T>, wire: fn(T) -> &'static str) -> Vec<&'static str> {
            v.map(wire).into_iter().collect()
        }
        match field {
            Field::ProjectType => one(self.project_type, ProjectType::as_str),
            Field::Features => self.features.iter().map(|f| f.as_str()).collect(),
            Field::Stage => one(self.stage, Stage::as_str),
            Field::IntegrationsCount => one(self.integrations_count, IntegrationsCount::as_str),
            Field::UserVolume => one(self.user_volume, UserVolume::as_str),
            Field::Compliance => one(self.compliance, Compliance::as_str),
            Field::Timeline => one(self.timeline, Timeline::as_str),
            Field::DesignScope => one(self.design_scope, DesignScope::as_str),
            Field::Migration => one(self.migration, Migration::as_str),
            Field::Platforms => self.platforms.iter().map(|p| p.as_str()).collect(),
        }
    }

    /// Human labels currently held by `field`, in option order.
    pub fn labels(&self, field: Field) -> Vec<&'static str> {
        let values = self.values(field);
        field
            .options()
            .into_iter()
            .filter(|o| values.contains(&o.value))
            .map(|o| o.label)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Lenient deserialization
// ---------------------------------------------------------------------------

/// Deserializers for stored answer payloads. Values that no longer map to a
/// known option are dropped instead of failing the whole payload.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::collections::BTreeSet;

    pub fn one<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
    }

    /// Integration buckets were sometimes stored as a bare number.
    pub fn integrations<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        let raw = raw.map(|v| match v {
            Value::Number(n) => Value::String(n.to_string()),
            other => other,
        });
        Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
    }

    pub fn many<'de, D, T>(deserializer: D) -> Result<BTreeSet<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Ord,
    {
        let raw = Option::<Vec<Value>>::deserialize(deserializer)?;
        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_answer_every_single_select() {
        let answers = AnswerSet::default();
        for &field in Field::all() {
            assert!(answers.is_answered(field), "{field} should be answered");
        }
        assert!(answers.features.is_empty());
        assert_eq!(answers.platforms, BTreeSet::from([Platform::Web]));
    }

    #[test]
    fn wire_names_match_stored_payloads() {
        let json = serde_json::to_value(AnswerSet::default()).unwrap();
        assert_eq!(json["project_type"], "new_saas_mvp");
        assert_eq!(json["integrations_count"], "0");
        assert_eq!(json["timeline"], "6_plus_mo");
        assert_eq!(json["platforms"], serde_json::json!(["web"]));
    }

    #[test]
    fn unknown_values_become_unset() {
        let json = r#"{
            "project_type": "space_station",
            "features": ["ai", "none", "teleport", null],
            "stage": null,
            "integrations_count": 0,
            "platforms": ["public_api", "fax"]
        }"#;
        let answers: AnswerSet = serde_json::from_str(json).unwrap();
        assert_eq!(answers.project_type, None);
        assert_eq!(answers.features, BTreeSet::from([Feature::Ai]));
        assert_eq!(answers.stage, None);
        assert_eq!(answers.integrations_count, Some(IntegrationsCount::Zero));
        assert_eq!(answers.platforms, BTreeSet::from([Platform::PublicApi]));
        // absent fields keep their defaults
        assert_eq!(answers.compliance, Some(Compliance::Basic));
    }

    #[test]
    fn answers_load_from_yaml() {
        let yaml = "project_type: ghl_app\nfeatures: [ai, realtime_voice]\ntimeline: asap\n";
        let answers: AnswerSet = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(answers.project_type, Some(ProjectType::GhlApp));
        assert!(answers.features.contains(&Feature::RealtimeVoice));
        assert_eq!(answers.timeline, Some(Timeline::Asap));
    }

    #[test]
    fn toggle_flips_membership() {
        let mut answers = AnswerSet::default();
        assert!(answers.toggle(Toggle::Feature(Feature::Payments)));
        assert!(answers.features.contains(&Feature::Payments));
        assert!(!answers.toggle(Toggle::Feature(Feature::Payments)));
        assert!(answers.features.is_empty());
        assert!(!answers.toggle(Toggle::Platform(Platform::Web)));
        assert!(answers.platforms.is_empty());
    }

    #[test]
    fn choice_parse_checks_field_kind() {
        let c = Choice::parse(Field::Stage, "backend_exists").unwrap();
        assert_eq!(c, Choice::Stage(Stage::BackendExists));
        assert_eq!(c.field(), Field::Stage);
        assert!(matches!(
            Choice::parse(Field::Features, "ai"),
            Err(EstimatorError::WrongStepKind { .. })
        ));
        assert!(matches!(
            Choice::parse(Field::Stage, "done"),
            Err(EstimatorError::InvalidValue { .. })
        ));
        assert!(matches!(
            Toggle::parse(Field::Timeline, "asap"),
            Err(EstimatorError::WrongStepKind { .. })
        ));
    }

    #[test]
    fn field_parse_accepts_kebab_case() {
        assert_eq!("user-volume".parse::<Field>().unwrap(), Field::UserVolume);
        assert_eq!("design_scope".parse::<Field>().unwrap(), Field::DesignScope);
        assert!("budget".parse::<Field>().is_err());
    }

    #[test]
    fn labels_follow_option_order() {
        let mut answers = AnswerSet::default();
        answers.toggle(Toggle::Feature(Feature::MobileUi));
        answers.toggle(Toggle::Feature(Feature::AuthRoles));
        assert_eq!(answers.labels(Field::Features), vec!["Auth Roles", "Mobile Ui"]);
        assert_eq!(answers.labels(Field::UserVolume), vec!["< 100"]);
        answers.clear(Field::UserVolume);
        assert!(answers.labels(Field::UserVolume).is_empty());
    }
}
