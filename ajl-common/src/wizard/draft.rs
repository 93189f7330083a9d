//! In-memory journey draft
//!
//! The draft is owned by one authoring session. Free text is stored as typed
//! by the author; selections are `None` until chosen.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::evidence::EvidenceItem;
use crate::Error;

pub const MIN_STEPS: usize = 2;
pub const MAX_STEPS: usize = 6;

/// Declares a closed set of selectable values with a snake_case wire form
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| Error::InvalidInput(format!(
                        concat!("Invalid ", stringify!($name), ": {}"),
                        s
                    )))
            }
        }
    };
}

wire_enum!(
    /// Whether the journey happened in a physical space or online
    Mode {
        Physical => "physical",
        Digital => "digital",
    }
);

wire_enum!(
    /// Outcome of the attempted access
    AccessResult {
        Granted => "granted",
        Blocked => "blocked",
        Partial => "partial",
        Unclear => "unclear",
    }
);

wire_enum!(
    /// Dominant barrier category
    BarrierType {
        Physical => "physical",
        Digital => "digital",
        Information => "information",
        Process => "process",
        Mixed => "mixed",
    }
);

wire_enum!(
    /// Verification state of an observation
    ObservationStatus {
        Observed => "observed",
        Confirmed => "confirmed",
        NeedsVerification => "needs_verification",
    }
);

wire_enum!(
    /// Whose access the journey is tested for
    UserFocus {
        Wheelchair => "wheelchair",
        BlindVi => "blind_vi",
        Both => "both",
        Other => "other",
    }
);

/// Value of free-choice selects that requires accompanying text
pub const OTHER: &str = "other";

/// One "go to / attempt to / observe" record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub go_to: String,
    pub attempt_to: String,
    pub observe: String,
}

impl Step {
    pub fn new(go_to: impl Into<String>, attempt_to: impl Into<String>, observe: impl Into<String>) -> Self {
        Self {
            go_to: go_to.into(),
            attempt_to: attempt_to.into(),
            observe: observe.into(),
        }
    }
}

/// Field of a [`Step`], used for single-field edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepField {
    GoTo,
    AttemptTo,
    Observe,
}

/// Journey being authored through the wizard
///
/// `steps` and `evidence` are only reachable through methods so that the
/// step-count bounds hold for every state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyDraft {
    // Context
    pub mode: Option<Mode>,
    pub group: String,
    pub campus_system: String,
    pub campus_other: String,
    pub user_focus: Option<UserFocus>,
    pub user_focus_other: String,
    pub journey_goal: String,

    // Where
    pub location_text: String,
    pub url: String,
    pub lat: String,
    pub lng: String,

    steps: Vec<Step>,

    // Outcome
    pub linked_claim_id: Option<String>,
    pub claimed_access_statement: String,
    pub what_happened: String,
    pub expected_outcome: String,
    pub access_result: Option<AccessResult>,

    // Classification
    pub barrier_type: Option<BarrierType>,
    pub where_happened: String,
    pub where_other: String,
    pub status: Option<ObservationStatus>,

    // Interpretation + action
    pub missing_unclear: String,
    pub suggested_improvement: String,

    evidence: Vec<EvidenceItem>,
    pub guidance_urls: Vec<String>,
}

impl Default for JourneyDraft {
    fn default() -> Self {
        Self {
            mode: None,
            group: String::new(),
            campus_system: String::new(),
            campus_other: String::new(),
            user_focus: None,
            user_focus_other: String::new(),
            journey_goal: String::new(),
            location_text: String::new(),
            url: String::new(),
            lat: String::new(),
            lng: String::new(),
            steps: vec![Step::default(); MIN_STEPS],
            linked_claim_id: None,
            claimed_access_statement: String::new(),
            what_happened: String::new(),
            expected_outcome: String::new(),
            access_result: None,
            barrier_type: None,
            where_happened: String::new(),
            where_other: String::new(),
            status: None,
            missing_unclear: String::new(),
            suggested_improvement: String::new(),
            evidence: Vec::new(),
            guidance_urls: vec![String::new()],
        }
    }
}

impl JourneyDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn evidence(&self) -> &[EvidenceItem] {
        &self.evidence
    }

    pub(crate) fn evidence_mut(&mut self) -> &mut Vec<EvidenceItem> {
        &mut self.evidence
    }

    /// Replace the whole step list; rejected outside `MIN_STEPS..=MAX_STEPS`
    pub fn set_steps(&mut self, steps: Vec<Step>) -> Result<(), Error> {
        if !(MIN_STEPS..=MAX_STEPS).contains(&steps.len()) {
            return Err(Error::InvalidInput(format!(
                "A journey has between {} and {} steps.",
                MIN_STEPS, MAX_STEPS
            )));
        }
        self.steps = steps;
        Ok(())
    }

    /// Append an empty step; returns false at the maximum
    pub fn add_step(&mut self) -> bool {
        if self.steps.len() >= MAX_STEPS {
            return false;
        }
        self.steps.push(Step::default());
        true
    }

    /// Remove a step; returns false at the minimum or for a bad index
    pub fn remove_step(&mut self, idx: usize) -> bool {
        if self.steps.len() <= MIN_STEPS || idx >= self.steps.len() {
            return false;
        }
        self.steps.remove(idx);
        true
    }

    pub fn update_step(&mut self, idx: usize, field: StepField, value: impl Into<String>) -> bool {
        let Some(step) = self.steps.get_mut(idx) else {
            return false;
        };
        let value = value.into();
        match field {
            StepField::GoTo => step.go_to = value,
            StepField::AttemptTo => step.attempt_to = value,
            StepField::Observe => step.observe = value,
        }
        true
    }

    /// Guidance URLs with content, in entry order
    pub fn filled_guidance_urls(&self) -> impl Iterator<Item = &str> {
        self.guidance_urls
            .iter()
            .map(String::as_str)
            .filter(|g| !g.trim().is_empty())
    }

    /// Campus value as stored: the free text when "other" was picked
    pub fn campus_or_system(&self) -> String {
        if self.campus_system == OTHER && !self.campus_other.trim().is_empty() {
            self.campus_other.trim().to_string()
        } else {
            self.campus_system.clone()
        }
    }
}

/// Partial update of draft fields sent by the client
///
/// Absent fields are left untouched. Evidence is edited through its own
/// operations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DraftPatch {
    pub mode: Option<Mode>,
    pub group: Option<String>,
    pub campus_system: Option<String>,
    pub campus_other: Option<String>,
    pub user_focus: Option<UserFocus>,
    pub user_focus_other: Option<String>,
    pub journey_goal: Option<String>,
    pub location_text: Option<String>,
    pub url: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub steps: Option<Vec<Step>>,
    pub linked_claim_id: Option<String>,
    pub claimed_access_statement: Option<String>,
    pub what_happened: Option<String>,
    pub expected_outcome: Option<String>,
    pub access_result: Option<AccessResult>,
    pub barrier_type: Option<BarrierType>,
    pub where_happened: Option<String>,
    pub where_other: Option<String>,
    pub status: Option<ObservationStatus>,
    pub missing_unclear: Option<String>,
    pub suggested_improvement: Option<String>,
    pub guidance_urls: Option<Vec<String>>,
}

impl JourneyDraft {
    /// Apply a patch; the draft is unchanged if the step list is out of bounds
    pub fn apply(&mut self, patch: DraftPatch) -> Result<(), Error> {
        if let Some(steps) = patch.steps {
            self.set_steps(steps)?;
        }

        macro_rules! take {
            ($draft:ident, $patch:ident; $($field:ident),+) => {
                $(if let Some(v) = $patch.$field { $draft.$field = v; })+
            };
        }
        macro_rules! take_opt {
            ($draft:ident, $patch:ident; $($field:ident),+) => {
                $(if let Some(v) = $patch.$field { $draft.$field = Some(v); })+
            };
        }

        take!(
            self, patch;
            group,
            campus_system,
            campus_other,
            user_focus_other,
            journey_goal,
            location_text,
            url,
            lat,
            lng,
            claimed_access_statement,
            what_happened,
            expected_outcome,
            where_happened,
            where_other,
            missing_unclear,
            suggested_improvement,
            guidance_urls
        );
        take_opt!(self, patch; mode, user_focus, access_result, barrier_type, status);

        if let Some(claim) = patch.linked_claim_id {
            self.linked_claim_id = (!claim.trim().is_empty()).then_some(claim);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_draft_has_two_blank_steps_and_one_guidance_slot() {
        let draft = JourneyDraft::new();
        assert_eq!(draft.steps().len(), MIN_STEPS);
        assert_eq!(draft.guidance_urls, vec![String::new()]);
        assert_eq!(draft.filled_guidance_urls().count(), 0);
    }

    #[test]
    fn test_step_count_stays_in_bounds() {
        let mut draft = JourneyDraft::new();
        assert!(!draft.remove_step(0));
        for _ in 0..10 {
            draft.add_step();
        }
        assert_eq!(draft.steps().len(), MAX_STEPS);
        assert!(draft.remove_step(5));
        assert_eq!(draft.steps().len(), MAX_STEPS - 1);
        assert!(!draft.remove_step(42));
    }

    #[test]
    fn test_set_steps_rejects_out_of_range() {
        let mut draft = JourneyDraft::new();
        assert!(draft.set_steps(vec![Step::default()]).is_err());
        assert!(draft.set_steps(vec![Step::default(); 7]).is_err());
        assert_eq!(draft.steps().len(), MIN_STEPS);
        assert!(draft.set_steps(vec![Step::default(); 3]).is_ok());
    }

    #[test]
    fn test_patch_leaves_absent_fields() {
        let mut draft = JourneyDraft::new();
        draft.journey_goal = "Reach the library lifts".to_string();

        let patch: DraftPatch = serde_json::from_str(
            r#"{"mode":"digital","url":"https://example.org","barrierType":"information"}"#,
        )
        .unwrap();
        draft.apply(patch).unwrap();

        assert_eq!(draft.mode, Some(Mode::Digital));
        assert_eq!(draft.url, "https://example.org");
        assert_eq!(draft.barrier_type, Some(BarrierType::Information));
        assert_eq!(draft.journey_goal, "Reach the library lifts");
    }

    #[test]
    fn test_patch_with_bad_steps_is_rejected_whole() {
        let mut draft = JourneyDraft::new();
        let patch = DraftPatch {
            journey_goal: Some("changed goal".to_string()),
            steps: Some(vec![Step::default(); 9]),
            ..Default::default()
        };
        assert!(draft.apply(patch).is_err());
        assert_eq!(draft.journey_goal, "");
    }

    #[test]
    fn test_campus_other_text_wins() {
        let mut draft = JourneyDraft::new();
        draft.campus_system = OTHER.to_string();
        draft.campus_other = "  Night school annex ".to_string();
        assert_eq!(draft.campus_or_system(), "Night school annex");

        draft.campus_system = "main_campus".to_string();
        assert_eq!(draft.campus_or_system(), "main_campus");
    }

    #[test]
    fn test_wire_enum_parsing() {
        assert_eq!("needs_verification".parse::<ObservationStatus>().unwrap(), ObservationStatus::NeedsVerification);
        assert_eq!(UserFocus::BlindVi.as_str(), "blind_vi");
        assert!("sideways".parse::<BarrierType>().is_err());
    }
}
