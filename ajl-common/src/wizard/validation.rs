//! Per-step field validation

use serde::Serialize;
use std::collections::BTreeMap;

use super::draft::{JourneyDraft, Mode, MIN_STEPS, OTHER, UserFocus};
use super::evidence::{is_http_url, EvidenceKind, MIN_CAPTION_CHARS};
use super::WizardStep;

pub const MIN_GOAL_CHARS: usize = 10;
pub const MIN_LOCATION_CHARS: usize = 5;
pub const MIN_STEP_FIELD_CHARS: usize = 5;
pub const MIN_CLAIM_CHARS: usize = 10;
pub const MIN_WHAT_HAPPENED_CHARS: usize = 20;
pub const MIN_EXPECTED_CHARS: usize = 10;
pub const MIN_INTERPRETATION_CHARS: usize = 10;

/// Field name to message; empty means the step is valid
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }
}

/// Trimmed length in characters
pub(crate) fn text_len(s: &str) -> usize {
    s.trim().chars().count()
}

/// Validate the fields shown on `step`
pub fn validate_step(draft: &JourneyDraft, step: WizardStep) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    match step {
        WizardStep::Context => validate_context(draft, &mut errors),
        WizardStep::Where => validate_where(draft, &mut errors),
        WizardStep::Steps => validate_steps(draft, &mut errors),
        WizardStep::Outcome => validate_outcome(draft, &mut errors),
        WizardStep::Classification => validate_classification(draft, &mut errors),
        WizardStep::Interpretation => validate_interpretation(draft, &mut errors),
        WizardStep::Evidence => validate_evidence(draft, &mut errors),
    }
    errors
}

/// Every step's errors merged into one map
pub fn validate_all(draft: &JourneyDraft) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for step in WizardStep::ALL {
        errors.extend(validate_step(draft, step));
    }
    errors
}

fn validate_context(draft: &JourneyDraft, errors: &mut ValidationErrors) {
    if draft.mode.is_none() {
        errors.insert("mode", "Choose Physical or Digital.");
    }
    if draft.group.trim().is_empty() {
        errors.insert("group", "Pick your group.");
    }
    if draft.campus_system.is_empty() {
        errors.insert("campus", "Select a campus/system (or Other).");
    }
    if draft.campus_system == OTHER && draft.campus_other.trim().is_empty() {
        errors.insert("campusOther", "Describe the campus/system if you pick Other.");
    }
    match draft.user_focus {
        None => errors.insert("userFocus", "Select a user focus."),
        Some(UserFocus::Other) if draft.user_focus_other.trim().is_empty() => {
            errors.insert("userFocusOther", "Describe the focus if you pick Other.")
        }
        Some(_) => {}
    }
    if text_len(&draft.journey_goal) < MIN_GOAL_CHARS {
        errors.insert("journeyGoal", "Write at least 10 characters for the goal.");
    }
}

fn validate_where(draft: &JourneyDraft, errors: &mut ValidationErrors) {
    match draft.mode {
        Some(Mode::Physical) if text_len(&draft.location_text) < MIN_LOCATION_CHARS => {
            errors.insert(
                "locationText",
                "Describe the location so someone else could find it.",
            );
        }
        Some(Mode::Digital) if !draft.url.starts_with("http") => {
            errors.insert("url", "Use the exact page URL where the barrier occurs.");
        }
        _ => {}
    }
}

fn validate_steps(draft: &JourneyDraft, errors: &mut ValidationErrors) {
    let steps = draft.steps();
    if steps.len() < MIN_STEPS {
        errors.insert("steps", "Add at least 2 steps.");
    }
    for (idx, step) in steps.iter().enumerate() {
        if text_len(&step.go_to) < MIN_STEP_FIELD_CHARS {
            errors.insert(format!("step_{}_goTo", idx), "Write at least 5 characters.");
        }
        if text_len(&step.attempt_to) < MIN_STEP_FIELD_CHARS {
            errors.insert(format!("step_{}_attempt", idx), "Write at least 5 characters.");
        }
        if text_len(&step.observe) < MIN_STEP_FIELD_CHARS {
            errors.insert(format!("step_{}_observe", idx), "Write what you observed.");
        }
    }
}

fn validate_outcome(draft: &JourneyDraft, errors: &mut ValidationErrors) {
    if text_len(&draft.claimed_access_statement) < MIN_CLAIM_CHARS {
        errors.insert(
            "claimedAccessStatement",
            "What is claimed about access here? (min 10 characters).",
        );
    }
    if text_len(&draft.what_happened) < MIN_WHAT_HAPPENED_CHARS {
        errors.insert(
            "whatHappened",
            "Write at least 20 characters for what happened (factual).",
        );
    }
    if text_len(&draft.expected_outcome) < MIN_EXPECTED_CHARS {
        errors.insert(
            "expectedOutcome",
            "Write what should have happened (min 10 characters).",
        );
    }
    if draft.access_result.is_none() {
        errors.insert("accessResult", "Select the access result.");
    }
}

fn validate_classification(draft: &JourneyDraft, errors: &mut ValidationErrors) {
    if draft.barrier_type.is_none() {
        errors.insert("barrierType", "Pick the dominant barrier.");
    }
    if draft.where_happened.is_empty() {
        errors.insert("whereHappened", "Select where this happened in the journey.");
    }
    if draft.where_happened == OTHER && draft.where_other.trim().is_empty() {
        errors.insert("whereOther", "Describe the stage if you pick Other.");
    }
    if draft.status.is_none() {
        errors.insert("status", "Select the current status of this observation.");
    }
}

fn validate_interpretation(draft: &JourneyDraft, errors: &mut ValidationErrors) {
    if text_len(&draft.missing_unclear) < MIN_INTERPRETATION_CHARS {
        errors.insert(
            "missingUnclear",
            "Write at least 10 characters about what was missing or unclear.",
        );
    }
    if text_len(&draft.suggested_improvement) < MIN_INTERPRETATION_CHARS {
        errors.insert(
            "suggestedImprovement",
            "Write at least 10 characters describing a practical improvement.",
        );
    }
}

fn validate_evidence(draft: &JourneyDraft, errors: &mut ValidationErrors) {
    if draft.evidence().is_empty() {
        errors.insert("evidence", "Add at least one evidence item (photo or URL).");
    }
    if draft.filled_guidance_urls().next().is_none() {
        errors.insert("guidance", "Add at least one guidance/policy URL (required).");
    }
    for (idx, item) in draft.evidence().iter().enumerate() {
        if text_len(&item.caption) < MIN_CAPTION_CHARS {
            errors.insert(
                format!("evidence_{}_caption", idx),
                "Caption must be at least 5 characters.",
            );
        }
        match &item.kind {
            EvidenceKind::Url { url } if !is_http_url(url) => errors.insert(
                format!("evidence_{}_url", idx),
                "Enter a valid URL starting with http for this evidence item.",
            ),
            EvidenceKind::File { attachment: None } => errors.insert(
                format!("evidence_{}_file", idx),
                "Attach an image file for this evidence item.",
            ),
            _ => {}
        }
    }
}
