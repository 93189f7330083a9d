//! Submission checklist and quality rating
//!
//! These are recomputed from the whole draft regardless of the displayed
//! step. The checklist gates final submission; the quality rating is shown
//! to the author only.

use serde::{Deserialize, Serialize};

use super::draft::{JourneyDraft, Mode, MIN_STEPS};
use super::validation::{
    text_len, MIN_CLAIM_CHARS, MIN_EXPECTED_CHARS, MIN_STEP_FIELD_CHARS, MIN_WHAT_HAPPENED_CHARS,
};

/// Outstanding requirements, in a fixed order; empty when the draft can be submitted
pub fn completion_missing(draft: &JourneyDraft) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if draft.steps().len() < MIN_STEPS {
        missing.push("Minimum 2 steps");
    }
    if text_len(&draft.claimed_access_statement) < MIN_CLAIM_CHARS {
        missing.push("Claimed access statement (min 10 characters)");
    }
    if text_len(&draft.what_happened) < MIN_WHAT_HAPPENED_CHARS {
        missing.push("What happened (at least 20 characters)");
    }
    if text_len(&draft.expected_outcome) < MIN_EXPECTED_CHARS {
        missing.push("Expected outcome (at least 10 characters)");
    }
    if draft.barrier_type.is_none() {
        missing.push("Barrier type selected");
    }
    if draft.where_happened.is_empty() {
        missing.push("Where it happened selected");
    }
    if draft.status.is_none() {
        missing.push("Status selected");
    }
    if draft.mode == Some(Mode::Digital) && !draft.url.starts_with("http") {
        missing.push("URL for digital mode");
    }
    if draft.evidence().is_empty() {
        missing.push("At least one evidence item (photo or URL)");
    }
    if draft.filled_guidance_urls().next().is_none() {
        missing.push("At least one guidance URL");
    }
    missing
}

/// Author-facing rating of how ready a draft is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStatus {
    Complete,
    NeedsClarity,
    MissingGuidance,
    StepsVague,
}

impl QualityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QualityStatus::Complete => "complete",
            QualityStatus::NeedsClarity => "needs_clarity",
            QualityStatus::MissingGuidance => "missing_guidance",
            QualityStatus::StepsVague => "steps_vague",
        }
    }
}

pub fn quality_status(draft: &JourneyDraft) -> QualityStatus {
    let missing = completion_missing(draft);
    let mentions = |needle: &str| missing.iter().any(|m| m.to_lowercase().contains(needle));

    if mentions("guidance") {
        return QualityStatus::MissingGuidance;
    }
    if mentions("step") {
        return QualityStatus::StepsVague;
    }
    if !missing.is_empty() {
        return QualityStatus::NeedsClarity;
    }

    let steps_clear = draft.steps().iter().all(|s| {
        text_len(&s.go_to) >= MIN_STEP_FIELD_CHARS
            && text_len(&s.attempt_to) >= MIN_STEP_FIELD_CHARS
            && text_len(&s.observe) >= MIN_STEP_FIELD_CHARS
    });
    if steps_clear {
        QualityStatus::Complete
    } else {
        QualityStatus::NeedsClarity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::draft::{BarrierType, ObservationStatus, Step};
    use crate::wizard::evidence::EvidenceItem;

    fn submittable() -> JourneyDraft {
        let mut draft = JourneyDraft::new();
        draft.mode = Some(Mode::Physical);
        draft
            .set_steps(vec![
                Step::new("Main entrance", "Open the door", "Door is heavy"),
                Step::new("Lift lobby", "Call the lift", "Button too high"),
            ])
            .unwrap();
        draft.claimed_access_statement = "Fully accessible entrance".to_string();
        draft.what_happened = "The automatic door did not open".to_string();
        draft.expected_outcome = "Door opens on approach".to_string();
        draft.barrier_type = Some(BarrierType::Physical);
        draft.where_happened = "arrival".to_string();
        draft.status = Some(ObservationStatus::Observed);
        draft
            .evidence_mut()
            .push(EvidenceItem::url("https://example.org/door", "Door notice"));
        draft.guidance_urls = vec!["https://example.org/policy".to_string()];
        draft
    }

    #[test]
    fn test_complete_draft() {
        let draft = submittable();
        assert!(completion_missing(&draft).is_empty());
        assert_eq!(quality_status(&draft), QualityStatus::Complete);
    }

    #[test]
    fn test_missing_guidance_wins() {
        let mut draft = submittable();
        draft.guidance_urls = vec!["   ".to_string()];
        draft.barrier_type = None;
        assert_eq!(
            completion_missing(&draft),
            vec!["Barrier type selected", "At least one guidance URL"]
        );
        assert_eq!(quality_status(&draft), QualityStatus::MissingGuidance);
    }

    #[test]
    fn test_other_gaps_need_clarity() {
        let mut draft = submittable();
        draft.what_happened = "too short".to_string();
        assert_eq!(quality_status(&draft), QualityStatus::NeedsClarity);
    }

    #[test]
    fn test_vague_steps_need_clarity_without_blocking() {
        let mut draft = submittable();
        draft.update_step(1, crate::wizard::draft::StepField::Observe, "meh");
        assert!(completion_missing(&draft).is_empty());
        assert_eq!(quality_status(&draft), QualityStatus::NeedsClarity);
    }

    #[test]
    fn test_digital_needs_url() {
        let mut draft = submittable();
        draft.mode = Some(Mode::Digital);
        assert_eq!(completion_missing(&draft), vec!["URL for digital mode"]);
        draft.url = "https://example.org/apply".to_string();
        assert!(completion_missing(&draft).is_empty());
    }

    #[test]
    fn test_wire_form() {
        assert_eq!(
            serde_json::to_string(&QualityStatus::MissingGuidance).unwrap(),
            "\"missing_guidance\""
        );
        assert_eq!(QualityStatus::StepsVague.as_str(), "steps_vague");
    }
}
