//! Seven-step journey submission wizard
//!
//! [`SubmissionWizard`] owns one [`JourneyDraft`] and the author's position
//! in the form. Forward navigation is gated by [`validate_step`]; final
//! submission additionally requires an empty [`completion_missing`] list.
//! The wizard only plans the write; the caller executes the plan and reports
//! the outcome back through [`SubmissionWizard::mark_submitted`] or
//! [`SubmissionWizard::mark_failed`].

pub mod completion;
pub mod draft;
pub mod evidence;
pub mod submission;
pub mod validation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use completion::{completion_missing, quality_status, QualityStatus};
pub use draft::{
    AccessResult, BarrierType, DraftPatch, JourneyDraft, Mode, ObservationStatus, Step, StepField,
    UserFocus, MAX_STEPS, MIN_STEPS, OTHER,
};
pub use evidence::{EvidenceItem, EvidenceKind, FileAttachment};
pub use submission::{plan_submission, PlannedUpload, SubmissionPlan};
pub use validation::{validate_all, validate_step, ValidationErrors};

use crate::identity::Identity;

/// Form pages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum WizardStep {
    Context = 1,
    Where = 2,
    Steps = 3,
    Outcome = 4,
    Classification = 5,
    Interpretation = 6,
    Evidence = 7,
}

impl WizardStep {
    pub const ALL: [WizardStep; 7] = [
        WizardStep::Context,
        WizardStep::Where,
        WizardStep::Steps,
        WizardStep::Outcome,
        WizardStep::Classification,
        WizardStep::Interpretation,
        WizardStep::Evidence,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            WizardStep::Context => "Context",
            WizardStep::Where => "Where",
            WizardStep::Steps => "Steps",
            WizardStep::Outcome => "Outcome",
            WizardStep::Classification => "Classification",
            WizardStep::Interpretation => "Interpretation + Action",
            WizardStep::Evidence => "Evidence",
        }
    }

    pub fn next(self) -> WizardStep {
        WizardStep::try_from(self.number() + 1).unwrap_or(WizardStep::Evidence)
    }

    pub fn previous(self) -> WizardStep {
        WizardStep::try_from(self.number().saturating_sub(1)).unwrap_or(WizardStep::Context)
    }
}

impl From<WizardStep> for u8 {
    fn from(step: WizardStep) -> u8 {
        step.number()
    }
}

impl TryFrom<u8> for WizardStep {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        WizardStep::ALL
            .into_iter()
            .find(|s| s.number() == n)
            .ok_or_else(|| format!("wizard step {} is out of range 1-7", n))
    }
}

/// Where the draft stands with respect to submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WizardStatus {
    Editing,
    #[serde(rename_all = "camelCase")]
    Submitted { journey_id: String, journey_code: String },
    Failed { message: String },
}

/// The three confirmations shown before the first photo upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyChecks {
    pub no_faces: bool,
    pub no_ids: bool,
    pub no_confidential: bool,
}

impl PrivacyChecks {
    pub fn all_confirmed(&self) -> bool {
        self.no_faces && self.no_ids && self.no_confidential
    }
}

#[derive(Error, Debug)]
pub enum WizardError {
    #[error("Confirm the photo privacy checklist before adding a file")]
    PrivacyGateRequired,

    #[error("All three privacy confirmations are required")]
    PrivacyChecksIncomplete,

    #[error("Some fields need attention")]
    Invalid(ValidationErrors),

    #[error("Missing before submit: {}", .0.join(", "))]
    Incomplete(Vec<&'static str>),

    #[error("Evidence item {0} not found")]
    EvidenceNotFound(String),

    #[error("Evidence item {0} does not accept this change")]
    WrongEvidenceKind(String),

    #[error("This journey has already been submitted")]
    AlreadySubmitted,

    #[error(transparent)]
    Common(#[from] crate::Error),
}

/// Authoring state for one draft
#[derive(Debug, Clone)]
pub struct SubmissionWizard {
    draft: JourneyDraft,
    step: WizardStep,
    errors: ValidationErrors,
    privacy_accepted: bool,
    status: WizardStatus,
}

/// Serializable view of a wizard, with the derived checks filled in
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSnapshot<'a> {
    pub draft: &'a JourneyDraft,
    pub step: WizardStep,
    pub step_label: &'static str,
    pub errors: &'a ValidationErrors,
    pub privacy_accepted: bool,
    pub status: &'a WizardStatus,
    pub completion_missing: Vec<&'static str>,
    pub quality_status: QualityStatus,
}

impl Default for SubmissionWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionWizard {
    pub fn new() -> Self {
        Self {
            draft: JourneyDraft::new(),
            step: WizardStep::Context,
            errors: ValidationErrors::new(),
            privacy_accepted: false,
            status: WizardStatus::Editing,
        }
    }

    /// Start a draft with the author's group pre-selected
    pub fn for_identity(identity: &Identity) -> Self {
        let mut wizard = Self::new();
        wizard.draft.group = identity.group_name.clone();
        wizard
    }

    pub fn draft(&self) -> &JourneyDraft {
        &self.draft
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn privacy_accepted(&self) -> bool {
        self.privacy_accepted
    }

    pub fn status(&self) -> &WizardStatus {
        &self.status
    }

    pub fn snapshot(&self) -> WizardSnapshot<'_> {
        WizardSnapshot {
            draft: &self.draft,
            step: self.step,
            step_label: self.step.label(),
            errors: &self.errors,
            privacy_accepted: self.privacy_accepted,
            status: &self.status,
            completion_missing: self.completion_missing(),
            quality_status: self.quality_status(),
        }
    }

    /// Apply field edits from the client
    pub fn edit(&mut self, patch: DraftPatch) -> Result<(), WizardError> {
        self.ensure_editable()?;
        self.draft.apply(patch)?;
        Ok(())
    }

    /// Advance if the current step validates; returns whether it moved
    pub fn go_next(&mut self) -> bool {
        let errors = validate_step(&self.draft, self.step);
        if !errors.is_empty() {
            self.errors = errors;
            return false;
        }
        self.errors = ValidationErrors::new();
        self.step = self.step.next();
        true
    }

    /// Step back without validating; a no-op on the first step
    pub fn go_back(&mut self) {
        self.errors = ValidationErrors::new();
        self.step = self.step.previous();
    }

    pub fn validate_step(&self, step: WizardStep) -> ValidationErrors {
        validate_step(&self.draft, step)
    }

    pub fn completion_missing(&self) -> Vec<&'static str> {
        completion_missing(&self.draft)
    }

    pub fn quality_status(&self) -> QualityStatus {
        quality_status(&self.draft)
    }

    pub fn add_step(&mut self) -> bool {
        self.ensure_editable().is_ok() && self.draft.add_step()
    }

    pub fn remove_step(&mut self, idx: usize) -> bool {
        self.ensure_editable().is_ok() && self.draft.remove_step(idx)
    }

    pub fn update_step(&mut self, idx: usize, field: StepField, value: impl Into<String>) -> bool {
        self.ensure_editable().is_ok() && self.draft.update_step(idx, field, value)
    }

    pub fn add_url_evidence(&mut self, url: &str, caption: &str) -> Result<String, WizardError> {
        self.ensure_editable()?;
        let item = EvidenceItem::url(url.trim(), caption);
        let id = item.id.clone();
        self.draft.evidence_mut().push(item);
        Ok(id)
    }

    /// Add an empty photo slot; refused until the privacy gate is accepted
    pub fn request_file_evidence(&mut self, caption: &str) -> Result<String, WizardError> {
        self.ensure_editable()?;
        if !self.privacy_accepted {
            return Err(WizardError::PrivacyGateRequired);
        }
        let item = EvidenceItem::file(caption);
        let id = item.id.clone();
        self.draft.evidence_mut().push(item);
        Ok(id)
    }

    /// Record the privacy confirmations; valid for the rest of this session
    pub fn accept_privacy_gate(&mut self, checks: PrivacyChecks) -> Result<(), WizardError> {
        self.ensure_editable()?;
        if !checks.all_confirmed() {
            return Err(WizardError::PrivacyChecksIncomplete);
        }
        self.privacy_accepted = true;
        Ok(())
    }

    pub fn attach_file(&mut self, evidence_id: &str, attachment: FileAttachment) -> Result<(), WizardError> {
        self.ensure_editable()?;
        let item = self.evidence_item(evidence_id)?;
        match &mut item.kind {
            EvidenceKind::File { attachment: slot } => {
                *slot = Some(attachment);
                Ok(())
            }
            EvidenceKind::Url { .. } => Err(WizardError::WrongEvidenceKind(evidence_id.to_string())),
        }
    }

    pub fn update_caption(&mut self, evidence_id: &str, caption: &str) -> Result<(), WizardError> {
        self.ensure_editable()?;
        self.evidence_item(evidence_id)?.caption = caption.to_string();
        Ok(())
    }

    pub fn update_evidence_url(&mut self, evidence_id: &str, new_url: &str) -> Result<(), WizardError> {
        self.ensure_editable()?;
        let item = self.evidence_item(evidence_id)?;
        match &mut item.kind {
            EvidenceKind::Url { url } => {
                *url = new_url.trim().to_string();
                Ok(())
            }
            EvidenceKind::File { .. } => Err(WizardError::WrongEvidenceKind(evidence_id.to_string())),
        }
    }

    pub fn remove_evidence(&mut self, evidence_id: &str) -> Result<(), WizardError> {
        self.ensure_editable()?;
        let items = self.draft.evidence_mut();
        let before = items.len();
        items.retain(|item| item.id != evidence_id);
        if items.len() == before {
            return Err(WizardError::EvidenceNotFound(evidence_id.to_string()));
        }
        Ok(())
    }

    pub fn add_guidance_url(&mut self) -> Result<(), WizardError> {
        self.ensure_editable()?;
        self.draft.guidance_urls.push(String::new());
        Ok(())
    }

    /// Returns `false` when there is no slot `idx`
    pub fn update_guidance_url(&mut self, idx: usize, value: &str) -> Result<bool, WizardError> {
        self.ensure_editable()?;
        Ok(match self.draft.guidance_urls.get_mut(idx) {
            Some(slot) => {
                *slot = value.to_string();
                true
            }
            None => false,
        })
    }

    /// Remove a guidance slot; the last remaining slot is kept
    pub fn remove_guidance_url(&mut self, idx: usize) -> Result<bool, WizardError> {
        self.ensure_editable()?;
        if self.draft.guidance_urls.len() <= 1 || idx >= self.draft.guidance_urls.len() {
            return Ok(false);
        }
        self.draft.guidance_urls.remove(idx);
        Ok(true)
    }

    /// Validate the whole draft and produce the write plan
    ///
    /// On validation failure the errors are stored and the wizard moves to
    /// the first failing step.
    pub fn prepare_submission(
        &mut self,
        identity: &Identity,
        code_prefix: &str,
        now: DateTime<Utc>,
    ) -> Result<SubmissionPlan, WizardError> {
        self.ensure_editable()?;

        if let Some(step) = WizardStep::ALL
            .into_iter()
            .find(|s| !validate_step(&self.draft, *s).is_empty())
        {
            self.errors = validate_step(&self.draft, step);
            self.step = step;
            return Err(WizardError::Invalid(self.errors.clone()));
        }

        let missing = self.completion_missing();
        if !missing.is_empty() {
            return Err(WizardError::Incomplete(missing));
        }

        self.errors = ValidationErrors::new();
        Ok(plan_submission(&self.draft, identity, code_prefix, now)?)
    }

    pub fn mark_submitted(&mut self, journey_id: impl Into<String>, journey_code: impl Into<String>) {
        self.status = WizardStatus::Submitted {
            journey_id: journey_id.into(),
            journey_code: journey_code.into(),
        };
    }

    /// Record a backend failure; the draft stays as it was for a retry
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = WizardStatus::Failed {
            message: message.into(),
        };
        self.step = WizardStep::Evidence;
    }

    fn ensure_editable(&self) -> Result<(), WizardError> {
        match self.status {
            WizardStatus::Submitted { .. } => Err(WizardError::AlreadySubmitted),
            _ => Ok(()),
        }
    }

    fn evidence_item(&mut self, evidence_id: &str) -> Result<&mut EvidenceItem, WizardError> {
        self.draft
            .evidence_mut()
            .iter_mut()
            .find(|item| item.id == evidence_id)
            .ok_or_else(|| WizardError::EvidenceNotFound(evidence_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::register("Alex", "g-1", "Group 1", None).unwrap()
    }

    fn fill_context(w: &mut SubmissionWizard) {
        w.edit(DraftPatch {
            mode: Some(Mode::Physical),
            group: Some("Group 1".to_string()),
            campus_system: Some("main".to_string()),
            user_focus: Some(UserFocus::Both),
            journey_goal: Some("Reach the lecture theatre".to_string()),
            location_text: Some("Building A, level 2".to_string()),
            ..Default::default()
        })
        .unwrap();
    }

    fn fill_rest(w: &mut SubmissionWizard) {
        w.edit(DraftPatch {
            steps: Some(vec![
                Step::new("Main entrance", "Enter the building", "Ramp is steep"),
                Step::new("Lift lobby", "Call the lift", "Lift out of order"),
            ]),
            claimed_access_statement: Some("Step-free to all floors".to_string()),
            what_happened: Some("The only lift was out of service".to_string()),
            expected_outcome: Some("A working lift or alternative".to_string()),
            access_result: Some(AccessResult::Blocked),
            barrier_type: Some(BarrierType::Physical),
            where_happened: Some("vertical_circulation".to_string()),
            status: Some(ObservationStatus::Observed),
            missing_unclear: Some("No notice of the outage".to_string()),
            suggested_improvement: Some("Post outage notices at entrance".to_string()),
            guidance_urls: Some(vec!["https://example.org/estates".to_string()]),
            ..Default::default()
        })
        .unwrap();
        w.add_url_evidence("https://example.org/lift-status", "Lift status page")
            .unwrap();
    }

    #[test]
    fn test_incomplete_step_blocks_next() {
        let mut w = SubmissionWizard::new();
        w.edit(DraftPatch {
            mode: Some(Mode::Digital),
            ..Default::default()
        })
        .unwrap();
        assert!(!w.go_next());
        assert_eq!(w.step(), WizardStep::Context);
        assert!(w.errors().contains("group"));
        assert!(!w.errors().contains("mode"));
    }

    #[test]
    fn test_next_and_back() {
        let mut w = SubmissionWizard::new();
        fill_context(&mut w);
        assert!(w.go_next());
        assert!(w.errors().is_empty());
        assert_eq!(w.step(), WizardStep::Where);
        assert!(w.go_next());
        assert_eq!(w.step(), WizardStep::Steps);

        // blank steps block
        assert!(!w.go_next());
        assert!(!w.errors().is_empty());
        w.go_back();
        assert!(w.errors().is_empty());
        assert_eq!(w.step(), WizardStep::Where);
        w.go_back();
        w.go_back();
        assert_eq!(w.step(), WizardStep::Context);
    }

    #[test]
    fn test_next_is_capped_at_evidence() {
        let mut w = SubmissionWizard::new();
        fill_context(&mut w);
        fill_rest(&mut w);
        for _ in 0..10 {
            w.go_next();
        }
        assert_eq!(w.step(), WizardStep::Evidence);
        assert!(w.errors().is_empty());
    }

    #[test]
    fn test_short_step_field_blocks_step_three() {
        let mut w = SubmissionWizard::new();
        fill_context(&mut w);
        fill_rest(&mut w);
        w.go_next();
        w.go_next();
        assert_eq!(w.step(), WizardStep::Steps);
        w.update_step(0, StepField::GoTo, "ab");
        assert!(!w.go_next());
        assert_eq!(w.errors().get("step_0_goTo"), Some("Write at least 5 characters."));
    }

    #[test]
    fn test_missing_guidance_blocks_submission() {
        let mut w = SubmissionWizard::new();
        fill_context(&mut w);
        fill_rest(&mut w);
        assert!(w.update_guidance_url(0, "").unwrap());
        assert_eq!(w.quality_status(), QualityStatus::MissingGuidance);

        let err = w.prepare_submission(&identity(), "UAL-W6", Utc::now()).unwrap_err();
        assert!(matches!(err, WizardError::Invalid(ref e) if e.contains("guidance")));
        assert_eq!(w.step(), WizardStep::Evidence);
    }

    #[test]
    fn test_guidance_alone_is_not_evidence() {
        let mut w = SubmissionWizard::new();
        fill_context(&mut w);
        fill_rest(&mut w);
        let evidence_id = w.draft().evidence()[0].id.clone();
        w.remove_evidence(&evidence_id).unwrap();
        assert!(w.draft().evidence().is_empty());
        assert_eq!(w.draft().filled_guidance_urls().count(), 1);

        let missing = w.completion_missing();
        assert_eq!(missing, vec!["At least one evidence item (photo or URL)"]);

        let err = w.prepare_submission(&identity(), "UAL-W6", Utc::now()).unwrap_err();
        assert!(matches!(err, WizardError::Invalid(ref e) if e.contains("evidence")));
        assert_eq!(w.step(), WizardStep::Evidence);
    }

    #[test]
    fn test_privacy_gate_once_per_session() {
        let mut w = SubmissionWizard::new();
        assert!(matches!(
            w.request_file_evidence("Photo"),
            Err(WizardError::PrivacyGateRequired)
        ));
        let partial = PrivacyChecks {
            no_faces: true,
            no_ids: true,
            no_confidential: false,
        };
        assert!(w.accept_privacy_gate(partial).is_err());
        assert!(!w.privacy_accepted());

        w.accept_privacy_gate(PrivacyChecks {
            no_faces: true,
            no_ids: true,
            no_confidential: true,
        })
        .unwrap();
        let first = w.request_file_evidence("Photo one").unwrap();
        let second = w.request_file_evidence("Photo two").unwrap();
        assert_ne!(first, second);
        assert_eq!(w.draft().evidence().len(), 2);
    }

    #[test]
    fn test_attach_file_rules() {
        let mut w = SubmissionWizard::new();
        let url_id = w.add_url_evidence("https://example.org", "Some page").unwrap();
        let file = FileAttachment::new("a.png", "image/png", vec![0; 4]).unwrap();
        assert!(matches!(
            w.attach_file(&url_id, file.clone()),
            Err(WizardError::WrongEvidenceKind(_))
        ));
        assert!(matches!(
            w.attach_file("missing", file),
            Err(WizardError::EvidenceNotFound(_))
        ));
    }

    #[test]
    fn test_submit_then_locked() {
        let mut w = SubmissionWizard::for_identity(&identity());
        fill_context(&mut w);
        fill_rest(&mut w);
        let plan = w.prepare_submission(&identity(), "UAL-W6", Utc::now()).unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert!(plan.journey_code().starts_with("UAL-W6-p1-"));

        w.mark_submitted("j-1", plan.journey_code());
        assert!(matches!(w.status(), WizardStatus::Submitted { .. }));
        assert!(matches!(
            w.add_url_evidence("https://example.org", "Late"),
            Err(WizardError::AlreadySubmitted)
        ));
        assert!(matches!(w.add_guidance_url(), Err(WizardError::AlreadySubmitted)));
        assert!(matches!(
            w.update_guidance_url(0, "https://example.org/other"),
            Err(WizardError::AlreadySubmitted)
        ));
        assert!(matches!(w.remove_guidance_url(0), Err(WizardError::AlreadySubmitted)));
        let checks = PrivacyChecks {
            no_faces: true,
            no_ids: true,
            no_confidential: true,
        };
        assert!(matches!(w.accept_privacy_gate(checks), Err(WizardError::AlreadySubmitted)));
    }

    #[test]
    fn test_failure_keeps_draft_for_retry() {
        let mut w = SubmissionWizard::new();
        fill_context(&mut w);
        fill_rest(&mut w);
        w.prepare_submission(&identity(), "UAL-W6", Utc::now()).unwrap();
        w.mark_failed("storage unavailable");

        assert_eq!(w.step(), WizardStep::Evidence);
        assert_eq!(w.draft().evidence().len(), 1);
        assert!(w.prepare_submission(&identity(), "UAL-W6", Utc::now()).is_ok());
    }

    #[test]
    fn test_step_wire_form() {
        assert_eq!(serde_json::to_string(&WizardStep::Outcome).unwrap(), "4");
        assert_eq!(WizardStep::try_from(8), Err("wizard step 8 is out of range 1-7".to_string()));
        assert_eq!(WizardStep::Interpretation.label(), "Interpretation + Action");
    }
}
