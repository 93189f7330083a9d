//! Turning a finished draft into the rows and objects to write
//!
//! Planning is pure: nothing here touches the database or object storage.
//! `db::journeys::submit_journey` executes the plan.

use chrono::{DateTime, Utc};

use super::draft::{JourneyDraft, Mode, UserFocus, OTHER};
use super::evidence::EvidenceKind;
use crate::db::models::{EvidenceType, NewEvidence, NewJourney, NewStep};
use crate::identity::Identity;
use crate::{Error, Result};

/// Caption stored on rows created from guidance URLs
pub const GUIDANCE_CAPTION: &str = "Guidance / policy URL";

pub const DEFAULT_CODE_PREFIX: &str = "UAL-W6";

/// Image to upload before the evidence rows are written
#[derive(Clone, PartialEq, Eq)]
pub struct PlannedUpload {
    pub path: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for PlannedUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannedUpload")
            .field("path", &self.path)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Everything a submission writes, in write order
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionPlan {
    pub journey: NewJourney,
    pub steps: Vec<NewStep>,
    /// URL rows, then policy_doc rows, then photo rows
    pub evidence: Vec<NewEvidence>,
    pub uploads: Vec<PlannedUpload>,
}

impl SubmissionPlan {
    pub fn journey_code(&self) -> &str {
        &self.journey.journey_code
    }
}

/// `{prefix}-{group fragment}-{last 4 digits of the millisecond timestamp}`
pub fn journey_code(prefix: &str, group_label: &str, now: DateTime<Utc>) -> String {
    let alnum: Vec<char> = group_label.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let fragment: String = if alnum.is_empty() {
        "G".to_string()
    } else {
        alnum[alnum.len().saturating_sub(2)..].iter().collect()
    };

    let millis = now.timestamp_millis().to_string();
    let stamp = &millis[millis.len().saturating_sub(4)..];
    format!("{}-{}-{}", prefix, fragment, stamp)
}

/// Lower-case folder name for a group label
pub fn group_slug(group_label: &str) -> String {
    let label = if group_label.is_empty() { "unknown" } else { group_label };
    let mut slug = String::with_capacity(label.len());
    for c in label.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "group".to_string()
    } else {
        slug.to_string()
    }
}

pub fn storage_path(group_label: &str, code: &str, evidence_id: &str, ext: &str) -> String {
    format!(
        "group_{}/journey_{}/{}_{}.{}",
        group_slug(group_label),
        code,
        code,
        evidence_id,
        ext
    )
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| Error::InvalidInput(format!("{} must be selected before submitting", field)))
}

fn non_blank(s: &str) -> Option<String> {
    (!s.trim().is_empty()).then(|| s.to_string())
}

/// Build the write plan for a draft that has already passed validation
///
/// Selections that validation guarantees are still checked here so a plan
/// is never built from an incomplete draft.
pub fn plan_submission(
    draft: &JourneyDraft,
    identity: &Identity,
    code_prefix: &str,
    now: DateTime<Utc>,
) -> Result<SubmissionPlan> {
    let mode = required(draft.mode, "Mode")?;
    let barrier_type = required(draft.barrier_type, "Barrier type")?;
    let access_result = required(draft.access_result, "Access result")?;
    let status = required(draft.status, "Status")?;
    let user_focus = draft.user_focus.unwrap_or(UserFocus::Other);

    let code = journey_code(code_prefix, &draft.group, now);
    let physical = mode == Mode::Physical;
    let coordinate = |raw: &str| {
        if physical {
            raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
        } else {
            None
        }
    };

    let journey = NewJourney {
        journey_code: code.clone(),
        created_name: identity.display_name.clone(),
        created_group_id: identity.group_id.clone(),
        created_session_id: identity.session_id.to_string(),
        group_id: identity.group_id.clone(),
        mode,
        campus_or_system: draft.campus_or_system(),
        location_text: physical.then(|| draft.location_text.clone()),
        url: (mode == Mode::Digital).then(|| draft.url.clone()),
        lat: coordinate(&draft.lat),
        lng: coordinate(&draft.lng),
        user_focus,
        user_focus_other: if user_focus == UserFocus::Other {
            non_blank(&draft.user_focus_other)
        } else {
            None
        },
        journey_goal: draft.journey_goal.clone(),
        claimed_access_statement: draft.claimed_access_statement.trim().to_string(),
        claimed_statement_id: draft.linked_claim_id.clone(),
        what_happened: draft.what_happened.clone(),
        expected_outcome: draft.expected_outcome.clone(),
        barrier_type,
        where_happened: draft.where_happened.clone(),
        where_happened_other: if draft.where_happened == OTHER {
            non_blank(&draft.where_other)
        } else {
            None
        },
        access_result,
        missing_or_unclear: draft.missing_unclear.clone(),
        suggested_improvement: draft.suggested_improvement.clone(),
        status,
    };

    let steps = draft
        .steps()
        .iter()
        .enumerate()
        .map(|(idx, s)| NewStep {
            step_index: idx as i64 + 1,
            go_to: s.go_to.clone(),
            attempt_to: s.attempt_to.clone(),
            observe: s.observe.clone(),
        })
        .collect();

    let mut evidence = Vec::new();
    let mut photos = Vec::new();
    let mut uploads = Vec::new();

    for item in draft.evidence() {
        match &item.kind {
            EvidenceKind::Url { url } => {
                evidence.push(NewEvidence::external(EvidenceType::Url, url, &item.caption));
            }
            EvidenceKind::File { attachment: Some(file) } => {
                let path = storage_path(&draft.group, &code, &item.id, file.extension());
                photos.push(NewEvidence::photo(&path, &item.caption));
                uploads.push(PlannedUpload {
                    path,
                    content_type: file.content_type().to_string(),
                    bytes: file.bytes().to_vec(),
                });
            }
            EvidenceKind::File { attachment: None } => {}
        }
    }

    evidence.extend(
        draft
            .filled_guidance_urls()
            .map(|g| NewEvidence::external(EvidenceType::PolicyDoc, g, GUIDANCE_CAPTION)),
    );
    evidence.extend(photos);

    Ok(SubmissionPlan {
        journey,
        steps,
        evidence,
        uploads,
    })
}
