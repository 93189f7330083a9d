//! Database schema and typed queries

pub mod categories;
pub mod claims;
pub mod export;
pub mod groups;
pub mod init;
pub mod journeys;
pub mod models;
pub mod public;
pub mod workshop_state;

pub use init::{create_schema, init_database, init_memory_database};
pub use models::*;

#[cfg(test)]
pub(crate) mod fixtures {
    use super::models::{EvidenceType, NewEvidence, NewJourney, NewStep};
    use crate::wizard::submission::GUIDANCE_CAPTION;
    use crate::wizard::{
        AccessResult, BarrierType, Mode, ObservationStatus, PlannedUpload, SubmissionPlan, UserFocus,
    };
    use uuid::Uuid;

    /// A physical journey on "Main campus" with two steps, one URL and one guidance link
    pub fn sample_plan(code: &str, group_id: &str, barrier_type: BarrierType) -> SubmissionPlan {
        SubmissionPlan {
            journey: NewJourney {
                journey_code: code.to_string(),
                created_name: "Sam".to_string(),
                created_group_id: group_id.to_string(),
                created_session_id: Uuid::new_v4().to_string(),
                group_id: group_id.to_string(),
                mode: Mode::Physical,
                campus_or_system: "Main campus".to_string(),
                location_text: Some("Library entrance".to_string()),
                url: None,
                lat: Some(51.5),
                lng: None,
                user_focus: UserFocus::Wheelchair,
                user_focus_other: None,
                journey_goal: "Borrow a book from the second floor".to_string(),
                claimed_access_statement: "Step-free access to all floors".to_string(),
                claimed_statement_id: None,
                what_happened: "The lift was out of service all morning".to_string(),
                expected_outcome: "A working lift or an alternative".to_string(),
                barrier_type,
                where_happened: "entrance".to_string(),
                where_happened_other: None,
                access_result: AccessResult::Blocked,
                missing_or_unclear: "No notice about the outage".to_string(),
                suggested_improvement: "Post outage notices at the door".to_string(),
                status: ObservationStatus::Observed,
            },
            steps: vec![
                NewStep {
                    step_index: 1,
                    go_to: "Library front door".to_string(),
                    attempt_to: "Enter the building".to_string(),
                    observe: "Automatic door works".to_string(),
                },
                NewStep {
                    step_index: 2,
                    go_to: "Lift lobby".to_string(),
                    attempt_to: "Call the lift".to_string(),
                    observe: "Out of order sign".to_string(),
                },
            ],
            evidence: vec![
                NewEvidence::external(EvidenceType::Url, "https://example.org/status", "Lift status page"),
                NewEvidence::external(EvidenceType::PolicyDoc, "https://example.org/policy", GUIDANCE_CAPTION),
            ],
            uploads: Vec::new(),
        }
    }

    /// Add one photo with its planned upload
    pub fn with_upload(mut plan: SubmissionPlan) -> SubmissionPlan {
        let path = format!(
            "group_{}/journey_{code}/{code}_photo.png",
            plan.journey.group_id.replace('-', "_"),
            code = plan.journey.journey_code
        );
        plan.evidence.push(NewEvidence::photo(&path, "Out of order sign"));
        plan.uploads.push(PlannedUpload {
            path,
            content_type: "image/png".to_string(),
            bytes: b"fake-png".to_vec(),
        });
        plan
    }
}
