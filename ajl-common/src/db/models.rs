//! Typed database rows
//!
//! Rows are decoded through `from_row`; an enum column holding a value
//! outside its closed set is reported as [`Error::MalformedRow`] rather than
//! being mapped to a default.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

use crate::access::Phase;
use crate::wizard::{AccessResult, BarrierType, Mode, ObservationStatus, UserFocus};
use crate::{Error, Result};

/// Parse an enum column, reporting the table on failure
fn parse_column<T: FromStr>(table: &'static str, column: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| Error::malformed(table, format!("unknown {} value '{}'", column, raw)))
}

/// Stored kind of an evidence row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Photo,
    Url,
    PolicyDoc,
}

impl EvidenceType {
    pub fn as_str(self) -> &'static str {
        match self {
            EvidenceType::Photo => "photo",
            EvidenceType::Url => "url",
            EvidenceType::PolicyDoc => "policy_doc",
        }
    }
}

impl FromStr for EvidenceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "photo" => Ok(EvidenceType::Photo),
            "url" => Ok(EvidenceType::Url),
            "policy_doc" => Ok(EvidenceType::PolicyDoc),
            other => Err(Error::InvalidInput(format!("Invalid evidence type: {}", other))),
        }
    }
}

/// How widely an observed barrier applies, set while preparing public contributions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueScope {
    SingleLocation,
    RecurringPattern,
    Unclear,
}

impl IssueScope {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueScope::SingleLocation => "single_location",
            IssueScope::RecurringPattern => "recurring_pattern",
            IssueScope::Unclear => "unclear",
        }
    }
}

impl FromStr for IssueScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single_location" => Ok(IssueScope::SingleLocation),
            "recurring_pattern" => Ok(IssueScope::RecurringPattern),
            "unclear" => Ok(IssueScope::Unclear),
            other => Err(Error::InvalidInput(format!("Invalid issue scope: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkshopState {
    pub current_phase: Phase,
    pub updated_at: String,
}

impl WorkshopState {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let raw: String = row.try_get("current_phase")?;
        Ok(Self {
            current_phase: parse_column("workshop_state", "current_phase", &raw)?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRecord {
    pub id: String,
    pub name: String,
    pub role_key: Option<String>,
    pub role_title: Option<String>,
    pub role_instructions: Option<String>,
    pub created_at: String,
}

impl GroupRecord {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            role_key: row.try_get("role_key")?,
            role_title: row.try_get("role_title")?,
            role_instructions: row.try_get("role_instructions")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// A logged claim about access, offered for linking from the wizard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimRecord {
    pub id: String,
    pub source_label: Option<String>,
    pub source_url: Option<String>,
    pub claim_text: String,
    pub user_focus: Option<String>,
    pub created_name: Option<String>,
    pub created_session_id: Option<String>,
    pub created_at: String,
}

impl ClaimRecord {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            source_label: row.try_get("source_label")?,
            source_url: row.try_get("source_url")?,
            claim_text: row.try_get("claim_text")?,
            user_focus: row.try_get("user_focus")?,
            created_name: row.try_get("created_name")?,
            created_session_id: row.try_get("created_session_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Journey fields written on submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewJourney {
    pub journey_code: String,
    pub created_name: String,
    pub created_group_id: String,
    pub created_session_id: String,
    pub group_id: String,
    pub mode: Mode,
    pub campus_or_system: String,
    pub location_text: Option<String>,
    pub url: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub user_focus: UserFocus,
    pub user_focus_other: Option<String>,
    pub journey_goal: String,
    pub claimed_access_statement: String,
    pub claimed_statement_id: Option<String>,
    pub what_happened: String,
    pub expected_outcome: String,
    pub barrier_type: BarrierType,
    pub where_happened: String,
    pub where_happened_other: Option<String>,
    pub access_result: AccessResult,
    pub missing_or_unclear: String,
    pub suggested_improvement: String,
    pub status: ObservationStatus,
}

/// A stored journey
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JourneyRecord {
    pub id: String,
    #[serde(flatten)]
    pub fields: NewJourney,
    pub issue_scope: Option<IssueScope>,
    /// OpenStreetMap note raised for this journey
    pub osm_note_url: Option<String>,
    pub created_at: String,
}

impl JourneyRecord {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        const T: &str = "journeys";
        let mode: String = row.try_get("mode")?;
        let user_focus: String = row.try_get("user_focus")?;
        let barrier_type: String = row.try_get("barrier_type")?;
        let access_result: String = row.try_get("access_result")?;
        let status: String = row.try_get("status")?;
        let issue_scope: Option<String> = row.try_get("issue_scope")?;

        Ok(Self {
            id: row.try_get("id")?,
            fields: NewJourney {
                journey_code: row.try_get("journey_code")?,
                created_name: row.try_get("created_name")?,
                created_group_id: row.try_get("created_group_id")?,
                created_session_id: row.try_get("created_session_id")?,
                group_id: row.try_get("group_id")?,
                mode: parse_column(T, "mode", &mode)?,
                campus_or_system: row.try_get("campus_or_system")?,
                location_text: row.try_get("location_text")?,
                url: row.try_get("url")?,
                lat: row.try_get("lat")?,
                lng: row.try_get("lng")?,
                user_focus: parse_column(T, "user_focus", &user_focus)?,
                user_focus_other: row.try_get("user_focus_other")?,
                journey_goal: row.try_get("journey_goal")?,
                claimed_access_statement: row.try_get("claimed_access_statement")?,
                claimed_statement_id: row.try_get("claimed_statement_id")?,
                what_happened: row.try_get("what_happened")?,
                expected_outcome: row.try_get("expected_outcome")?,
                barrier_type: parse_column(T, "barrier_type", &barrier_type)?,
                where_happened: row.try_get("where_happened")?,
                where_happened_other: row.try_get("where_happened_other")?,
                access_result: parse_column(T, "access_result", &access_result)?,
                missing_or_unclear: row.try_get("missing_or_unclear")?,
                suggested_improvement: row.try_get("suggested_improvement")?,
                status: parse_column(T, "status", &status)?,
            },
            issue_scope: issue_scope
                .map(|raw| parse_column(T, "issue_scope", &raw))
                .transpose()?,
            osm_note_url: row.try_get("osm_note_url")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewStep {
    /// 1-based position within the journey
    pub step_index: i64,
    pub go_to: String,
    pub attempt_to: String,
    pub observe: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub id: String,
    pub journey_id: String,
    #[serde(flatten)]
    pub step: NewStep,
    pub created_at: String,
}

impl StepRecord {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            journey_id: row.try_get("journey_id")?,
            step: NewStep {
                step_index: row.try_get("step_index")?,
                go_to: row.try_get("go_to")?,
                attempt_to: row.try_get("attempt_to")?,
                observe: row.try_get("observe")?,
            },
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEvidence {
    #[serde(rename = "type")]
    pub evidence_type: EvidenceType,
    pub storage_path: Option<String>,
    pub external_url: Option<String>,
    pub caption: String,
}

impl NewEvidence {
    pub fn external(evidence_type: EvidenceType, url: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            evidence_type,
            storage_path: None,
            external_url: Some(url.into()),
            caption: caption.into(),
        }
    }

    pub fn photo(storage_path: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            evidence_type: EvidenceType::Photo,
            storage_path: Some(storage_path.into()),
            external_url: None,
            caption: caption.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceRecord {
    pub id: String,
    pub journey_id: String,
    #[serde(flatten)]
    pub evidence: NewEvidence,
    pub created_at: String,
}

impl EvidenceRecord {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let raw_type: String = row.try_get("type")?;
        Ok(Self {
            id: row.try_get("id")?,
            journey_id: row.try_get("journey_id")?,
            evidence: NewEvidence {
                evidence_type: parse_column("evidence", "type", &raw_type)?,
                storage_path: row.try_get("storage_path")?,
                external_url: row.try_get("external_url")?,
                caption: row.try_get::<Option<String>, _>("caption")?.unwrap_or_default(),
            },
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Journey fields that category tools may bulk-edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryField {
    BarrierType,
    WhereHappened,
    AccessResult,
    Status,
    UserFocus,
}

impl CategoryField {
    pub const ALL: [CategoryField; 5] = [
        CategoryField::BarrierType,
        CategoryField::WhereHappened,
        CategoryField::AccessResult,
        CategoryField::Status,
        CategoryField::UserFocus,
    ];

    /// Column name; the closed set keeps dynamic SQL safe
    pub fn column(self) -> &'static str {
        match self {
            CategoryField::BarrierType => "barrier_type",
            CategoryField::WhereHappened => "where_happened",
            CategoryField::AccessResult => "access_result",
            CategoryField::Status => "status",
            CategoryField::UserFocus => "user_focus",
        }
    }

    /// Check a replacement value against the column's closed set
    pub fn validate_value(self, value: &str) -> Result<()> {
        let ok = match self {
            CategoryField::BarrierType => value.parse::<BarrierType>().is_ok(),
            CategoryField::AccessResult => value.parse::<AccessResult>().is_ok(),
            CategoryField::Status => value.parse::<ObservationStatus>().is_ok(),
            CategoryField::UserFocus => value.parse::<UserFocus>().is_ok(),
            CategoryField::WhereHappened => !value.trim().is_empty(),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "'{}' is not a valid value for {}",
                value,
                self.column()
            )))
        }
    }
}

impl FromStr for CategoryField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CategoryField::ALL
            .into_iter()
            .find(|f| f.column() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Field '{}' cannot be edited", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySuggestion {
    pub id: String,
    pub journey_id: Option<String>,
    /// A category column name or a free-form flag such as `flag_inconsistent`
    pub field_name: String,
    pub suggestion: String,
    pub rationale: Option<String>,
    pub observed_pattern: Option<String>,
    pub suggested_name: Option<String>,
    pub suggested_session_id: Option<String>,
    pub created_at: String,
}

impl CategorySuggestion {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            journey_id: row.try_get("journey_id")?,
            field_name: row.try_get("field_name")?,
            suggestion: row.try_get("suggestion")?,
            rationale: row.try_get("rationale")?,
            observed_pattern: row.try_get("observed_pattern")?,
            suggested_name: row.try_get("suggested_name")?,
            suggested_session_id: row.try_get("suggested_session_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoryBoardNote {
    pub id: String,
    pub title: String,
    pub linked_journey_ids: Vec<String>,
    pub created_at: String,
}

impl StoryBoardNote {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let raw: Option<String> = row.try_get("linked_journey_ids")?;
        let linked_journey_ids = match raw {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                Error::malformed("story_board_notes", format!("linked_journey_ids: {}", e))
            })?,
            None => Vec::new(),
        };
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            linked_journey_ids,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_field_whitelist() {
        assert_eq!("barrier_type".parse::<CategoryField>().unwrap(), CategoryField::BarrierType);
        assert!("journey_code".parse::<CategoryField>().is_err());
        assert!("id; DROP TABLE journeys".parse::<CategoryField>().is_err());
    }

    #[test]
    fn test_category_values_checked() {
        assert!(CategoryField::BarrierType.validate_value("process").is_ok());
        assert!(CategoryField::BarrierType.validate_value("vibes").is_err());
        assert!(CategoryField::WhereHappened.validate_value("  ").is_err());
    }

    #[test]
    fn test_unknown_enum_is_malformed() {
        let err = parse_column::<Mode>("journeys", "mode", "teleport").unwrap_err();
        assert!(matches!(err, Error::MalformedRow { table: "journeys", .. }));
    }
}
