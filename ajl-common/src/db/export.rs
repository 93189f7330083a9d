//! Dataset exports: flat CSV tables and JSON story packs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::journeys::{evidence_for_journeys, journeys_by_ids, steps_for_journeys};
use super::models::{EvidenceRecord, JourneyRecord, StepRecord, StoryBoardNote};
use crate::csv;
use crate::{Error, Result};

pub const JOURNEYS_FILENAME: &str = "week6_journeys.csv";
pub const STEPS_FILENAME: &str = "week6_steps.csv";
pub const EVIDENCE_FILENAME: &str = "week6_evidence.csv";

pub const JOURNEY_CSV_HEADER: [&str; 21] = [
    "id",
    "journey_code",
    "group_id",
    "mode",
    "campus_or_system",
    "user_focus",
    "journey_goal",
    "claimed_access_statement",
    "claimed_statement_id",
    "claim_source_url",
    "claim_user_focus",
    "what_happened",
    "expected_outcome",
    "barrier_type",
    "where_happened",
    "access_result",
    "missing_or_unclear",
    "suggested_improvement",
    "status",
    "issue_scope",
    "created_at",
];

pub const STEP_CSV_HEADER: [&str; 7] = ["id", "journey_id", "step_index", "go_to", "attempt_to", "observe", "created_at"];

pub const EVIDENCE_CSV_HEADER: [&str; 7] = [
    "id",
    "journey_id",
    "type",
    "storage_path",
    "external_url",
    "caption",
    "created_at",
];

/// Text cells by name, NULL as empty
fn text_cells(row: &SqliteRow, columns: &[&str]) -> Result<Vec<String>> {
    columns
        .iter()
        .map(|column| Ok(row.try_get::<Option<String>, _>(*column)?.unwrap_or_default()))
        .collect()
}

pub async fn journeys_csv(pool: &SqlitePool) -> Result<String> {
    let rows = sqlx::query(
        r#"
        SELECT j.id, j.journey_code, j.group_id, j.mode, j.campus_or_system, j.user_focus,
               j.journey_goal, j.claimed_access_statement, j.claimed_statement_id,
               c.source_url AS claim_source_url, c.user_focus AS claim_user_focus,
               j.what_happened, j.expected_outcome, j.barrier_type, j.where_happened,
               j.access_result, j.missing_or_unclear, j.suggested_improvement, j.status,
               j.issue_scope, j.created_at
        FROM journeys j
        LEFT JOIN claimed_access_statements c ON c.id = j.claimed_statement_id
        ORDER BY j.created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let cells = rows
        .iter()
        .map(|row| text_cells(row, &JOURNEY_CSV_HEADER))
        .collect::<Result<Vec<_>>>()?;
    Ok(csv::render(&JOURNEY_CSV_HEADER, cells))
}

pub async fn steps_csv(pool: &SqlitePool) -> Result<String> {
    let rows = sqlx::query(
        "SELECT id, journey_id, step_index, go_to, attempt_to, observe, created_at \
         FROM journey_steps ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    let cells = rows
        .iter()
        .map(|row| {
            let step = StepRecord::from_row(row)?;
            Ok(vec![
                step.id,
                step.journey_id,
                step.step.step_index.to_string(),
                step.step.go_to,
                step.step.attempt_to,
                step.step.observe,
                step.created_at,
            ])
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(csv::render(&STEP_CSV_HEADER, cells))
}

pub async fn evidence_csv(pool: &SqlitePool) -> Result<String> {
    let rows = sqlx::query(
        "SELECT id, journey_id, type, storage_path, external_url, caption, created_at \
         FROM evidence ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    let cells = rows
        .iter()
        .map(|row| text_cells(row, &EVIDENCE_CSV_HEADER))
        .collect::<Result<Vec<_>>>()?;
    Ok(csv::render(&EVIDENCE_CSV_HEADER, cells))
}

/// Which journeys a story pack covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryPackSource {
    Journeys(Vec<String>),
    Note(String),
}

impl StoryPackSource {
    /// From the `ids` / `note` query parameters; a note takes precedence
    pub fn from_query(ids: Option<&str>, note: Option<&str>) -> Result<Self> {
        if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
            return Ok(StoryPackSource::Note(note.to_string()));
        }
        let ids: Vec<String> = ids
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            return Err(Error::InvalidInput(
                "Provide ids=id1,id2,... or note=<story_note_id>".to_string(),
            ));
        }
        Ok(StoryPackSource::Journeys(ids))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryPack {
    pub exported_at: DateTime<Utc>,
    pub journey_ids: Vec<String>,
    pub journeys: Vec<JourneyRecord>,
    pub steps: Vec<StepRecord>,
    pub evidence: Vec<EvidenceRecord>,
}

impl StoryPack {
    pub fn filename(&self) -> String {
        format!("week6_story_pack_{}.json", self.exported_at.timestamp_millis())
    }
}

async fn note_journey_ids(pool: &SqlitePool, note_id: &str) -> Result<Vec<String>> {
    let not_found = || Error::NotFound("Story note not found or has no linked journeys.".to_string());
    let row = sqlx::query("SELECT id, title, linked_journey_ids, created_at FROM story_board_notes WHERE id = ?")
        .bind(note_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(not_found)?;
    let note = StoryBoardNote::from_row(&row)?;
    if note.linked_journey_ids.is_empty() {
        return Err(not_found());
    }
    Ok(note.linked_journey_ids)
}

pub async fn story_pack(pool: &SqlitePool, source: &StoryPackSource) -> Result<StoryPack> {
    let journey_ids = match source {
        StoryPackSource::Journeys(ids) => ids.clone(),
        StoryPackSource::Note(note_id) => note_journey_ids(pool, note_id).await?,
    };

    let journeys = journeys_by_ids(pool, &journey_ids).await?;
    if journeys.is_empty() {
        return Err(Error::NotFound("No journeys found for the given IDs.".to_string()));
    }

    Ok(StoryPack {
        exported_at: Utc::now(),
        steps: steps_for_journeys(pool, &journey_ids).await?,
        evidence: evidence_for_journeys(pool, &journey_ids).await?,
        journey_ids,
        journeys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::sample_plan;
    use crate::db::init::init_memory_database;
    use crate::db::journeys::submit_journey;
    use crate::storage::ObjectStore;
    use crate::wizard::BarrierType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_journeys_csv_includes_claim_columns() {
        let pool = init_memory_database().await.unwrap();
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::new(dir.path());

        sqlx::query(
            "INSERT INTO claimed_access_statements (id, source_url, claim_text, user_focus, created_at) \
             VALUES ('claim-1', 'https://example.org/claim', 'Every entrance is step-free', 'wheelchair', 'now')",
        )
        .execute(&pool)
        .await
        .unwrap();
        let mut plan = sample_plan("CSV-1", "group-1", BarrierType::Physical);
        plan.journey.claimed_statement_id = Some("claim-1".to_string());
        plan.journey.journey_goal = "Find the \"accessible\" lift".to_string();
        submit_journey(&pool, &store, &plan).await.unwrap();

        let csv = journeys_csv(&pool).await.unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), JOURNEY_CSV_HEADER.join(","));
        let row = lines.next().unwrap();
        assert!(row.contains("\"https://example.org/claim\",\"wheelchair\""));
        assert!(row.contains("\"Find the \"\"accessible\"\" lift\""));
        // NULL issue_scope renders as an empty quoted cell
        assert!(row.contains(",\"\","));
    }

    #[tokio::test]
    async fn test_steps_and_evidence_csv() {
        let pool = init_memory_database().await.unwrap();
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::new(dir.path());
        submit_journey(&pool, &store, &sample_plan("CSV-2", "group-2", BarrierType::Mixed))
            .await
            .unwrap();

        let steps = steps_csv(&pool).await.unwrap();
        assert_eq!(steps.lines().count(), 3);
        assert!(steps.starts_with("id,journey_id,step_index,"));

        let evidence = evidence_csv(&pool).await.unwrap();
        assert_eq!(evidence.lines().count(), 3);
        assert!(evidence.contains("\"policy_doc\""));
    }

    #[test]
    fn test_story_pack_source() {
        assert_eq!(
            StoryPackSource::from_query(Some(" a, ,b "), None).unwrap(),
            StoryPackSource::Journeys(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            StoryPackSource::from_query(Some("a"), Some("n-1")).unwrap(),
            StoryPackSource::Note("n-1".to_string())
        );
        assert!(StoryPackSource::from_query(Some(" , "), None).is_err());
        assert!(StoryPackSource::from_query(None, None).is_err());
    }

    #[tokio::test]
    async fn test_story_pack_from_note() {
        let pool = init_memory_database().await.unwrap();
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::new(dir.path());
        let submitted = submit_journey(&pool, &store, &sample_plan("P-1", "group-1", BarrierType::Process))
            .await
            .unwrap();

        sqlx::query("INSERT INTO story_board_notes (id, title, linked_journey_ids, created_at) VALUES (?, ?, ?, ?)")
            .bind("note-1")
            .bind("Locked doors")
            .bind(serde_json::to_string(&vec![submitted.id.clone()]).unwrap())
            .bind("now")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO story_board_notes (id, title, linked_journey_ids, created_at) VALUES ('empty', 'Nothing', '[]', 'now')")
            .execute(&pool)
            .await
            .unwrap();

        let pack = story_pack(&pool, &StoryPackSource::Note("note-1".to_string())).await.unwrap();
        assert_eq!(pack.journey_ids, vec![submitted.id.clone()]);
        assert_eq!(pack.journeys.len(), 1);
        assert_eq!(pack.steps.len(), 2);
        assert_eq!(pack.evidence.len(), 2);

        let err = story_pack(&pool, &StoryPackSource::Note("empty".to_string())).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = story_pack(&pool, &StoryPackSource::Journeys(vec!["nope".to_string()]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(m) if m == "No journeys found for the given IDs."));
    }
}
