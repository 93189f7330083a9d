//! Journey persistence: the submission write, feed, detail, delete and map
//!
//! A submission is written in dependency order inside one transaction:
//! journey, then steps, then evidence. File objects are uploaded first and
//! removed again if anything after them fails, so a failed submission leaves
//! neither rows nor objects behind.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use super::models::{EvidenceRecord, JourneyRecord, NewEvidence, NewStep, StepRecord};
use crate::storage::ObjectStore;
use crate::wizard::{AccessResult, BarrierType, Mode, ObservationStatus, SubmissionPlan};
use crate::{Error, Result};

pub const FEED_LIMIT: i64 = 50;
pub const MAP_JOURNEY_LIMIT: i64 = 500;
pub const UNSPECIFIED_PLACE: &str = "(Unspecified location)";

pub(crate) const JOURNEY_COLUMNS: &str = "id, journey_code, created_name, created_group_id, \
    created_session_id, group_id, mode, campus_or_system, location_text, url, lat, lng, \
    user_focus, user_focus_other, journey_goal, claimed_access_statement, claimed_statement_id, \
    what_happened, expected_outcome, barrier_type, where_happened, where_happened_other, \
    access_result, missing_or_unclear, suggested_improvement, status, issue_scope, osm_note_url, created_at";

const STEP_COLUMNS: &str = "id, journey_id, step_index, go_to, attempt_to, observe, created_at";
const EVIDENCE_COLUMNS: &str = "id, journey_id, type, storage_path, external_url, caption, created_at";

/// Identifiers of a stored submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedJourney {
    pub id: String,
    pub journey_code: String,
}

/// Execute a [`SubmissionPlan`]
pub async fn submit_journey(
    pool: &SqlitePool,
    store: &ObjectStore,
    plan: &SubmissionPlan,
) -> Result<SubmittedJourney> {
    let mut uploaded: Vec<&str> = Vec::with_capacity(plan.uploads.len());
    for upload in &plan.uploads {
        if let Err(e) = store.put(&upload.path, &upload.bytes).await {
            warn!(path = %upload.path, "Evidence upload failed: {}", e);
            store.delete_all(uploaded).await;
            return Err(e);
        }
        uploaded.push(upload.path.as_str());
    }

    match write_submission(pool, plan).await {
        Ok(id) => {
            info!(
                journey_id = %id,
                journey_code = %plan.journey_code(),
                steps = plan.steps.len(),
                evidence = plan.evidence.len(),
                "Journey submitted"
            );
            Ok(SubmittedJourney {
                id,
                journey_code: plan.journey_code().to_string(),
            })
        }
        Err(e) => {
            warn!(journey_code = %plan.journey_code(), "Submission rolled back: {}", e);
            store.delete_all(uploaded).await;
            Err(e)
        }
    }
}

async fn write_submission(pool: &SqlitePool, plan: &SubmissionPlan) -> Result<String> {
    let journey_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let j = &plan.journey;

    // Dropping the transaction without commit rolls it back
    let mut tx = pool.begin().await?;

    sqlx::query(&format!(
        "INSERT INTO journeys ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        JOURNEY_COLUMNS
    ))
    .bind(&journey_id)
    .bind(&j.journey_code)
    .bind(&j.created_name)
    .bind(&j.created_group_id)
    .bind(&j.created_session_id)
    .bind(&j.group_id)
    .bind(j.mode.as_str())
    .bind(&j.campus_or_system)
    .bind(&j.location_text)
    .bind(&j.url)
    .bind(j.lat)
    .bind(j.lng)
    .bind(j.user_focus.as_str())
    .bind(&j.user_focus_other)
    .bind(&j.journey_goal)
    .bind(&j.claimed_access_statement)
    .bind(&j.claimed_statement_id)
    .bind(&j.what_happened)
    .bind(&j.expected_outcome)
    .bind(j.barrier_type.as_str())
    .bind(&j.where_happened)
    .bind(&j.where_happened_other)
    .bind(j.access_result.as_str())
    .bind(&j.missing_or_unclear)
    .bind(&j.suggested_improvement)
    .bind(j.status.as_str())
    .bind(Option::<String>::None)
    .bind(Option::<String>::None)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    for step in &plan.steps {
        insert_step(&mut tx, &journey_id, step, &now).await?;
    }
    for evidence in &plan.evidence {
        insert_evidence(&mut tx, &journey_id, evidence, &now).await?;
    }

    tx.commit().await?;
    Ok(journey_id)
}

async fn insert_step(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    journey_id: &str,
    step: &NewStep,
    now: &str,
) -> Result<()> {
    sqlx::query(&format!("INSERT INTO journey_steps ({}) VALUES (?, ?, ?, ?, ?, ?, ?)", STEP_COLUMNS))
        .bind(Uuid::new_v4().to_string())
        .bind(journey_id)
        .bind(step.step_index)
        .bind(&step.go_to)
        .bind(&step.attempt_to)
        .bind(&step.observe)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn insert_evidence(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    journey_id: &str,
    evidence: &NewEvidence,
    now: &str,
) -> Result<()> {
    sqlx::query(&format!("INSERT INTO evidence ({}) VALUES (?, ?, ?, ?, ?, ?, ?)", EVIDENCE_COLUMNS))
        .bind(Uuid::new_v4().to_string())
        .bind(journey_id)
        .bind(evidence.evidence_type.as_str())
        .bind(&evidence.storage_path)
        .bind(&evidence.external_url)
        .bind(&evidence.caption)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Feed filters; `None` means "all"
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JourneyFilter {
    pub mode: Option<Mode>,
    #[serde(alias = "barrier")]
    pub barrier_type: Option<BarrierType>,
    #[serde(alias = "result")]
    pub access_result: Option<AccessResult>,
    pub status: Option<ObservationStatus>,
    /// Exact campus/system match, ignoring case
    pub campus: Option<String>,
    /// Substring of the group id, ignoring case
    pub group: Option<String>,
}

/// One feed card
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    #[serde(flatten)]
    pub journey: JourneyRecord,
    /// The journey links at least one guidance / policy document
    pub has_guidance: bool,
}

/// Newest journeys matching `filter`
pub async fn feed(pool: &SqlitePool, filter: &JourneyFilter, limit: i64) -> Result<Vec<FeedEntry>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {}, EXISTS (SELECT 1 FROM evidence e WHERE e.journey_id = journeys.id \
         AND e.type = 'policy_doc') AS has_guidance FROM journeys WHERE 1 = 1",
        JOURNEY_COLUMNS
    ));
    if let Some(mode) = filter.mode {
        qb.push(" AND mode = ").push_bind(mode.as_str());
    }
    if let Some(barrier) = filter.barrier_type {
        qb.push(" AND barrier_type = ").push_bind(barrier.as_str());
    }
    if let Some(result) = filter.access_result {
        qb.push(" AND access_result = ").push_bind(result.as_str());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(campus) = filter.campus.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        qb.push(" AND lower(campus_or_system) = lower(").push_bind(campus.to_string()).push(")");
    }
    if let Some(group) = filter.group.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
        qb.push(" AND instr(lower(group_id), lower(").push_bind(group.to_string()).push(")) > 0");
    }
    qb.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter()
        .map(|row| {
            Ok(FeedEntry {
                journey: JourneyRecord::from_row(row)?,
                has_guidance: row.try_get::<i64, _>("has_guidance")? != 0,
            })
        })
        .collect()
}

pub async fn get_journey(pool: &SqlitePool, id: &str) -> Result<Option<JourneyRecord>> {
    let row = sqlx::query(&format!("SELECT {} FROM journeys WHERE id = ?", JOURNEY_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(JourneyRecord::from_row).transpose()
}

/// Journey with its steps (by index) and evidence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JourneyDetail {
    pub journey: JourneyRecord,
    pub steps: Vec<StepRecord>,
    pub evidence: Vec<EvidenceRecord>,
}

pub async fn get_journey_detail(pool: &SqlitePool, id: &str) -> Result<Option<JourneyDetail>> {
    let Some(journey) = get_journey(pool, id).await? else {
        return Ok(None);
    };
    let ids = [journey.id.clone()];
    Ok(Some(JourneyDetail {
        steps: steps_for_journeys(pool, &ids).await?,
        evidence: evidence_for_journeys(pool, &ids).await?,
        journey,
    }))
}

/// Journeys with the given ids, newest first
pub async fn journeys_by_ids(pool: &SqlitePool, ids: &[String]) -> Result<Vec<JourneyRecord>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM journeys WHERE id IN (", JOURNEY_COLUMNS));
    push_id_list(&mut qb, ids);
    qb.push(") ORDER BY created_at DESC");
    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(JourneyRecord::from_row).collect()
}

/// Steps of the given journeys ordered by journey then step index
pub async fn steps_for_journeys(pool: &SqlitePool, ids: &[String]) -> Result<Vec<StepRecord>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM journey_steps WHERE journey_id IN (", STEP_COLUMNS));
    push_id_list(&mut qb, ids);
    qb.push(") ORDER BY journey_id, step_index");
    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(StepRecord::from_row).collect()
}

/// Evidence of the given journeys in insertion order
pub async fn evidence_for_journeys(pool: &SqlitePool, ids: &[String]) -> Result<Vec<EvidenceRecord>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM evidence WHERE journey_id IN (", EVIDENCE_COLUMNS));
    push_id_list(&mut qb, ids);
    qb.push(") ORDER BY journey_id, rowid");
    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(EvidenceRecord::from_row).collect()
}

fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[String]) {
    let mut list = qb.separated(", ");
    for id in ids {
        list.push_bind(id.clone());
    }
}

pub async fn get_evidence(pool: &SqlitePool, id: &str) -> Result<Option<EvidenceRecord>> {
    let row = sqlx::query(&format!("SELECT {} FROM evidence WHERE id = ?", EVIDENCE_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(EvidenceRecord::from_row).transpose()
}

/// Delete a journey with its steps, evidence rows and stored objects
///
/// Only the session that created the journey may delete it.
pub async fn delete_journey(
    pool: &SqlitePool,
    store: &ObjectStore,
    id: &str,
    requester_session: &Uuid,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    let owner: Option<String> = sqlx::query_scalar("SELECT created_session_id FROM journeys WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    let owner = owner.ok_or_else(|| Error::NotFound(format!("Journey {}", id)))?;
    if owner != requester_session.to_string() {
        return Err(Error::Forbidden(
            "Only the session that logged this journey can delete it.".to_string(),
        ));
    }

    let objects: Vec<String> = sqlx::query_scalar(
        "SELECT storage_path FROM evidence WHERE journey_id = ? AND storage_path IS NOT NULL",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM evidence WHERE journey_id = ?").bind(id).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM journey_steps WHERE journey_id = ?").bind(id).execute(&mut *tx).await?;
    sqlx::query("DELETE FROM journeys WHERE id = ?").bind(id).execute(&mut *tx).await?;
    tx.commit().await?;

    store.delete_all(objects.iter().map(String::as_str)).await;
    info!(journey_id = %id, objects = objects.len(), "Journey deleted");
    Ok(())
}

/// Submissions sharing one place label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapPlace {
    pub label: String,
    pub count: usize,
    pub journey_ids: Vec<String>,
}

/// Display label for where a journey took place
pub fn place_label(
    mode: Mode,
    campus_or_system: &str,
    location_text: Option<&str>,
    where_happened: &str,
    where_happened_other: Option<&str>,
) -> String {
    let non_blank = |s: Option<&str>| s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    let campus = campus_or_system.trim();

    let label = match mode {
        Mode::Digital => campus.to_string(),
        Mode::Physical => {
            let specific = non_blank(location_text)
                .or_else(|| non_blank(where_happened_other))
                .or_else(|| non_blank(Some(where_happened)));
            match (campus.is_empty(), specific) {
                (false, Some(specific)) => format!("{} - {}", campus, specific),
                (true, Some(specific)) => specific,
                (_, None) => campus.to_string(),
            }
        }
    };

    if label.is_empty() {
        UNSPECIFIED_PLACE.to_string()
    } else {
        label
    }
}

fn place_from_row(row: &SqliteRow) -> Result<(String, String)> {
    let raw_mode: String = row.try_get("mode")?;
    let mode: Mode = raw_mode
        .parse()
        .map_err(|_| Error::malformed("journeys", format!("unknown mode value '{}'", raw_mode)))?;
    let campus: String = row.try_get("campus_or_system")?;
    let location: Option<String> = row.try_get("location_text")?;
    let where_happened: String = row.try_get("where_happened")?;
    let where_other: Option<String> = row.try_get("where_happened_other")?;
    let label = place_label(
        mode,
        &campus,
        location.as_deref(),
        &where_happened,
        where_other.as_deref(),
    );
    Ok((label, row.try_get("id")?))
}

/// Recent journeys grouped by place, busiest place first
pub async fn map_places(pool: &SqlitePool) -> Result<Vec<MapPlace>> {
    let rows = sqlx::query(
        "SELECT id, mode, campus_or_system, location_text, where_happened, where_happened_other \
         FROM journeys ORDER BY created_at DESC LIMIT ?",
    )
    .bind(MAP_JOURNEY_LIMIT)
    .fetch_all(pool)
    .await?;

    let mut places: Vec<MapPlace> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in &rows {
        let (label, id) = place_from_row(row)?;
        match index.get(&label) {
            Some(&i) => {
                places[i].count += 1;
                places[i].journey_ids.push(id);
            }
            None => {
                index.insert(label.clone(), places.len());
                places.push(MapPlace {
                    label,
                    count: 1,
                    journey_ids: vec![id],
                });
            }
        }
    }

    places.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    Ok(places)
}
