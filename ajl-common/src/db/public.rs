//! Public contribution: issue scope, OpenStreetMap notes and the summary
//! shown once the workshop reaches its last phase

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use super::models::{IssueScope, JourneyRecord};
use crate::{Error, Result};

/// Where participants open a new OSM note
pub const OSM_NEW_NOTE_URL: &str = "https://www.openstreetmap.org/note/new#map=18/51.529/-0.128";

pub const NOTE_ATTRIBUTION: &str = "Week 6 Access Journey (MA IE)";

/// Note text for OpenStreetMap
///
/// Carries no display name or session id; attribution is generic.
pub fn osm_note_text(journey: &JourneyRecord) -> String {
    let fields = &journey.fields;
    let location = fields
        .location_text
        .as_deref()
        .filter(|l| !l.trim().is_empty())
        .unwrap_or(&fields.campus_or_system);
    note_text(location, &fields.what_happened, &fields.expected_outcome)
}

/// Template shown before a journey is picked
pub fn example_note_text() -> String {
    note_text(
        "UAL Camberwell Peckham Building, lift bank near main reception (Entrance A)",
        "Lift was out of service and the step-free alternative route was not clearly signposted.",
        "A clearly signposted step-free route with live lift status information.",
    )
}

fn note_text(location: &str, issue: &str, expected: &str) -> String {
    format!(
        "Access issue observed\n\nLocation: {}\n\nIssue: {}\n\nExpected: {}\n\nAttribution: {}",
        location, issue, expected, NOTE_ATTRIBUTION
    )
}

fn journey_not_found(id: &str) -> Error {
    Error::NotFound(format!("Journey {}", id))
}

pub async fn set_issue_scope(pool: &SqlitePool, journey_id: &str, scope: IssueScope) -> Result<()> {
    let result = sqlx::query("UPDATE journeys SET issue_scope = ? WHERE id = ?")
        .bind(scope.as_str())
        .bind(journey_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(journey_not_found(journey_id));
    }
    info!(journey = %journey_id, scope = scope.as_str(), "Issue scope set");
    Ok(())
}

/// Link a submitted OSM note to a journey; returns the stored URL
pub async fn set_osm_note_url(pool: &SqlitePool, journey_id: &str, url: &str) -> Result<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(Error::InvalidInput("Paste the URL of the OSM note first.".to_string()));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(Error::InvalidInput("Use the full URL of the OSM note.".to_string()));
    }

    let result = sqlx::query("UPDATE journeys SET osm_note_url = ? WHERE id = ?")
        .bind(url)
        .bind(journey_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(journey_not_found(journey_id));
    }
    info!(journey = %journey_id, "OSM note linked");
    Ok(url.to_string())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSummary {
    pub single_location: i64,
    pub recurring_pattern: i64,
    pub linked_osm: i64,
}

pub async fn public_summary(pool: &SqlitePool) -> Result<PublicSummary> {
    let (single_location, recurring_pattern, linked_osm): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(issue_scope = 'single_location'), 0),
            COALESCE(SUM(issue_scope = 'recurring_pattern'), 0),
            COALESCE(SUM(osm_note_url IS NOT NULL), 0)
        FROM journeys
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(PublicSummary {
        single_location,
        recurring_pattern,
        linked_osm,
    })
}
