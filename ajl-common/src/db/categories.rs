//! Category & governance tools: dataset summary, suggestions and bulk reassignment

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use super::models::{CategoryField, CategorySuggestion};
use crate::identity::Identity;
use crate::wizard::OTHER;
use crate::{Error, Result};

pub const SUMMARY_JOURNEY_LIMIT: i64 = 500;
pub const SUGGESTION_LIMIT: i64 = 100;
/// Shown as the top barrier type when there are no journeys
pub const NO_BARRIER_TYPE: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub total_journeys: usize,
    pub top_barrier_type: String,
    /// Journeys using "other" for barrier type, location or user focus
    pub other_count: usize,
}

pub async fn summary(pool: &SqlitePool) -> Result<CategorySummary> {
    let rows = sqlx::query("SELECT barrier_type, where_happened, user_focus FROM journeys LIMIT ?")
        .bind(SUMMARY_JOURNEY_LIMIT)
        .fetch_all(pool)
        .await?;

    let mut other_count = 0;
    let mut barrier_counts: HashMap<String, usize> = HashMap::new();
    for row in &rows {
        let barrier: String = row.try_get("barrier_type")?;
        let where_happened: String = row.try_get("where_happened")?;
        let user_focus: String = row.try_get("user_focus")?;
        if [&barrier, &where_happened, &user_focus].iter().any(|v| v.as_str() == OTHER) {
            other_count += 1;
        }
        *barrier_counts.entry(barrier).or_default() += 1;
    }

    // Ties resolve alphabetically so the summary is stable
    let top_barrier_type = barrier_counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(barrier, _)| barrier)
        .unwrap_or_else(|| NO_BARRIER_TYPE.to_string());

    Ok(CategorySummary {
        total_journeys: rows.len(),
        top_barrier_type,
        other_count,
    })
}

/// Suggestion as entered on the category page
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewSuggestion {
    pub journey_id: Option<String>,
    pub field_name: String,
    pub suggestion: String,
    pub rationale: String,
    pub observed_pattern: String,
}

const SUGGESTION_COLUMNS: &str = "id, journey_id, field_name, suggestion, rationale, \
    observed_pattern, suggested_name, suggested_session_id, created_at";

pub async fn list_suggestions(pool: &SqlitePool) -> Result<Vec<CategorySuggestion>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM category_suggestions ORDER BY created_at DESC LIMIT ?",
        SUGGESTION_COLUMNS
    ))
    .bind(SUGGESTION_LIMIT)
    .fetch_all(pool)
    .await?;
    rows.iter().map(CategorySuggestion::from_row).collect()
}

pub async fn insert_suggestion(
    pool: &SqlitePool,
    new: &NewSuggestion,
    author: &Identity,
) -> Result<CategorySuggestion> {
    let field_name = new.field_name.trim();
    let suggestion = new.suggestion.trim();
    if field_name.is_empty() || suggestion.is_empty() {
        return Err(Error::InvalidInput(
            "Field name and suggestion are required.".to_string(),
        ));
    }
    let optional = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    let record = CategorySuggestion {
        id: Uuid::new_v4().to_string(),
        journey_id: new.journey_id.as_deref().and_then(optional),
        field_name: field_name.to_string(),
        suggestion: suggestion.to_string(),
        rationale: optional(&new.rationale),
        observed_pattern: optional(&new.observed_pattern),
        suggested_name: Some(author.display_name.clone()),
        suggested_session_id: Some(author.session_id.to_string()),
        created_at: Utc::now().to_rfc3339(),
    };

    if let Some(journey_id) = &record.journey_id {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM journeys WHERE id = ?")
            .bind(journey_id)
            .fetch_optional(pool)
            .await?;
        if found.is_none() {
            return Err(Error::InvalidInput(format!(
                "Journey {} does not exist; leave it blank for a general suggestion.",
                journey_id
            )));
        }
    }

    sqlx::query(&format!(
        "INSERT INTO category_suggestions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        SUGGESTION_COLUMNS
    ))
    .bind(&record.id)
    .bind(&record.journey_id)
    .bind(&record.field_name)
    .bind(&record.suggestion)
    .bind(&record.rationale)
    .bind(&record.observed_pattern)
    .bind(&record.suggested_name)
    .bind(&record.suggested_session_id)
    .bind(&record.created_at)
    .execute(pool)
    .await?;

    Ok(record)
}

pub async fn delete_suggestion(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM category_suggestions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Suggestion {}", id)));
    }
    Ok(())
}

fn required_value<'a>(value: &'a str, message: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(Error::InvalidInput(message.to_string()))
    } else {
        Ok(value)
    }
}

/// Exact number of journeys whose `field` currently equals `old_value`
pub async fn reassign_count(pool: &SqlitePool, field: CategoryField, old_value: &str) -> Result<u64> {
    let old_value = required_value(old_value, "Enter the current (old) value to count.")?;
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM journeys WHERE {} = ?",
        field.column()
    ))
    .bind(old_value)
    .fetch_one(pool)
    .await?;
    Ok(count as u64)
}

/// Replace `old_value` with `new_value` in `field` across all journeys
///
/// Returns the number of journeys updated.
pub async fn reassign(
    pool: &SqlitePool,
    field: CategoryField,
    old_value: &str,
    new_value: &str,
) -> Result<u64> {
    let old_value = required_value(old_value, "Enter both old and new values.")?;
    let new_value = required_value(new_value, "Enter both old and new values.")?;
    field.validate_value(new_value)?;

    let result = sqlx::query(&format!(
        "UPDATE journeys SET {column} = ? WHERE {column} = ?",
        column = field.column()
    ))
    .bind(new_value)
    .bind(old_value)
    .execute(pool)
    .await?;

    let updated = result.rows_affected();
    info!(field = field.column(), from = old_value, to = new_value, updated, "Categories reassigned");
    Ok(updated)
}
