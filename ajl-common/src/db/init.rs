//! Database initialization
//!
//! Creates the database on first run and brings the schema up with
//! `CREATE TABLE IF NOT EXISTS`, so opening an existing file is a no-op.

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::Result;

/// Groups present in every fresh database
pub const DEFAULT_GROUPS: [(&str, &str, &str, &str); 4] = [
    ("group-1", "Group 1", "storyboard", "Storyboard & public expression"),
    ("group-2", "Group 2", "storyboard", "Storyboard & public expression"),
    ("group-3", "Group 3", "categories", "Categories & governance"),
    ("group-4", "Group 4", "categories", "Categories & governance"),
];

/// Open (creating if needed) the database file and ensure the schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Per-connection pragmas go on the options so every pooled connection gets them
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database with the full schema, for tests
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Create every table and seed the default rows; idempotent
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    create_workshop_state_table(pool).await?;
    create_groups_table(pool).await?;
    create_claimed_access_statements_table(pool).await?;
    create_journeys_table(pool).await?;
    create_journey_steps_table(pool).await?;
    create_evidence_table(pool).await?;
    create_category_suggestions_table(pool).await?;
    create_story_board_notes_table(pool).await?;

    seed_groups(pool).await?;
    debug!("Schema ready");
    Ok(())
}

async fn create_workshop_state_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workshop_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            current_phase TEXT NOT NULL DEFAULT '1',
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_groups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            role_key TEXT,
            role_title TEXT,
            role_instructions TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_claimed_access_statements_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS claimed_access_statements (
            id TEXT PRIMARY KEY,
            source_label TEXT,
            source_url TEXT,
            claim_text TEXT NOT NULL,
            user_focus TEXT,
            created_name TEXT,
            created_session_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_journeys_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS journeys (
            id TEXT PRIMARY KEY,
            journey_code TEXT NOT NULL,
            created_name TEXT NOT NULL,
            created_group_id TEXT NOT NULL,
            created_session_id TEXT NOT NULL,
            group_id TEXT NOT NULL,
            mode TEXT NOT NULL CHECK (mode IN ('physical', 'digital')),
            campus_or_system TEXT NOT NULL,
            location_text TEXT,
            url TEXT,
            lat REAL,
            lng REAL,
            user_focus TEXT NOT NULL,
            user_focus_other TEXT,
            journey_goal TEXT NOT NULL,
            claimed_access_statement TEXT NOT NULL,
            claimed_statement_id TEXT REFERENCES claimed_access_statements(id) ON DELETE SET NULL,
            what_happened TEXT NOT NULL,
            expected_outcome TEXT NOT NULL,
            barrier_type TEXT NOT NULL,
            where_happened TEXT NOT NULL,
            where_happened_other TEXT,
            access_result TEXT NOT NULL,
            missing_or_unclear TEXT NOT NULL,
            suggested_improvement TEXT NOT NULL,
            status TEXT NOT NULL,
            issue_scope TEXT CHECK (issue_scope IN ('single_location', 'recurring_pattern', 'unclear')),
            osm_note_url TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Databases created before OSM notes were tracked lack this column
    ensure_column(pool, "journeys", "osm_note_url", "TEXT").await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_journeys_created_at ON journeys(created_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Add `column` to `table` when an older schema does not have it yet
async fn ensure_column(pool: &SqlitePool, table: &str, column: &str, declaration: &str) -> Result<()> {
    let present: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
        .bind(table)
        .bind(column)
        .fetch_one(pool)
        .await?;
    if present == 0 {
        info!("Adding column {}.{}", table, column);
        sqlx::query(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, declaration))
            .execute(pool)
            .await?;
    }
    Ok(())
}

async fn create_journey_steps_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS journey_steps (
            id TEXT PRIMARY KEY,
            journey_id TEXT NOT NULL REFERENCES journeys(id),
            step_index INTEGER NOT NULL CHECK (step_index BETWEEN 1 AND 6),
            go_to TEXT NOT NULL,
            attempt_to TEXT NOT NULL,
            observe TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (journey_id, step_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_evidence_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS evidence (
            id TEXT PRIMARY KEY,
            journey_id TEXT NOT NULL REFERENCES journeys(id),
            type TEXT NOT NULL CHECK (type IN ('photo', 'url', 'policy_doc')),
            storage_path TEXT,
            external_url TEXT,
            caption TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_evidence_journey ON evidence(journey_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_category_suggestions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS category_suggestions (
            id TEXT PRIMARY KEY,
            journey_id TEXT REFERENCES journeys(id) ON DELETE SET NULL,
            field_name TEXT NOT NULL,
            suggestion TEXT NOT NULL,
            rationale TEXT,
            observed_pattern TEXT,
            suggested_name TEXT,
            suggested_session_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_story_board_notes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS story_board_notes (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            linked_journey_ids TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_groups(pool: &SqlitePool) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    for (id, name, role_key, role_title) in DEFAULT_GROUPS {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO groups (id, name, role_key, role_title, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(role_key)
        .bind(role_title)
        .bind(&now)
        .execute(pool)
        .await?;
    }
    Ok(())
}
