//! Single-row workshop phase state

use chrono::Utc;
use sqlx::SqlitePool;

use super::models::WorkshopState;
use crate::access::Phase;
use crate::Result;

/// Stored state, `None` before a facilitator has ever set a phase
pub async fn load_state(pool: &SqlitePool) -> Result<Option<WorkshopState>> {
    let row = sqlx::query("SELECT current_phase, updated_at FROM workshop_state WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(WorkshopState::from_row).transpose()
}

/// Current phase; a missing row reads as the default phase
pub async fn read_phase(pool: &SqlitePool) -> Result<Phase> {
    Ok(load_state(pool)
        .await?
        .map(|s| s.current_phase)
        .unwrap_or_default())
}

/// Store a new phase, returning the previous one
pub async fn write_phase(pool: &SqlitePool, phase: Phase) -> Result<Phase> {
    let mut tx = pool.begin().await?;

    let previous: Option<String> =
        sqlx::query_scalar("SELECT current_phase FROM workshop_state WHERE id = 1")
            .fetch_optional(&mut *tx)
            .await?;

    sqlx::query(
        r#"
        INSERT INTO workshop_state (id, current_phase, updated_at)
        VALUES (1, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            current_phase = excluded.current_phase,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(phase.as_str())
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    // An unreadable previous value is reported as the default
    Ok(previous
        .and_then(|p| p.parse::<Phase>().ok())
        .unwrap_or_default())
}
