//! Claimed access statements that journeys can link to

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::models::ClaimRecord;
use crate::identity::Identity;
use crate::{Error, Result};

/// Claims offered in the wizard's "link a claim" list
pub const RECENT_CLAIMS_LIMIT: i64 = 30;
pub const MIN_CLAIM_TEXT_CHARS: usize = 15;

const CLAIM_COLUMNS: &str =
    "id, source_label, source_url, claim_text, user_focus, created_name, created_session_id, created_at";

/// Fields of a claim being logged
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewClaim {
    pub source_url: String,
    pub source_label: String,
    pub claim_text: String,
    pub user_focus: String,
}

pub async fn recent_claims(pool: &SqlitePool, limit: i64) -> Result<Vec<ClaimRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM claimed_access_statements ORDER BY created_at DESC LIMIT ?",
        CLAIM_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter().map(ClaimRecord::from_row).collect()
}

pub async fn insert_claim(pool: &SqlitePool, claim: &NewClaim, author: &Identity) -> Result<ClaimRecord> {
    let source_url = claim.source_url.trim();
    let claim_text = claim.claim_text.trim();
    if source_url.is_empty() {
        return Err(Error::InvalidInput("Source URL is required.".to_string()));
    }
    if claim_text.chars().count() < MIN_CLAIM_TEXT_CHARS {
        return Err(Error::InvalidInput(
            "Claim text must be at least 15 characters.".to_string(),
        ));
    }

    let blank_to_none = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };
    let record = ClaimRecord {
        id: Uuid::new_v4().to_string(),
        source_label: blank_to_none(&claim.source_label),
        source_url: Some(source_url.to_string()),
        claim_text: claim_text.to_string(),
        user_focus: blank_to_none(&claim.user_focus),
        created_name: Some(author.display_name.clone()),
        created_session_id: Some(author.session_id.to_string()),
        created_at: Utc::now().to_rfc3339(),
    };

    sqlx::query(&format!(
        "INSERT INTO claimed_access_statements ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        CLAIM_COLUMNS
    ))
    .bind(&record.id)
    .bind(&record.source_label)
    .bind(&record.source_url)
    .bind(&record.claim_text)
    .bind(&record.user_focus)
    .bind(&record.created_name)
    .bind(&record.created_session_id)
    .bind(&record.created_at)
    .execute(pool)
    .await?;

    Ok(record)
}

pub async fn claim_exists(pool: &SqlitePool, id: &str) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM claimed_access_statements WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// Remove a claim logged by `requester_session`
///
/// Journeys that linked the claim keep their own statement text; their
/// link is cleared by the foreign key.
pub async fn delete_claim(pool: &SqlitePool, id: &str, requester_session: &Uuid) -> Result<()> {
    let owner: Option<Option<String>> =
        sqlx::query_scalar("SELECT created_session_id FROM claimed_access_statements WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let owner = owner.ok_or_else(|| Error::NotFound(format!("Claim {}", id)))?;
    if owner.as_deref() != Some(requester_session.to_string().as_str()) {
        return Err(Error::Forbidden(
            "Only the session that logged this claim can delete it.".to_string(),
        ));
    }

    sqlx::query("DELETE FROM claimed_access_statements WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    info!(claim_id = %id, "Claim deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    fn author() -> Identity {
        Identity::register("Sam", "group-1", "Group 1", None).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_list_newest_first() {
        let pool = init_memory_database().await.unwrap();
        for text in ["The library is fully step-free", "All lecture halls have hearing loops"] {
            let claim = NewClaim {
                source_url: "https://example.org/access".to_string(),
                claim_text: text.to_string(),
                ..Default::default()
            };
            insert_claim(&pool, &claim, &author()).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let claims = recent_claims(&pool, RECENT_CLAIMS_LIMIT).await.unwrap();
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0].claim_text, "All lecture halls have hearing loops");
        assert_eq!(claims[0].source_label, None);
        assert_eq!(claims[0].created_name.as_deref(), Some("Sam"));
    }

    #[tokio::test]
    async fn test_claim_rules() {
        let pool = init_memory_database().await.unwrap();
        let no_url = NewClaim {
            claim_text: "Step-free access everywhere".to_string(),
            ..Default::default()
        };
        assert!(insert_claim(&pool, &no_url, &author()).await.is_err());

        let short = NewClaim {
            source_url: "https://example.org".to_string(),
            claim_text: "Accessible".to_string(),
            ..Default::default()
        };
        assert!(insert_claim(&pool, &short, &author()).await.is_err());
    }

    #[tokio::test]
    async fn test_only_author_deletes_and_links_are_cleared() {
        use crate::db::fixtures::sample_plan;
        use crate::db::journeys::{get_journey, submit_journey};
        use crate::storage::ObjectStore;
        use crate::wizard::BarrierType;

        let pool = init_memory_database().await.unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let owner = author();
        let claim = NewClaim {
            source_url: "https://example.org/access".to_string(),
            claim_text: "The library is fully step-free".to_string(),
            ..Default::default()
        };
        let claim = insert_claim(&pool, &claim, &owner).await.unwrap();

        let mut plan = sample_plan("CLM-1", "group-1", BarrierType::Physical);
        plan.journey.claimed_statement_id = Some(claim.id.clone());
        let journey = submit_journey(&pool, &ObjectStore::new(dir.path()), &plan).await.unwrap();

        let stranger = Identity::register("Kim", "group-1", "Group 1", None).unwrap();
        assert!(matches!(
            delete_claim(&pool, &claim.id, &stranger.session_id).await,
            Err(Error::Forbidden(_))
        ));
        assert!(claim_exists(&pool, &claim.id).await.unwrap());

        delete_claim(&pool, &claim.id, &owner.session_id).await.unwrap();
        assert!(!claim_exists(&pool, &claim.id).await.unwrap());
        assert!(matches!(
            delete_claim(&pool, &claim.id, &owner.session_id).await,
            Err(Error::NotFound(_))
        ));

        let journey = get_journey(&pool, &journey.id).await.unwrap().unwrap();
        assert_eq!(journey.fields.claimed_statement_id, None);
        assert_eq!(journey.fields.claimed_access_statement, "Step-free access to all floors");
    }
}
