//! Workshop groups

use sqlx::SqlitePool;

use super::models::GroupRecord;
use crate::Result;

const GROUP_COLUMNS: &str = "id, name, role_key, role_title, role_instructions, created_at";

pub async fn list_groups(pool: &SqlitePool) -> Result<Vec<GroupRecord>> {
    let rows = sqlx::query(&format!("SELECT {} FROM groups ORDER BY name", GROUP_COLUMNS))
        .fetch_all(pool)
        .await?;
    rows.iter().map(GroupRecord::from_row).collect()
}

pub async fn get_group(pool: &SqlitePool, id: &str) -> Result<Option<GroupRecord>> {
    let row = sqlx::query(&format!("SELECT {} FROM groups WHERE id = ?", GROUP_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(GroupRecord::from_row).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    #[tokio::test]
    async fn test_seeded_groups_listed_in_order() {
        let pool = init_memory_database().await.unwrap();
        let names: Vec<String> = list_groups(&pool).await.unwrap().into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["Group 1", "Group 2", "Group 3", "Group 4"]);
    }

    #[tokio::test]
    async fn test_get_group() {
        let pool = init_memory_database().await.unwrap();
        let group = get_group(&pool, "group-3").await.unwrap().unwrap();
        assert_eq!(group.role_key.as_deref(), Some("categories"));
        assert!(get_group(&pool, "group-9").await.unwrap().is_none());
    }
}
