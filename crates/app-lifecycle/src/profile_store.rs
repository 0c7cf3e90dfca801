use crate::error::Result;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tracing::info;

/// A display/metadata record mirrored from an upstream profile source,
/// keyed by `(entity_type, entity_id)` (spec §6 "profiles" persisted state).
#[derive(Debug, Clone)]
pub struct ProfileRecord {
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub synced_at: chrono::DateTime<chrono::Utc>,
}

/// Composite-key upsert + stale-deletion over the `profiles` table (spec
/// §4.7 `sync-profiles`, §6 "composite upsert on {entity_type, entity_id};
/// stale deletion pass").
pub struct ProfileStore {
    pool: PgPool,
}

impl ProfileStore {
    pub fn new(pool: PgPool) -> Self {
        ProfileStore { pool }
    }

    /// Upserts the full batch, then deletes any row whose `(entity_type,
    /// entity_id)` was absent from it — unlike apps, profiles have no
    /// soft-delete flag, so staleness means outright removal.
    pub async fn sync(&self, records: Vec<ProfileRecord>) -> Result<()> {
        let mut deduped: HashMap<(String, String), ProfileRecord> = HashMap::new();
        for record in records {
            deduped.insert((record.entity_type.clone(), record.entity_id.clone()), record);
        }
        let records: Vec<ProfileRecord> = deduped.into_values().collect();

        let mut tx = self.pool.begin().await?;
        for record in &records {
            sqlx::query(
                r#"
                INSERT INTO profiles (entity_type, entity_id, data, synced_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (entity_type, entity_id) DO UPDATE SET
                    data = EXCLUDED.data,
                    synced_at = EXCLUDED.synced_at
                "#,
            )
            .bind(&record.entity_type)
            .bind(&record.entity_id)
            .bind(&record.data)
            .bind(record.synced_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        let mut deleted = 0u64;
        for (entity_type, group) in group_by_type(&records) {
            let ids: Vec<String> = group.iter().map(|r| r.entity_id.clone()).collect();
            let result = sqlx::query("DELETE FROM profiles WHERE entity_type = $1 AND NOT (entity_id = ANY($2))")
                .bind(&entity_type)
                .bind(&ids)
                .execute(&self.pool)
                .await?;
            deleted += result.rows_affected();
        }
        if deleted > 0 {
            info!(deleted, "removed stale profiles absent from upstream sync");
        }

        Ok(())
    }

    pub async fn get(&self, entity_type: &str, entity_id: &str) -> Result<Option<serde_json::Value>> {
        let row = sqlx::query("SELECT data FROM profiles WHERE entity_type = $1 AND entity_id = $2")
            .bind(entity_type)
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.try_get::<serde_json::Value, _>("data")).transpose().map_err(Into::into)
    }
}

fn group_by_type(records: &[ProfileRecord]) -> Vec<(String, Vec<&ProfileRecord>)> {
    let mut groups: HashMap<String, Vec<&ProfileRecord>> = HashMap::new();
    for record in records {
        groups.entry(record.entity_type.clone()).or_default().push(record);
    }
    groups.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_records_by_entity_type() {
        let now = chrono::Utc::now();
        let records = vec![
            ProfileRecord { entity_type: "app".into(), entity_id: "a1".into(), data: serde_json::json!({}), synced_at: now },
            ProfileRecord { entity_type: "app".into(), entity_id: "a2".into(), data: serde_json::json!({}), synced_at: now },
            ProfileRecord { entity_type: "operator".into(), entity_id: "o1".into(), data: serde_json::json!({}), synced_at: now },
        ];
        let groups = group_by_type(&records);
        assert_eq!(groups.len(), 2);
        let app_group = groups.iter().find(|(t, _)| t == "app").unwrap();
        assert_eq!(app_group.1.len(), 2);
    }
}
