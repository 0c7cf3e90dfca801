use crate::error::Result;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tracing::info;
use tv_types::{App, AppConfigType, GovernanceKind};

/// Upstream mirror + validity/scheduling queries over the `apps` table
/// (spec C6).
pub struct AppStore {
    pool: PgPool,
}

fn config_type_str(ct: AppConfigType) -> &'static str {
    match ct {
        AppConfigType::Agentic => "agentic",
        AppConfigType::Cloud => "cloud",
    }
}

fn parse_config_type(s: &str) -> AppConfigType {
    match s {
        "agentic" => AppConfigType::Agentic,
        _ => AppConfigType::Cloud,
    }
}

fn row_to_app(row: &sqlx::postgres::PgRow) -> Result<App> {
    let governance: serde_json::Value = row.try_get("governance")?;
    Ok(App {
        app_id: row.try_get("app_id")?,
        contract_address: row.try_get("contract_address")?,
        display_name: row.try_get("display_name")?,
        config_type: parse_config_type(row.try_get::<String, _>("config_type")?.as_str()),
        base_image: row.try_get("base_image")?,
        target_domain_or_model: row.try_get("target_domain_or_model")?,
        kms_contract_address: row.try_get("kms_contract_address")?,
        kms_chain_id: row.try_get::<Option<i64>, _>("kms_chain_id")?.map(|v| v as u64),
        gateway_domain_suffix: row.try_get("gateway_domain_suffix")?,
        tproxy_base_domain: row.try_get("tproxy_base_domain")?,
        governance: serde_json::from_value::<GovernanceKind>(governance)?,
        deleted: row.try_get("deleted")?,
        last_synced_at: row.try_get("last_synced_at")?,
    })
}

impl AppStore {
    pub fn new(pool: PgPool) -> Self {
        AppStore { pool }
    }

    /// Batched upsert (spec §4.6): dedup by id (last wins), chunked to
    /// respect parameter limits, then a separate pass soft-deletes ids
    /// absent from the full incoming set.
    pub async fn upsert_apps(&self, records: Vec<App>) -> Result<()> {
        const CHUNK_SIZE: usize = 100;

        let mut deduped: HashMap<String, App> = HashMap::new();
        for app in records {
            deduped.insert(app.app_id.clone(), app);
        }
        let apps: Vec<App> = deduped.into_values().collect();
        let synced_ids: Vec<String> = apps.iter().map(|a| a.app_id.clone()).collect();

        for chunk in apps.chunks(CHUNK_SIZE) {
            let mut tx = self.pool.begin().await?;
            for app in chunk {
                let governance = serde_json::to_value(&app.governance)?;
                sqlx::query(
                    r#"
                    INSERT INTO apps (
                        app_id, contract_address, display_name, config_type, base_image,
                        target_domain_or_model, kms_contract_address, kms_chain_id,
                        gateway_domain_suffix, tproxy_base_domain, governance, deleted, last_synced_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, false, $12)
                    ON CONFLICT (app_id) DO UPDATE SET
                        contract_address = EXCLUDED.contract_address,
                        display_name = EXCLUDED.display_name,
                        config_type = EXCLUDED.config_type,
                        base_image = EXCLUDED.base_image,
                        target_domain_or_model = EXCLUDED.target_domain_or_model,
                        kms_contract_address = EXCLUDED.kms_contract_address,
                        kms_chain_id = EXCLUDED.kms_chain_id,
                        gateway_domain_suffix = EXCLUDED.gateway_domain_suffix,
                        tproxy_base_domain = EXCLUDED.tproxy_base_domain,
                        governance = EXCLUDED.governance,
                        deleted = false,
                        last_synced_at = EXCLUDED.last_synced_at
                    "#,
                )
                .bind(&app.app_id)
                .bind(&app.contract_address)
                .bind(&app.display_name)
                .bind(config_type_str(app.config_type))
                .bind(&app.base_image)
                .bind(&app.target_domain_or_model)
                .bind(&app.kms_contract_address)
                .bind(app.kms_chain_id.map(|v| v as i64))
                .bind(&app.gateway_domain_suffix)
                .bind(&app.tproxy_base_domain)
                .bind(governance)
                .bind(app.last_synced_at)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
        }

        let deleted = sqlx::query("UPDATE apps SET deleted = true WHERE NOT (app_id = ANY($1)) AND deleted = false")
            .bind(&synced_ids)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted > 0 {
            info!(deleted, "soft-deleted apps absent from upstream sync");
        }

        Ok(())
    }

    /// Existence check used by the queue's "fail fast if the app doesn't
    /// exist" guard (spec §4.5 `addTask`).
    pub async fn app_exists(&self, app_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM apps WHERE app_id = $1").bind(app_id).fetch_optional(&self.pool).await?;
        Ok(row.is_some())
    }

    /// Re-checked validity for a single app at worker dispatch time (spec
    /// §4.5 "App validity is re-checked inside the worker").
    pub async fn get_app(&self, app_id: &str) -> Result<Option<App>> {
        let row = sqlx::query("SELECT * FROM apps WHERE app_id = $1").bind(app_id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_app).transpose()
    }

    /// `contract_address` non-empty AND `target_domain_or_model` non-empty
    /// AND not deleted (spec §4.6 `getValidApps`).
    pub async fn get_valid_apps(&self) -> Result<Vec<App>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM apps
            WHERE deleted = false
              AND coalesce(contract_address, '') <> ''
              AND coalesce(target_domain_or_model, '') <> ''
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_app).collect()
    }

    /// Authoritative scheduler query (spec §4.6): valid apps whose latest
    /// task (by `created_at`) either doesn't exist, or is a `completed`
    /// task older than 24h, or a `failed` task older than 30min.
    pub async fn get_apps_needing_verification(&self) -> Result<Vec<App>> {
        let rows = sqlx::query(
            r#"
            WITH ranked_tasks AS (
                SELECT app_id, status, finished_at,
                       row_number() OVER (PARTITION BY app_id ORDER BY created_at DESC) AS rn
                FROM verification_tasks
            ),
            latest_tasks AS (
                SELECT app_id, status, finished_at FROM ranked_tasks WHERE rn = 1
            )
            SELECT a.* FROM apps a
            LEFT JOIN latest_tasks t ON t.app_id = a.app_id
            WHERE a.deleted = false
              AND coalesce(a.contract_address, '') <> ''
              AND coalesce(a.target_domain_or_model, '') <> ''
              AND (
                  t.app_id IS NULL
                  OR (t.status = 'completed' AND t.finished_at < now() - interval '24 hours')
                  OR (t.status = 'failed' AND t.finished_at < now() - interval '30 minutes')
              )
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_app).collect()
    }
}
