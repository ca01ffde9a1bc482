use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;

use super::Services;
use crate::common::{
    quote_ident, EnvelopeError, MatViewError, RowCountStrategy, ServiceResponse, ServiceStatus,
};
use crate::domains::matviews::models::MatViewDefinition;

lazy_static! {
    // pg_indexes.indexdef: CREATE [UNIQUE ]INDEX <name> ON <schema>.<table> USING ...
    static ref INDEXDEF_RE: Regex =
        Regex::new(r"^CREATE (UNIQUE )?INDEX (\S+) ON (\S+) (USING .+)$").unwrap();
    // Token suffix a previous swap appended to a mirrored index name.
    static ref TOKEN_SUFFIX_RE: Regex = Regex::new(r"_\d{17}$").unwrap();
}

// PostgreSQL truncates identifiers to NAMEDATALEN - 1 bytes.
const MAX_IDENT_BYTES: usize = 63;

/// What the pre-cutover phase produced.
struct SwapDetail {
    live_existed: bool,
    mirrored_indexes: Vec<String>,
    mirrored_grants: i64,
    old_name: Option<String>,
}

impl Services {
    /// Near-zero-downtime rebuild without a unique-index requirement.
    ///
    /// Builds a timestamp-suffixed temporary view from the definition SQL,
    /// mirrors the live view's indexes and grants onto it, then renames
    /// live -> old and temp -> live inside a single transaction. The
    /// catalog rename is transactional, so readers see either fully-old or
    /// fully-new content, never a partial state.
    ///
    /// Errors before the cutover commits leave the live view untouched
    /// (the half-built temp view is dropped best-effort). Failures after
    /// commit - dropping the old view, counting rows - are reported as a
    /// `response.cleanup` warning, not as an error: the cutover already
    /// succeeded.
    pub async fn refresh_swap(
        &self,
        definition: &MatViewDefinition,
        row_count_strategy: RowCountStrategy,
    ) -> Result<ServiceResponse, MatViewError> {
        let token = Utc::now().format("%Y%m%d%H%M%S%3f").to_string();
        let temp_name = format!("{}_new_{}", definition.name, token);
        let target = self.qualified(&definition.name);
        let request = json!({
            "view": target,
            "operation": "refresh",
            "strategy": "swap",
            "temp_view": self.qualified(&temp_name),
            "row_count_strategy": row_count_strategy,
            "sql": definition.sql,
        });

        tracing::info!(view = %definition.name, temp = %temp_name, "Swap-refreshing materialized view");

        let detail = match self.swap_inner(definition, &temp_name, &token).await {
            Ok(detail) => detail,
            Err(err) => {
                tracing::warn!(view = %definition.name, error = %err, "Swap refresh failed before cutover");
                // The cutover never committed; remove the half-built temp
                // view so retries start clean. The live view is untouched.
                if let Err(cleanup_err) = sqlx::query(&format!(
                    "DROP MATERIALIZED VIEW IF EXISTS {}",
                    self.qualified(&temp_name)
                ))
                .execute(self.pool())
                .await
                {
                    tracing::warn!(view = %temp_name, error = %cleanup_err, "Failed to drop temp view");
                }
                return Ok(ServiceResponse::error(request, EnvelopeError::from_db(&err)));
            }
        };

        // Post-commit phase: best-effort only.
        let mut cleanup = json!({ "dropped_old_view": false });
        if let Some(old_name) = &detail.old_name {
            match sqlx::query(&format!(
                "DROP MATERIALIZED VIEW IF EXISTS {}",
                self.qualified(old_name)
            ))
            .execute(self.pool())
            .await
            {
                Ok(_) => cleanup = json!({ "dropped_old_view": true }),
                Err(err) => {
                    tracing::warn!(view = %old_name, error = %err, "Failed to drop old view after cutover");
                    cleanup = json!({
                        "dropped_old_view": false,
                        "warning": err.to_string(),
                    });
                }
            }
        }

        let row_count = match self.row_count(&definition.name, row_count_strategy).await {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(view = %definition.name, error = %err, "Row count failed after cutover");
                None
            }
        };

        Ok(ServiceResponse::ok(
            ServiceStatus::Swapped,
            request,
            json!({
                "row_count": row_count,
                "live_existed": detail.live_existed,
                "mirrored_indexes": detail.mirrored_indexes,
                "mirrored_grants": detail.mirrored_grants,
                "old_view": detail.old_name,
                "cleanup": cleanup,
            }),
        ))
    }

    /// Build the temp view, mirror indexes and grants, and run the cutover
    /// transaction. Everything here happens before (or inside) the commit.
    async fn swap_inner(
        &self,
        definition: &MatViewDefinition,
        temp_name: &str,
        token: &str,
    ) -> Result<SwapDetail, sqlx::Error> {
        let target = self.qualified(&definition.name);
        let temp_target = self.qualified(temp_name);

        let live_existed = self.matview_exists(&definition.name).await?;

        sqlx::query(&format!(
            "CREATE MATERIALIZED VIEW {} AS {}",
            temp_target, definition.sql
        ))
        .execute(self.pool())
        .await?;

        // Mirror the live view's indexes onto the temp view, renamed with
        // the swap token to avoid catalog name collisions while both views
        // coexist. The renamed indexes follow the view through the rename.
        let mut mirrored_indexes = Vec::new();
        if live_existed {
            let indexes: Vec<(String, String)> = sqlx::query_as(
                "SELECT indexname, indexdef FROM pg_indexes WHERE schemaname = $1 AND tablename = $2",
            )
            .bind(self.schema())
            .bind(&definition.name)
            .fetch_all(self.pool())
            .await?;

            for (index_name, indexdef) in indexes {
                let new_index = mirror_index_name(&index_name, token);
                match rewrite_indexdef(&indexdef, &new_index, &temp_target) {
                    Some(ddl) => {
                        sqlx::query(&ddl).execute(self.pool()).await?;
                        mirrored_indexes.push(new_index);
                    }
                    None => {
                        tracing::warn!(index = %index_name, def = %indexdef, "Unrecognized indexdef, skipping mirror");
                    }
                }
            }

            // Mirror grants so consumers keep their access through the swap.
            let grants: Vec<(String, String)> = sqlx::query_as(
                r#"
                SELECT grantee, privilege_type
                FROM information_schema.role_table_grants
                WHERE table_schema = $1 AND table_name = $2
                "#,
            )
            .bind(self.schema())
            .bind(&definition.name)
            .fetch_all(self.pool())
            .await?;

            let grant_count = grants.len() as i64;
            for (grantee, privilege) in grants {
                let grantee_sql = if grantee == "PUBLIC" {
                    "PUBLIC".to_string()
                } else {
                    quote_ident(&grantee)
                };
                sqlx::query(&format!(
                    "GRANT {} ON {} TO {}",
                    privilege, temp_target, grantee_sql
                ))
                .execute(self.pool())
                .await?;
            }

            // Atomic visibility cutover: both renames commit together.
            let old_name = format!("{}_old_{}", definition.name, token);
            let mut tx = self.pool().begin().await?;
            sqlx::query(&format!(
                "ALTER MATERIALIZED VIEW {} RENAME TO {}",
                target,
                quote_ident(&old_name)
            ))
            .execute(&mut *tx)
            .await?;
            sqlx::query(&format!(
                "ALTER MATERIALIZED VIEW {} RENAME TO {}",
                temp_target,
                quote_ident(&definition.name)
            ))
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;

            Ok(SwapDetail {
                live_existed,
                mirrored_indexes,
                mirrored_grants: grant_count,
                old_name: Some(old_name),
            })
        } else {
            // No live view: the cutover degenerates to a single rename.
            sqlx::query(&format!(
                "ALTER MATERIALIZED VIEW {} RENAME TO {}",
                temp_target,
                quote_ident(&definition.name)
            ))
            .execute(self.pool())
            .await?;

            Ok(SwapDetail {
                live_existed,
                mirrored_indexes,
                mirrored_grants: 0,
                old_name: None,
            })
        }
    }
}

/// Token-suffixed name for a mirrored index.
///
/// The previous swap's token is stripped first and the base is bounded to
/// `MAX_IDENT_BYTES` including the fresh token, so repeated swaps keep the
/// name stable in length. Without the bound, a name at the limit would
/// truncate to the same bytes as the live index and `CREATE INDEX` would
/// fail with a duplicate-relation error on every retry.
fn mirror_index_name(index_name: &str, token: &str) -> String {
    let base = TOKEN_SUFFIX_RE.replace(index_name, "");
    let max_base = MAX_IDENT_BYTES - token.len() - 1;
    let mut cut = max_base.min(base.len());
    while !base.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}_{}", &base[..cut], token)
}

/// Retarget a `pg_indexes.indexdef` statement at a new index name and view.
///
/// Returns `None` when the definition does not match the expected shape;
/// definition names are validated identifiers, so the catalog prints them
/// unquoted and the pattern holds for every index this crate creates.
fn rewrite_indexdef(indexdef: &str, new_index: &str, new_target: &str) -> Option<String> {
    INDEXDEF_RE.captures(indexdef).map(|caps| {
        format!(
            "CREATE {}INDEX {} ON {} {}",
            caps.get(1).map_or("", |m| m.as_str()),
            quote_ident(new_index),
            new_target,
            &caps[4]
        )
    })
}
