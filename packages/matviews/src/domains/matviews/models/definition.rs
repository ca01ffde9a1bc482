use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{DefinitionId, MatViewError};

lazy_static! {
    static ref IDENT_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// How a definition's view gets refreshed.
///
/// Persisted as a `SMALLINT` code. Decoding an unknown code fails the row
/// read rather than silently coercing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStrategy {
    /// `REFRESH MATERIALIZED VIEW` - blocks readers for the duration.
    Regular = 0,
    /// `REFRESH MATERIALIZED VIEW CONCURRENTLY` - requires a unique index.
    Concurrent = 1,
    /// Build a new view alongside the old one and atomically rename.
    Swap = 2,
}

impl RefreshStrategy {
    pub fn code(&self) -> i16 {
        *self as i16
    }

    pub fn from_code(code: i16) -> Result<Self, MatViewError> {
        match code {
            0 => Ok(RefreshStrategy::Regular),
            1 => Ok(RefreshStrategy::Concurrent),
            2 => Ok(RefreshStrategy::Swap),
            _ => Err(MatViewError::UnknownCode {
                field: "refresh_strategy",
                code,
            }),
        }
    }
}

impl std::fmt::Display for RefreshStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshStrategy::Regular => write!(f, "regular"),
            RefreshStrategy::Concurrent => write!(f, "concurrent"),
            RefreshStrategy::Swap => write!(f, "swap"),
        }
    }
}

impl std::str::FromStr for RefreshStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "regular" => Ok(RefreshStrategy::Regular),
            "concurrent" => Ok(RefreshStrategy::Concurrent),
            "swap" => Ok(RefreshStrategy::Swap),
            _ => Err(anyhow::anyhow!("Invalid refresh strategy: {}", s)),
        }
    }
}

/// Declarative record of one materialized view: the desired state the DDL
/// services converge the database towards. Services read definitions and
/// never write them.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MatViewDefinition {
    pub id: DefinitionId,
    /// Valid SQL identifier, unique across definitions.
    pub name: String,
    /// The defining `SELECT`, interpolated verbatim into `CREATE ... AS`.
    pub sql: String,
    pub refresh_strategy: RefreshStrategy,
    /// Columns of the unique index; required non-empty for `concurrent`.
    pub unique_index_columns: Vec<String>,
    /// Upstream object names, advisory only.
    pub dependencies: Vec<String>,
    /// Advisory cron expression; the core never executes it.
    pub schedule_cron: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Operator-supplied attributes for creating or updating a definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionInput {
    pub name: String,
    pub sql: String,
    pub refresh_strategy: RefreshStrategy,
    #[serde(default)]
    pub unique_index_columns: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub schedule_cron: Option<String>,
}

impl DefinitionInput {
    /// Validate the input and return the normalized SQL body.
    ///
    /// Rejected inputs never reach DDL: invalid names, non-`SELECT` bodies,
    /// invalid index column names, and a concurrent strategy without any
    /// unique-index column.
    pub fn validate(&self) -> Result<String, MatViewError> {
        if !IDENT_RE.is_match(&self.name) {
            return Err(MatViewError::InvalidDefinition(format!(
                "name {:?} is not a valid SQL identifier",
                self.name
            )));
        }

        let sql = normalize_sql(&self.sql);
        if !sql.to_uppercase().starts_with("SELECT") {
            return Err(MatViewError::InvalidDefinition(
                "sql must be a SELECT statement".to_string(),
            ));
        }

        for column in &self.unique_index_columns {
            if !IDENT_RE.is_match(column) {
                return Err(MatViewError::InvalidDefinition(format!(
                    "unique index column {:?} is not a valid SQL identifier",
                    column
                )));
            }
        }

        if self.refresh_strategy == RefreshStrategy::Concurrent
            && self.unique_index_columns.is_empty()
        {
            return Err(MatViewError::InvalidDefinition(
                "concurrent refresh requires at least one unique index column".to_string(),
            ));
        }

        Ok(sql)
    }
}

/// Trim whitespace and a single trailing semicolon.
fn normalize_sql(sql: &str) -> String {
    let trimmed = sql.trim();
    trimmed
        .strip_suffix(';')
        .map(|s| s.trim_end())
        .unwrap_or(trimmed)
        .to_string()
}

impl MatViewDefinition {
    pub async fn create(input: DefinitionInput, pool: &PgPool) -> Result<Self, MatViewError> {
        let sql = input.validate()?;

        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO mat_view_definitions
                (id, name, sql, refresh_strategy, unique_index_columns, dependencies, schedule_cron)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(DefinitionId::new())
        .bind(&input.name)
        .bind(&sql)
        .bind(input.refresh_strategy)
        .bind(&input.unique_index_columns)
        .bind(&input.dependencies)
        .bind(&input.schedule_cron)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn update(
        id: DefinitionId,
        input: DefinitionInput,
        pool: &PgPool,
    ) -> Result<Self, MatViewError> {
        let sql = input.validate()?;

        sqlx::query_as::<_, Self>(
            r#"
            UPDATE mat_view_definitions
            SET name = $2, sql = $3, refresh_strategy = $4, unique_index_columns = $5,
                dependencies = $6, schedule_cron = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&sql)
        .bind(input.refresh_strategy)
        .bind(&input.unique_index_columns)
        .bind(&input.dependencies)
        .bind(&input.schedule_cron)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: DefinitionId, pool: &PgPool) -> Result<Self, MatViewError> {
        sqlx::query_as::<_, Self>("SELECT * FROM mat_view_definitions WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_id_optional(
        id: DefinitionId,
        pool: &PgPool,
    ) -> Result<Option<Self>, MatViewError> {
        sqlx::query_as::<_, Self>("SELECT * FROM mat_view_definitions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_name(name: &str, pool: &PgPool) -> Result<Option<Self>, MatViewError> {
        sqlx::query_as::<_, Self>("SELECT * FROM mat_view_definitions WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>, MatViewError> {
        sqlx::query_as::<_, Self>("SELECT * FROM mat_view_definitions ORDER BY name")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Delete the definition row. The physical view is dropped separately
    /// (or not at all) by the delete service.
    pub async fn delete(id: DefinitionId, pool: &PgPool) -> Result<(), MatViewError> {
        sqlx::query("DELETE FROM mat_view_definitions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
