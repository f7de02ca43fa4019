//! # Promo Rule Repository
//!
//! Rules are stored with their conditions as a JSON object and their
//! multiplier in basis points; [`PromoRuleRow`] is the raw row and is
//! converted to [`PromoRule`] on the way out.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};
use wallet_core::{Multiplier, NewPromoRule, PromoConditions, PromoRule, PromoRuleType};

const RULE_COLUMNS: &str = r#"
    id, name, rule_type, multiplier_bps, start_date, end_date, conditions, is_active, created_at
"#;

/// Raw `promo_rules` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PromoRuleRow {
    pub id: i64,
    pub name: String,
    pub rule_type: PromoRuleType,
    pub multiplier_bps: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub conditions: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PromoRuleRow> for PromoRule {
    type Error = DbError;

    fn try_from(row: PromoRuleRow) -> Result<Self, Self::Error> {
        let bps = u32::try_from(row.multiplier_bps).map_err(|_| DbError::ConstraintViolation {
            message: format!("promo rule {} has multiplier_bps {}", row.id, row.multiplier_bps),
        })?;
        let conditions: PromoConditions = serde_json::from_str(&row.conditions)?;

        Ok(PromoRule {
            id: row.id,
            name: row.name,
            rule_type: row.rule_type,
            multiplier: Multiplier::from_bps(bps),
            start_date: row.start_date,
            end_date: row.end_date,
            conditions,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

/// Repository for promo rules.
#[derive(Debug, Clone)]
pub struct PromoRuleRepository {
    pool: SqlitePool,
}

impl PromoRuleRepository {
    /// Creates a new PromoRuleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PromoRuleRepository { pool }
    }

    /// Creates a rule and returns it with its assigned id.
    pub async fn insert(&self, rule: NewPromoRule) -> DbResult<PromoRule> {
        let conditions = serde_json::to_string(&rule.conditions)?;

        let result = sqlx::query(
            r#"
            INSERT INTO promo_rules (
                name, rule_type, multiplier_bps, start_date, end_date,
                conditions, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&rule.name)
        .bind(rule.rule_type)
        .bind(i64::from(rule.multiplier.bps()))
        .bind(rule.start_date)
        .bind(rule.end_date)
        .bind(&conditions)
        .bind(rule.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!(id, name = %rule.name, multiplier = %rule.multiplier, "Promo rule created");

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Promo rule", id.to_string()))
    }

    /// Gets a rule by id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<PromoRule>> {
        let sql = format!("SELECT {} FROM promo_rules WHERE id = ?1", RULE_COLUMNS);
        let row = sqlx::query_as::<_, PromoRuleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(PromoRule::try_from).transpose()
    }

    /// Lists every rule, active or not.
    pub async fn list_all(&self) -> DbResult<Vec<PromoRule>> {
        let sql = format!("SELECT {} FROM promo_rules ORDER BY id", RULE_COLUMNS);
        let rows = sqlx::query_as::<_, PromoRuleRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(PromoRule::try_from).collect()
    }

    /// Lists active rules. Window and condition checks happen in
    /// `wallet_core::promo`.
    pub async fn list_active(&self) -> DbResult<Vec<PromoRule>> {
        let mut conn = self.pool.acquire().await?;
        self.list_active_in(&mut conn).await
    }

    /// Lists active rules inside a unit of work.
    pub async fn list_active_in(&self, conn: &mut SqliteConnection) -> DbResult<Vec<PromoRule>> {
        let sql = format!(
            "SELECT {} FROM promo_rules WHERE is_active = 1 ORDER BY id",
            RULE_COLUMNS
        );
        let rows = sqlx::query_as::<_, PromoRuleRow>(&sql)
            .fetch_all(&mut *conn)
            .await?;

        rows.into_iter().map(PromoRule::try_from).collect()
    }

    /// Turns a rule on or off.
    pub async fn set_active(&self, id: i64, active: bool) -> DbResult<PromoRule> {
        let result = sqlx::query("UPDATE promo_rules SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Promo rule", id.to_string()));
        }

        info!(id, active, "Promo rule toggled");

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Promo rule", id.to_string()))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn rule(name: &str, bps: u32) -> NewPromoRule {
        NewPromoRule {
            name: name.to_string(),
            rule_type: PromoRuleType::Category,
            multiplier: Multiplier::from_bps(bps),
            start_date: None,
            end_date: None,
            conditions: PromoConditions {
                categories: vec!["electronics".to_string()],
                segments: vec![],
                min_amount_cents: Some(5_000),
            },
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_insert_round_trips_conditions() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.promo_rules();

        let created = repo.insert(rule("Electronics boost", 11_500)).await.unwrap();
        assert!(created.id > 0);
        assert_eq!(created.multiplier.bps(), 11_500);
        assert_eq!(created.conditions.categories, vec!["electronics".to_string()]);
        assert_eq!(created.conditions.min_amount_cents, Some(5_000));
    }

    #[tokio::test]
    async fn test_set_active_filters_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.promo_rules();

        let first = repo.insert(rule("A", 11_000)).await.unwrap();
        repo.insert(rule("B", 12_000)).await.unwrap();

        repo.set_active(first.id, false).await.unwrap();

        let active = repo.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "B");
        assert_eq!(repo.list_all().await.unwrap().len(), 2);

        let err = repo.set_active(999, true).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_multiplier_below_one_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.promo_rules().insert(rule("Bad", 9_000)).await.unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation { .. }));
    }
}
