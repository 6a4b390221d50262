use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use emporia_offer::{Benefit, Condition, Offer, OfferError, OfferRepository, OfferScope};

const OFFER_COLUMNS: &str = "id, name, site_id, scope, priority, status, start_at, end_at, \
    exclusive, max_applications, num_applications, condition, benefit";

#[derive(sqlx::FromRow)]
struct OfferRow {
    id: Uuid,
    name: String,
    site_id: Option<Uuid>,
    scope: String,
    priority: i32,
    status: String,
    start_at: Option<DateTime<Utc>>,
    end_at: Option<DateTime<Utc>>,
    exclusive: bool,
    max_applications: Option<i32>,
    num_applications: i32,
    condition: serde_json::Value,
    benefit: serde_json::Value,
}

impl TryFrom<OfferRow> for Offer {
    type Error = OfferError;

    fn try_from(row: OfferRow) -> Result<Self, Self::Error> {
        let condition: Condition = serde_json::from_value(row.condition)
            .map_err(|e| OfferError::Storage(format!("offer {} condition: {}", row.id, e)))?;
        let benefit: Benefit = serde_json::from_value(row.benefit)
            .map_err(|e| OfferError::Storage(format!("offer {} benefit: {}", row.id, e)))?;

        Ok(Offer {
            id: row.id,
            name: row.name,
            site_id: row.site_id,
            scope: row.scope.parse().map_err(OfferError::Storage)?,
            priority: row.priority,
            status: row.status.parse().map_err(OfferError::Storage)?,
            start: row.start_at,
            end: row.end_at,
            exclusive: row.exclusive,
            max_applications: row.max_applications.map(|n| n.max(0) as u32),
            num_applications: row.num_applications.max(0) as u32,
            condition,
            benefit,
        })
    }
}

fn storage(e: sqlx::Error) -> OfferError {
    OfferError::Storage(e.to_string())
}

pub struct PostgresOfferRepository {
    pub pool: PgPool,
}

impl PostgresOfferRepository {
    async fn scoped(&self, site_id: Uuid, scope: OfferScope) -> Result<Vec<Offer>, OfferError> {
        let sql = format!(
            "SELECT {} FROM offers \
             WHERE scope = $1 AND status = 'OPEN' AND (site_id IS NULL OR site_id = $2) \
             ORDER BY priority DESC, name",
            OFFER_COLUMNS
        );
        let rows = sqlx::query_as::<_, OfferRow>(&sql)
            .bind(scope.to_string())
            .bind(site_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        rows.into_iter().map(Offer::try_from).collect()
    }
}

#[async_trait]
impl OfferRepository for PostgresOfferRepository {
    async fn site_offers(&self, site_id: Uuid) -> Result<Vec<Offer>, OfferError> {
        self.scoped(site_id, OfferScope::Site).await
    }

    async fn user_offers(&self, site_id: Uuid) -> Result<Vec<Offer>, OfferError> {
        self.scoped(site_id, OfferScope::User).await
    }

    async fn offers_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Offer>, OfferError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {} FROM offers WHERE id = ANY($1)", OFFER_COLUMNS);
        let rows = sqlx::query_as::<_, OfferRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        rows.into_iter().map(Offer::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> OfferRow {
        OfferRow {
            id: Uuid::new_v4(),
            name: "Spring sale".to_string(),
            site_id: None,
            scope: "SITE".to_string(),
            priority: 10,
            status: "OPEN".to_string(),
            start_at: None,
            end_at: None,
            exclusive: false,
            max_applications: Some(5),
            num_applications: 1,
            condition: json!({"course_run_ids": ["course-v1:edX+DemoX+2026"]}),
            benefit: json!({"type": "percentage", "value": 2500}),
        }
    }

    #[test]
    fn test_row_conversion() {
        let offer = Offer::try_from(row()).unwrap();
        assert_eq!(offer.scope, OfferScope::Site);
        assert_eq!(offer.benefit, Benefit::Percentage(2500));
        assert_eq!(offer.condition.min_quantity, 1);
        assert_eq!(offer.max_applications, Some(5));
    }

    #[test]
    fn test_bad_scope_is_a_storage_error() {
        let mut bad = row();
        bad.scope = "GLOBAL".to_string();
        assert!(matches!(Offer::try_from(bad), Err(OfferError::Storage(_))));
    }
}
