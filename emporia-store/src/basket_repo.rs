use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;
use emporia_offer::{Basket, BasketRepository, OfferError};

fn storage(e: impl std::fmt::Display) -> OfferError {
    OfferError::Storage(e.to_string())
}

/// Baskets are stored as JSON documents; status and owner are kept in
/// columns for lookups.
pub struct PostgresBasketRepository {
    pub pool: PgPool,
}

#[async_trait]
impl BasketRepository for PostgresBasketRepository {
    async fn get_basket(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Basket>, OfferError> {
        let document: Option<serde_json::Value> = sqlx::query_scalar(
            "SELECT document FROM baskets WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        document
            .map(|doc| serde_json::from_value(doc).map_err(storage))
            .transpose()
    }

    async fn save_basket(&self, basket: &Basket) -> Result<(), OfferError> {
        let document = serde_json::to_value(basket).map_err(storage)?;

        sqlx::query(
            r#"
            INSERT INTO baskets (id, owner_id, site_id, status, document, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                document = EXCLUDED.document,
                updated_at = NOW()
            "#,
        )
        .bind(basket.id)
        .bind(basket.owner_id)
        .bind(basket.site_id)
        .bind(basket.status.to_string())
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn save_frozen_basket(&self, basket: &Basket) -> Result<(), OfferError> {
        let document = serde_json::to_value(basket).map_err(storage)?;

        let result = sqlx::query(
            r#"
            UPDATE baskets
            SET status = $2, document = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'OPEN'
            "#,
        )
        .bind(basket.id)
        .bind(basket.status.to_string())
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            let status: Option<String> = sqlx::query_scalar("SELECT status FROM baskets WHERE id = $1")
                .bind(basket.id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;
            return Err(OfferError::InvalidBasketState {
                basket_id: basket.id,
                status: status.unwrap_or_else(|| "MISSING".to_string()),
            });
        }
        Ok(())
    }
}
