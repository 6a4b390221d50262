use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BasketFrozenEvent {
    pub basket_id: Uuid,
    pub site_domain: String,
    pub username: String,
    pub total_excl_discounts: i64,
    pub total: i64,
    pub currency: String,
    pub applied_offer_ids: Vec<Uuid>,
    pub payment_processor: String,
    pub timestamp: i64,
}
