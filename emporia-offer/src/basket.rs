use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use emporia_shared::User;
use crate::models::{Offer, OfferScope};
use crate::OfferError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BasketStatus {
    Open,
    Frozen,
    Submitted,
}

impl fmt::Display for BasketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BasketStatus::Open => "OPEN",
            BasketStatus::Frozen => "FROZEN",
            BasketStatus::Submitted => "SUBMITTED",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for BasketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(BasketStatus::Open),
            "FROZEN" => Ok(BasketStatus::Frozen),
            "SUBMITTED" => Ok(BasketStatus::Submitted),
            other => Err(format!("unknown basket status: {}", other)),
        }
    }
}

/// A product in the basket, priced in minor units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Line {
    pub id: Uuid,
    pub product_id: Uuid,
    pub course_run_id: Option<String>,
    pub quantity: u32,
    pub unit_price: i64,
    /// Accumulated offer discount on this line.
    #[serde(default)]
    pub discount: i64,
}

impl Line {
    pub fn new(product_id: Uuid, course_run_id: Option<&str>, quantity: u32, unit_price: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            course_run_id: course_run_id.map(|s| s.to_string()),
            quantity,
            unit_price,
            discount: 0,
        }
    }

    pub fn price_excl_discounts(&self) -> i64 {
        self.unit_price * self.quantity as i64
    }

    pub fn remaining_price(&self) -> i64 {
        (self.price_excl_discounts() - self.discount).max(0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoucherUsage {
    SingleUse,
    MultiUse,
    OncePerCustomer,
}

/// A code the customer applied to the basket, carrying its own offers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Voucher {
    pub id: Uuid,
    pub code: String,
    pub usage: VoucherUsage,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub num_orders: u32,
    /// Users who already placed an order with this voucher.
    #[serde(default)]
    pub redeemed_by: Vec<Uuid>,
    pub offers: Vec<Offer>,
}

impl Voucher {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }

    pub fn is_available_to_user(&self, user: &User) -> bool {
        match self.usage {
            VoucherUsage::SingleUse => self.num_orders == 0,
            VoucherUsage::MultiUse => true,
            VoucherUsage::OncePerCustomer => !self.redeemed_by.contains(&user.id),
        }
    }
}

/// Discount one offer produced on one basket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfferApplication {
    pub offer_id: Uuid,
    pub offer_name: String,
    pub scope: OfferScope,
    pub discount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Basket {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub site_id: Uuid,
    pub status: BasketStatus,
    pub currency: String,
    pub lines: Vec<Line>,
    #[serde(default)]
    pub vouchers: Vec<Voucher>,
    #[serde(default)]
    pub offer_applications: Vec<OfferApplication>,
}

impl Basket {
    pub fn new(site_id: Uuid, owner_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            site_id,
            status: BasketStatus::Open,
            currency: "USD".to_string(),
            lines: Vec::new(),
            vouchers: Vec::new(),
            offer_applications: Vec::new(),
        }
    }

    pub fn add_line(&mut self, line: Line) {
        self.lines.push(line);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn course_run_ids(&self) -> Vec<String> {
        self.lines.iter().filter_map(|l| l.course_run_id.clone()).collect()
    }

    pub fn total_excl_discounts(&self) -> i64 {
        self.lines.iter().map(Line::price_excl_discounts).sum()
    }

    pub fn total_discount(&self) -> i64 {
        self.lines.iter().map(|l| l.discount).sum()
    }

    pub fn total(&self) -> i64 {
        self.lines.iter().map(Line::remaining_price).sum()
    }

    pub fn applied_offer_ids(&self) -> Vec<Uuid> {
        self.offer_applications.iter().map(|a| a.offer_id).collect()
    }

    /// Clears discounts from an earlier pass before offers are re-applied.
    pub fn reset_offer_applications(&mut self) {
        self.offer_applications.clear();
        for line in &mut self.lines {
            line.discount = 0;
        }
    }

    /// Freezes the basket so its contents and prices stay fixed for payment.
    pub fn freeze(&mut self) -> Result<(), OfferError> {
        if self.status != BasketStatus::Open {
            return Err(OfferError::InvalidBasketState {
                basket_id: self.id,
                status: self.status.to_string(),
            });
        }
        self.status = BasketStatus::Frozen;
        Ok(())
    }

    /// Order number shown to the payment processor.
    pub fn order_number(&self, partner_code: &str) -> String {
        let simple = self.id.simple().to_string();
        format!("{}-{}", partner_code.to_uppercase(), &simple[..12])
    }
}

#[async_trait]
pub trait BasketRepository: Send + Sync {
    /// Basket `id` if it belongs to `owner_id`.
    async fn get_basket(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Basket>, OfferError>;

    async fn save_basket(&self, basket: &Basket) -> Result<(), OfferError>;

    /// Stores a frozen basket only if the stored copy is still open.
    ///
    /// Fails with `InvalidBasketState` when another checkout froze it first.
    async fn save_frozen_basket(&self, basket: &Basket) -> Result<(), OfferError>;
}

#[derive(Default)]
pub struct InMemoryBasketRepository {
    baskets: RwLock<HashMap<Uuid, Basket>>,
}

impl InMemoryBasketRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BasketRepository for InMemoryBasketRepository {
    async fn get_basket(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Basket>, OfferError> {
        let baskets = self.baskets
            .read()
            .map_err(|e| OfferError::Storage(e.to_string()))?;
        Ok(baskets.get(&id).filter(|b| b.owner_id == Some(owner_id)).cloned())
    }

    async fn save_basket(&self, basket: &Basket) -> Result<(), OfferError> {
        let mut baskets = self.baskets
            .write()
            .map_err(|e| OfferError::Storage(e.to_string()))?;
        baskets.insert(basket.id, basket.clone());
        Ok(())
    }

    async fn save_frozen_basket(&self, basket: &Basket) -> Result<(), OfferError> {
        let mut baskets = self.baskets
            .write()
            .map_err(|e| OfferError::Storage(e.to_string()))?;
        let stored_status = baskets.get(&basket.id).map(|b| b.status);
        if stored_status != Some(BasketStatus::Open) {
            return Err(OfferError::InvalidBasketState {
                basket_id: basket.id,
                status: stored_status.map_or_else(|| "MISSING".to_string(), |s| s.to_string()),
            });
        }
        baskets.insert(basket.id, basket.clone());
        Ok(())
    }
}
