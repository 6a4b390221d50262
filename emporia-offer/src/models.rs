use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;
use crate::basket::{Basket, Line};

/// Context an offer is conditioned on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferScope {
    Site,
    /// Attached to a voucher applied to the basket.
    Voucher,
    User,
    Session,
}

impl fmt::Display for OfferScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OfferScope::Site => "SITE",
            OfferScope::Voucher => "VOUCHER",
            OfferScope::User => "USER",
            OfferScope::Session => "SESSION",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for OfferScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SITE" => Ok(OfferScope::Site),
            "VOUCHER" => Ok(OfferScope::Voucher),
            "USER" => Ok(OfferScope::User),
            "SESSION" => Ok(OfferScope::Session),
            other => Err(format!("unknown offer scope: {}", other)),
        }
    }
}

/// Offer status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Open,
    Suspended,
    Consumed,
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OfferStatus::Open => "OPEN",
            OfferStatus::Suspended => "SUSPENDED",
            OfferStatus::Consumed => "CONSUMED",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for OfferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(OfferStatus::Open),
            "SUSPENDED" => Ok(OfferStatus::Suspended),
            "CONSUMED" => Ok(OfferStatus::Consumed),
            other => Err(format!("unknown offer status: {}", other)),
        }
    }
}

/// Who a user-scope offer is for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserCondition {
    Authenticated,
    EnterpriseCustomer {
        customer_uuid: Uuid,
        catalog_uuid: Option<Uuid>,
    },
}

/// Which basket lines an offer looks at, and how many it needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    /// Course runs the offer is restricted to; empty means every line.
    #[serde(default)]
    pub course_run_ids: Vec<String>,
    #[serde(default = "default_min_quantity")]
    pub min_quantity: u32,
    #[serde(default)]
    pub user: Option<UserCondition>,
}

fn default_min_quantity() -> u32 { 1 }

impl Default for Condition {
    fn default() -> Self {
        Self {
            course_run_ids: Vec::new(),
            min_quantity: default_min_quantity(),
            user: None,
        }
    }
}

impl Condition {
    pub fn covers(&self, line: &Line) -> bool {
        if self.course_run_ids.is_empty() {
            return true;
        }
        line.course_run_id
            .as_ref()
            .is_some_and(|run| self.course_run_ids.contains(run))
    }

    pub fn eligible_lines(&self, basket: &Basket) -> Vec<usize> {
        basket.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| self.covers(line))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_satisfied(&self, basket: &Basket) -> bool {
        let quantity: u32 = self.eligible_lines(basket)
            .into_iter()
            .map(|i| basket.lines[i].quantity)
            .sum();
        quantity > 0 && quantity >= self.min_quantity
    }
}

/// Discount an offer grants, in minor currency units where monetary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Benefit {
    /// Basis points off each eligible line (2500 = 25%).
    Percentage(u32),
    /// Fixed amount off the eligible lines.
    Absolute(i64),
    /// Eligible lines together cost this much.
    FixedPrice(i64),
}

impl Benefit {
    /// Discount per eligible line, given each line's remaining price.
    pub fn line_discounts(&self, remaining: &[i64]) -> Vec<i64> {
        match self {
            Benefit::Percentage(bp) => {
                let bp = (*bp).min(10_000) as i64;
                remaining.iter().map(|r| r * bp / 10_000).collect()
            }
            Benefit::Absolute(amount) => distribute((*amount).max(0), remaining),
            Benefit::FixedPrice(price) => {
                let total: i64 = remaining.iter().sum();
                distribute((total - (*price).max(0)).max(0), remaining)
            }
        }
    }
}

/// Spreads `amount` over the lines in order, never exceeding a line's price.
fn distribute(mut amount: i64, remaining: &[i64]) -> Vec<i64> {
    remaining
        .iter()
        .map(|r| {
            let take = amount.min(*r).max(0);
            amount -= take;
            take
        })
        .collect()
}

/// A discount rule with a priority, applicable within one scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Offer {
    pub id: Uuid,
    pub name: String,
    /// `None` applies on every site.
    pub site_id: Option<Uuid>,
    pub scope: OfferScope,
    /// Higher is applied first.
    pub priority: i32,
    pub status: OfferStatus,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub exclusive: bool,
    /// Global usage budget; `None` is unlimited.
    pub max_applications: Option<u32>,
    /// Orders placed with this offer. Maintained by order placement, which
    /// consumes `BasketFrozenEvent`s; checkout only reads it.
    pub num_applications: u32,
    pub condition: Condition,
    pub benefit: Benefit,
}

impl Offer {
    pub fn new(name: &str, scope: OfferScope, priority: i32, benefit: Benefit) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            site_id: None,
            scope,
            priority,
            status: OfferStatus::Open,
            start: None,
            end: None,
            exclusive: false,
            max_applications: None,
            num_applications: 0,
            condition: Condition::default(),
            benefit,
        }
    }

    /// Check if offer is expired
    pub fn is_expired(&self) -> bool {
        self.end.is_some_and(|end| Utc::now() >= end)
    }

    pub fn is_available_at(&self, now: DateTime<Utc>) -> bool {
        if self.status != OfferStatus::Open {
            return false;
        }
        if self.start.is_some_and(|start| now < start) || self.end.is_some_and(|end| now >= end) {
            return false;
        }
        self.max_applications.map_or(true, |max| self.num_applications < max)
    }

    pub fn is_available(&self) -> bool {
        self.is_available_at(Utc::now())
    }

    pub fn applies_to_site(&self, site_id: Uuid) -> bool {
        self.site_id.map_or(true, |id| id == site_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_percentage_rounds_down() {
        assert_eq!(Benefit::Percentage(2500).line_discounts(&[1000, 333]), vec![250, 83]);
        assert_eq!(Benefit::Percentage(20_000).line_discounts(&[1000]), vec![1000]);
    }

    #[test]
    fn test_absolute_never_exceeds_line() {
        assert_eq!(Benefit::Absolute(1500).line_discounts(&[1000, 1000]), vec![1000, 500]);
        assert_eq!(Benefit::Absolute(5000).line_discounts(&[1000]), vec![1000]);
    }

    #[test]
    fn test_fixed_price() {
        assert_eq!(Benefit::FixedPrice(1200).line_discounts(&[1000, 1000]), vec![800, 0]);
        assert_eq!(Benefit::FixedPrice(5000).line_discounts(&[1000]), vec![0]);
    }

    #[test]
    fn test_availability_window_and_budget() {
        let now = Utc::now();
        let mut offer = Offer::new("Spring sale", OfferScope::Site, 10, Benefit::Percentage(1000));
        assert!(offer.is_available_at(now));

        offer.start = Some(now + Duration::hours(1));
        assert!(!offer.is_available_at(now));

        offer.start = None;
        offer.end = Some(now - Duration::minutes(1));
        assert!(!offer.is_available_at(now));
        assert!(offer.is_expired());

        offer.end = None;
        offer.max_applications = Some(2);
        offer.num_applications = 2;
        assert!(!offer.is_available_at(now));

        offer.num_applications = 0;
        offer.status = OfferStatus::Suspended;
        assert!(!offer.is_available_at(now));
    }

    #[test]
    fn test_scope_round_trips_through_str() {
        for scope in [OfferScope::Site, OfferScope::Voucher, OfferScope::User, OfferScope::Session] {
            assert_eq!(scope.to_string().parse::<OfferScope>().unwrap(), scope);
        }
    }
}
