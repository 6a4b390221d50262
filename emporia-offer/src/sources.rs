use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use emporia_core::switches::{FeatureSwitches, ENABLE_ENTERPRISE_ON_RUNTIME_SWITCH};
use emporia_shared::{Site, User};
use crate::basket::Basket;
use crate::models::{Offer, OfferScope, UserCondition};
use crate::OfferError;

/// Offer ids remembered in the visitor's session, e.g. from a referral link.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub key: String,
    #[serde(default)]
    pub offer_ids: Vec<Uuid>,
}

/// Request facts the offer sources may condition on.
pub struct OfferContext<'a> {
    pub site: &'a Site,
    pub user: Option<&'a User>,
    pub session: Option<&'a Session>,
    pub switches: &'a FeatureSwitches,
}

/// Gathers candidate offers for one scope.
#[async_trait]
pub trait OfferSource: Send + Sync {
    fn scope(&self) -> OfferScope;

    async fn offers(
        &self,
        basket: &Basket,
        ctx: &OfferContext<'_>,
    ) -> Result<Vec<Offer>, OfferError>;
}

/// Repository trait for offer data access
#[async_trait]
pub trait OfferRepository: Send + Sync {
    async fn site_offers(&self, site_id: Uuid) -> Result<Vec<Offer>, OfferError>;

    async fn user_offers(&self, site_id: Uuid) -> Result<Vec<Offer>, OfferError>;

    async fn offers_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Offer>, OfferError>;
}

/// Enterprise facts needed by enterprise-conditioned user offers.
#[async_trait]
pub trait EnterpriseGateway: Send + Sync {
    /// Enterprise customer the user learns under, if any.
    async fn enterprise_customer_for(
        &self,
        site: &Site,
        user: &User,
        switches: &FeatureSwitches,
    ) -> Result<Option<Uuid>, OfferError>;

    /// Never fails; an unreachable service answers `false`.
    async fn catalog_contains_course_runs(
        &self,
        site: &Site,
        course_run_ids: &[String],
        customer_uuid: &Uuid,
        catalog_uuid: Option<&Uuid>,
    ) -> bool;
}

/// Open site-wide offers.
pub struct SiteOfferSource {
    repo: Arc<dyn OfferRepository>,
}

impl SiteOfferSource {
    pub fn new(repo: Arc<dyn OfferRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl OfferSource for SiteOfferSource {
    fn scope(&self) -> OfferScope {
        OfferScope::Site
    }

    async fn offers(&self, _basket: &Basket, ctx: &OfferContext<'_>) -> Result<Vec<Offer>, OfferError> {
        let now = Utc::now();
        Ok(self.repo
            .site_offers(ctx.site.id)
            .await?
            .into_iter()
            .filter(|o| o.scope == OfferScope::Site && o.applies_to_site(ctx.site.id) && o.is_available_at(now))
            .collect())
    }
}

/// Offers of the vouchers applied to the basket.
#[derive(Default)]
pub struct BasketOfferSource;

#[async_trait]
impl OfferSource for BasketOfferSource {
    fn scope(&self) -> OfferScope {
        OfferScope::Voucher
    }

    async fn offers(&self, basket: &Basket, ctx: &OfferContext<'_>) -> Result<Vec<Offer>, OfferError> {
        let Some(user) = ctx.user else {
            return Ok(Vec::new());
        };

        let now = Utc::now();
        let mut offers = Vec::new();
        for voucher in &basket.vouchers {
            if !voucher.is_active_at(now) || !voucher.is_available_to_user(user) {
                tracing::debug!(code = %voucher.code, "Voucher skipped: inactive or unavailable to user");
                continue;
            }
            offers.extend(voucher.offers.iter().filter(|o| o.is_available_at(now)).cloned());
        }
        Ok(offers)
    }
}

/// Offers conditioned on who the user is.
pub struct UserOfferSource {
    repo: Arc<dyn OfferRepository>,
    enterprise: Option<Arc<dyn EnterpriseGateway>>,
}

impl UserOfferSource {
    pub fn new(repo: Arc<dyn OfferRepository>, enterprise: Option<Arc<dyn EnterpriseGateway>>) -> Self {
        Self { repo, enterprise }
    }

    async fn enterprise_qualifies(
        &self,
        customer_uuid: &Uuid,
        catalog_uuid: Option<&Uuid>,
        learner_customer: Option<Uuid>,
        basket: &Basket,
        ctx: &OfferContext<'_>,
    ) -> bool {
        let Some(gateway) = &self.enterprise else {
            return false;
        };
        if learner_customer.as_ref() != Some(customer_uuid) {
            return false;
        }

        let course_run_ids = basket.course_run_ids();
        if course_run_ids.is_empty() {
            return false;
        }
        gateway
            .catalog_contains_course_runs(ctx.site, &course_run_ids, customer_uuid, catalog_uuid)
            .await
    }
}

#[async_trait]
impl OfferSource for UserOfferSource {
    fn scope(&self) -> OfferScope {
        OfferScope::User
    }

    async fn offers(&self, basket: &Basket, ctx: &OfferContext<'_>) -> Result<Vec<Offer>, OfferError> {
        let Some(user) = ctx.user else {
            return Ok(Vec::new());
        };

        let now = Utc::now();
        let candidates: Vec<Offer> = self.repo
            .user_offers(ctx.site.id)
            .await?
            .into_iter()
            .filter(|o| o.scope == OfferScope::User && o.applies_to_site(ctx.site.id) && o.is_available_at(now))
            .collect();

        let enterprise_enabled = ctx.switches.is_active(ENABLE_ENTERPRISE_ON_RUNTIME_SWITCH);
        let needs_enterprise = candidates
            .iter()
            .any(|o| matches!(o.condition.user, Some(UserCondition::EnterpriseCustomer { .. })));

        // Looked up once per basket; a failed lookup only drops enterprise offers.
        let learner_customer = match (&self.enterprise, enterprise_enabled && needs_enterprise) {
            (Some(gateway), true) => match gateway.enterprise_customer_for(ctx.site, user, ctx.switches).await {
                Ok(customer) => customer,
                Err(e) => {
                    tracing::warn!(username = %user.username, "Enterprise learner lookup failed: {}", e);
                    None
                }
            },
            _ => None,
        };

        let mut offers = Vec::with_capacity(candidates.len());
        for offer in candidates {
            let qualifies = match &offer.condition.user {
                None | Some(UserCondition::Authenticated) => true,
                Some(UserCondition::EnterpriseCustomer { customer_uuid, catalog_uuid }) => {
                    enterprise_enabled
                        && self
                            .enterprise_qualifies(customer_uuid, catalog_uuid.as_ref(), learner_customer, basket, ctx)
                            .await
                }
            };
            if qualifies {
                offers.push(offer);
            }
        }
        Ok(offers)
    }
}

/// Offers whose ids were stored in the session.
pub struct SessionOfferSource {
    repo: Arc<dyn OfferRepository>,
}

impl SessionOfferSource {
    pub fn new(repo: Arc<dyn OfferRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl OfferSource for SessionOfferSource {
    fn scope(&self) -> OfferScope {
        OfferScope::Session
    }

    async fn offers(&self, _basket: &Basket, ctx: &OfferContext<'_>) -> Result<Vec<Offer>, OfferError> {
        let Some(session) = ctx.session else {
            return Ok(Vec::new());
        };
        if session.offer_ids.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        Ok(self.repo
            .offers_by_ids(&session.offer_ids)
            .await?
            .into_iter()
            .filter(|o| o.scope == OfferScope::Session && o.applies_to_site(ctx.site.id) && o.is_available_at(now))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use emporia_shared::{Partner, SiteConfiguration};
    use crate::basket::{Line, Voucher, VoucherUsage};
    use crate::expiry::InMemoryOfferRepository;
    use crate::models::{Benefit, OfferStatus};

    fn test_site() -> Site {
        Site {
            id: Uuid::new_v4(),
            domain: "shop.example.com".to_string(),
            configuration: SiteConfiguration {
                partner: Partner { id: Uuid::new_v4(), short_code: "edx".to_string(), name: "edX".to_string() },
                enterprise_api_url: "http://enterprise.local/api/v1/".to_string(),
                oauth2_provider_url: "http://lms.local/oauth2".to_string(),
                oauth2_client_id: "ecommerce".to_string(),
                oauth2_client_secret: "secret".into(),
            },
        }
    }

    fn ctx<'a>(
        site: &'a Site,
        user: Option<&'a User>,
        session: Option<&'a Session>,
        switches: &'a FeatureSwitches,
    ) -> OfferContext<'a> {
        OfferContext { site, user, session, switches }
    }

    fn voucher(code: &str, usage: VoucherUsage, offer: Offer) -> Voucher {
        let now = Utc::now();
        Voucher {
            id: Uuid::new_v4(),
            code: code.to_string(),
            usage,
            start: now - Duration::days(1),
            end: now + Duration::days(1),
            num_orders: 0,
            redeemed_by: vec![],
            offers: vec![offer],
        }
    }

    fn voucher_offer(name: &str) -> Offer {
        Offer::new(name, OfferScope::Voucher, 1, Benefit::Percentage(1000))
    }

    fn basket(site: &Site) -> Basket {
        let mut basket = Basket::new(site.id, None);
        basket.add_line(Line::new(Uuid::new_v4(), Some("course-v1:edX+DemoX+2026"), 1, 5_000));
        basket
    }

    #[tokio::test]
    async fn test_voucher_offers_need_a_user() {
        let site = test_site();
        let switches = FeatureSwitches::new();
        let mut basket = basket(&site);
        basket.vouchers.push(voucher("OPEN10", VoucherUsage::MultiUse, voucher_offer("open")));

        let offers = BasketOfferSource.offers(&basket, &ctx(&site, None, None, &switches)).await.unwrap();
        assert!(offers.is_empty());

        let user = User::new("alice");
        let offers = BasketOfferSource.offers(&basket, &ctx(&site, Some(&user), None, &switches)).await.unwrap();
        assert_eq!(offers.len(), 1);
    }

    #[tokio::test]
    async fn test_inactive_and_redeemed_vouchers_are_skipped() {
        let site = test_site();
        let switches = FeatureSwitches::new();
        let user = User::new("alice");
        let mut basket = basket(&site);

        let mut expired = voucher("OLD", VoucherUsage::MultiUse, voucher_offer("expired voucher"));
        expired.end = Utc::now() - Duration::hours(1);
        let mut redeemed = voucher("ONCE", VoucherUsage::OncePerCustomer, voucher_offer("redeemed"));
        redeemed.redeemed_by.push(user.id);
        let mut used = voucher("SINGLE", VoucherUsage::SingleUse, voucher_offer("used"));
        used.num_orders = 1;
        let mut suspended_offer = voucher_offer("suspended");
        suspended_offer.status = OfferStatus::Suspended;
        let suspended = voucher("PAUSED", VoucherUsage::MultiUse, suspended_offer);
        let valid = voucher("VALID", VoucherUsage::OncePerCustomer, voucher_offer("valid"));
        basket.vouchers = vec![expired, redeemed, used, suspended, valid];

        let offers = BasketOfferSource.offers(&basket, &ctx(&site, Some(&user), None, &switches)).await.unwrap();
        let names: Vec<&str> = offers.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["valid"]);
    }

    #[tokio::test]
    async fn test_session_offers_filtered_by_scope_site_and_validity() {
        let site = test_site();
        let switches = FeatureSwitches::new();

        let session_offer = Offer::new("referral", OfferScope::Session, 5, Benefit::Percentage(500));
        let site_scoped = Offer::new("site wide", OfferScope::Site, 5, Benefit::Percentage(500));
        let mut other_site = Offer::new("other site", OfferScope::Session, 5, Benefit::Percentage(500));
        other_site.site_id = Some(Uuid::new_v4());
        let mut ended = Offer::new("ended", OfferScope::Session, 5, Benefit::Percentage(500));
        ended.end = Some(Utc::now() - Duration::minutes(5));

        let session = Session {
            key: "s1".to_string(),
            offer_ids: vec![session_offer.id, site_scoped.id, other_site.id, ended.id, Uuid::new_v4()],
        };
        let repo = Arc::new(InMemoryOfferRepository::with_offers(vec![
            session_offer.clone(),
            site_scoped,
            other_site,
            ended,
        ]));
        let source = SessionOfferSource::new(repo);

        let offers = source.offers(&basket(&site), &ctx(&site, None, Some(&session), &switches)).await.unwrap();
        assert_eq!(offers, vec![session_offer]);
    }

    #[tokio::test]
    async fn test_no_session_offers_without_ids() {
        let site = test_site();
        let switches = FeatureSwitches::new();
        let offer = Offer::new("referral", OfferScope::Session, 5, Benefit::Percentage(500));
        let source = SessionOfferSource::new(Arc::new(InMemoryOfferRepository::with_offers(vec![offer])));

        let empty = Session { key: "s1".to_string(), offer_ids: vec![] };
        let basket = basket(&site);
        assert!(source.offers(&basket, &ctx(&site, None, Some(&empty), &switches)).await.unwrap().is_empty());
        assert!(source.offers(&basket, &ctx(&site, None, None, &switches)).await.unwrap().is_empty());
    }
}
