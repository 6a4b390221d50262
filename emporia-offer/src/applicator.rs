use std::sync::Arc;
use futures_util::future::try_join4;
use tracing::{debug, info};
use emporia_core::switches::DEBUG_SELECTIVE_OFFERS;
use crate::basket::{Basket, OfferApplication};
use crate::models::Offer;
use crate::sources::{
    BasketOfferSource, EnterpriseGateway, OfferContext, OfferRepository, OfferSource,
    SessionOfferSource, SiteOfferSource, UserOfferSource,
};
use crate::OfferError;

/// Merges the four scopes, each exactly once, highest priority first.
///
/// The sort is stable, so equal priorities keep session, basket, user, site order.
pub fn merge_offers(
    session_offers: Vec<Offer>,
    basket_offers: Vec<Offer>,
    user_offers: Vec<Offer>,
    site_offers: Vec<Offer>,
) -> Vec<Offer> {
    let mut offers = Vec::with_capacity(
        session_offers.len() + basket_offers.len() + user_offers.len() + site_offers.len(),
    );
    offers.extend(session_offers);
    offers.extend(basket_offers);
    offers.extend(user_offers);
    offers.extend(site_offers);
    offers.sort_by(|a, b| b.priority.cmp(&a.priority));
    offers
}

/// Collects offers for a basket and applies them to its lines.
pub struct Applicator {
    site: Arc<dyn OfferSource>,
    basket: Arc<dyn OfferSource>,
    user: Arc<dyn OfferSource>,
    session: Arc<dyn OfferSource>,
}

impl Applicator {
    pub fn new(
        site: Arc<dyn OfferSource>,
        basket: Arc<dyn OfferSource>,
        user: Arc<dyn OfferSource>,
        session: Arc<dyn OfferSource>,
    ) -> Self {
        Self { site, basket, user, session }
    }

    /// Wires the standard scope sources over one offer repository.
    pub fn from_repository(
        repo: Arc<dyn OfferRepository>,
        enterprise: Option<Arc<dyn EnterpriseGateway>>,
    ) -> Self {
        Self::new(
            Arc::new(SiteOfferSource::new(repo.clone())),
            Arc::new(BasketOfferSource),
            Arc::new(UserOfferSource::new(repo.clone(), enterprise)),
            Arc::new(SessionOfferSource::new(repo)),
        )
    }

    /// Candidate offers for the basket, ordered by descending priority.
    pub async fn get_offers(
        &self,
        basket: &Basket,
        ctx: &OfferContext<'_>,
    ) -> Result<Vec<Offer>, OfferError> {
        let (site_offers, basket_offers, user_offers, session_offers) = try_join4(
            self.site.offers(basket, ctx),
            self.basket.offers(basket, ctx),
            self.user.offers(basket, ctx),
            self.session.offers(basket, ctx),
        )
        .await?;

        if ctx.switches.is_active(DEBUG_SELECTIVE_OFFERS) {
            info!(basket_id = %basket.id, count = site_offers.len(), "Site offers");
            info!(basket_id = %basket.id, count = basket_offers.len(), "Basket offers");
            info!(basket_id = %basket.id, count = user_offers.len(), "User offers");
            info!(basket_id = %basket.id, count = session_offers.len(), "Session offers");
        }

        Ok(merge_offers(session_offers, basket_offers, user_offers, site_offers))
    }

    /// Applies `offers` in order, replacing any earlier discounts on the basket.
    #[tracing::instrument(skip(self, basket, offers), fields(basket_id = %basket.id, offers = offers.len()))]
    pub fn apply_offers(&self, basket: &mut Basket, offers: &[Offer]) -> Vec<OfferApplication> {
        basket.reset_offer_applications();

        for offer in offers {
            if !offer.is_available() {
                continue;
            }
            if offer.exclusive && !basket.offer_applications.is_empty() {
                debug!(offer_id = %offer.id, "Exclusive offer skipped, basket already discounted");
                continue;
            }
            if !offer.condition.is_satisfied(basket) {
                continue;
            }

            let eligible = offer.condition.eligible_lines(basket);
            let remaining: Vec<i64> = eligible.iter().map(|&i| basket.lines[i].remaining_price()).collect();
            let discounts = offer.benefit.line_discounts(&remaining);
            let total: i64 = discounts.iter().sum();
            if total <= 0 {
                continue;
            }

            for (&i, discount) in eligible.iter().zip(discounts) {
                basket.lines[i].discount += discount;
            }
            basket.offer_applications.push(OfferApplication {
                offer_id: offer.id,
                offer_name: offer.name.clone(),
                scope: offer.scope,
                discount: total,
            });
            debug!(offer_id = %offer.id, discount = total, "Offer applied");

            if offer.exclusive {
                break;
            }
        }

        basket.offer_applications.clone()
    }

    pub async fn apply(
        &self,
        basket: &mut Basket,
        ctx: &OfferContext<'_>,
    ) -> Result<Vec<OfferApplication>, OfferError> {
        let offers = self.get_offers(basket, ctx).await?;
        Ok(self.apply_offers(basket, &offers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use async_trait::async_trait;
    use uuid::Uuid;
    use emporia_core::FeatureSwitches;
    use emporia_shared::{Partner, Site, SiteConfiguration, User};
    use crate::basket::Line;
    use crate::models::{Benefit, OfferScope};

    struct FixedSource {
        scope: OfferScope,
        offers: Vec<Offer>,
    }

    #[async_trait]
    impl OfferSource for FixedSource {
        fn scope(&self) -> OfferScope {
            self.scope
        }

        async fn offers(&self, _basket: &Basket, _ctx: &OfferContext<'_>) -> Result<Vec<Offer>, OfferError> {
            Ok(self.offers.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl OfferSource for FailingSource {
        fn scope(&self) -> OfferScope {
            OfferScope::User
        }

        async fn offers(&self, _basket: &Basket, _ctx: &OfferContext<'_>) -> Result<Vec<Offer>, OfferError> {
            Err(OfferError::Storage("connection reset".to_string()))
        }
    }

    fn fixed(scope: OfferScope, priorities: &[i32]) -> Arc<dyn OfferSource> {
        let offers = priorities
            .iter()
            .map(|p| Offer::new(&format!("{} {}", scope, p), scope, *p, Benefit::Percentage(100)))
            .collect();
        Arc::new(FixedSource { scope, offers })
    }

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

    fn basket_with(site: &Site, prices: &[i64]) -> Basket {
        let mut basket = Basket::new(site.id, None);
        for (i, price) in prices.iter().enumerate() {
            basket.add_line(Line::new(Uuid::new_v4(), Some(&format!("course-v1:edX+C{}+2026", i)), 1, *price));
        }
        basket
    }

    #[tokio::test]
    async fn test_get_offers_merges_each_scope_once_descending() {
        let applicator = Applicator::new(
            fixed(OfferScope::Site, &[5, 40]),
            fixed(OfferScope::Voucher, &[30, 1]),
            fixed(OfferScope::User, &[20, 7]),
            fixed(OfferScope::Session, &[10, 50]),
        );
        let site = test_site();
        let user = User::new("alice");
        let switches = FeatureSwitches::new().with(DEBUG_SELECTIVE_OFFERS, true);
        let ctx = OfferContext { site: &site, user: Some(&user), session: None, switches: &switches };
        let basket = basket_with(&site, &[1000]);

        let offers = applicator.get_offers(&basket, &ctx).await.unwrap();

        let priorities: Vec<i32> = offers.iter().map(|o| o.priority).collect();
        assert_eq!(priorities, vec![50, 40, 30, 20, 10, 7, 5, 1]);
        assert!(priorities.windows(2).all(|w| w[0] > w[1]));

        let ids: HashSet<Uuid> = offers.iter().map(|o| o.id).collect();
        assert_eq!(ids.len(), 8);
        for scope in [OfferScope::Site, OfferScope::Voucher, OfferScope::User, OfferScope::Session] {
            assert_eq!(offers.iter().filter(|o| o.scope == scope).count(), 2);
        }
    }

    #[tokio::test]
    async fn test_get_offers_default_path_matches_debug_path() {
        let applicator = Applicator::new(
            fixed(OfferScope::Site, &[3]),
            fixed(OfferScope::Voucher, &[9]),
            fixed(OfferScope::User, &[6]),
            fixed(OfferScope::Session, &[1]),
        );
        let site = test_site();
        let basket = basket_with(&site, &[1000]);

        let off = FeatureSwitches::new();
        let on = FeatureSwitches::new().with(DEBUG_SELECTIVE_OFFERS, true);
        let quiet = applicator
            .get_offers(&basket, &OfferContext { site: &site, user: None, session: None, switches: &off })
            .await
            .unwrap();
        let logged = applicator
            .get_offers(&basket, &OfferContext { site: &site, user: None, session: None, switches: &on })
            .await
            .unwrap();

        assert_eq!(quiet, logged);
        assert_eq!(quiet.iter().map(|o| o.priority).collect::<Vec<_>>(), vec![9, 6, 3, 1]);
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let applicator = Applicator::new(
            fixed(OfferScope::Site, &[1]),
            fixed(OfferScope::Voucher, &[]),
            Arc::new(FailingSource),
            fixed(OfferScope::Session, &[]),
        );
        let site = test_site();
        let switches = FeatureSwitches::new();
        let ctx = OfferContext { site: &site, user: None, session: None, switches: &switches };

        let result = applicator.get_offers(&basket_with(&site, &[1000]), &ctx).await;
        assert!(matches!(result, Err(OfferError::Storage(_))));
    }

    #[test]
    fn test_merge_keeps_scope_order_on_ties() {
        let session = Offer::new("session", OfferScope::Session, 10, Benefit::Percentage(100));
        let site = Offer::new("site", OfferScope::Site, 10, Benefit::Percentage(100));
        let merged = merge_offers(vec![session.clone()], vec![], vec![], vec![site.clone()]);
        assert_eq!(merged, vec![session, site]);
    }

    #[test]
    fn test_apply_offers_stacks_in_priority_order() {
        let applicator = Applicator::new(
            fixed(OfferScope::Site, &[]),
            fixed(OfferScope::Voucher, &[]),
            fixed(OfferScope::User, &[]),
            fixed(OfferScope::Session, &[]),
        );
        let site = test_site();
        let mut basket = basket_with(&site, &[10_000]);

        let half = Offer::new("Half off", OfferScope::Site, 20, Benefit::Percentage(5000));
        let minus = Offer::new("Minus ten", OfferScope::User, 10, Benefit::Absolute(1000));
        let applied = applicator.apply_offers(&mut basket, &[half.clone(), minus.clone()]);

        assert_eq!(applied.len(), 2);
        assert_eq!(applied[0].discount, 5000);
        assert_eq!(applied[1].discount, 1000);
        assert_eq!(basket.total(), 4000);

        // Re-applying starts from clean lines.
        applicator.apply_offers(&mut basket, &[half, minus]);
        assert_eq!(basket.total(), 4000);
        assert_eq!(basket.offer_applications.len(), 2);
    }

    #[test]
    fn test_exclusive_offer_rules() {
        let applicator = Applicator::new(
            fixed(OfferScope::Site, &[]),
            fixed(OfferScope::Voucher, &[]),
            fixed(OfferScope::User, &[]),
            fixed(OfferScope::Session, &[]),
        );
        let site = test_site();

        let mut exclusive = Offer::new("Exclusive", OfferScope::Voucher, 30, Benefit::Percentage(2000));
        exclusive.exclusive = true;
        let regular = Offer::new("Regular", OfferScope::Site, 10, Benefit::Percentage(1000));

        // Exclusive first: nothing else applies after it.
        let mut basket = basket_with(&site, &[1000]);
        let applied = applicator.apply_offers(&mut basket, &[exclusive.clone(), regular.clone()]);
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].offer_id, exclusive.id);

        // Exclusive after a regular one: skipped.
        let mut basket = basket_with(&site, &[1000]);
        let applied = applicator.apply_offers(&mut basket, &[regular.clone(), exclusive]);
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].offer_id, regular.id);
    }

    #[test]
    fn test_unsatisfied_and_unavailable_offers_are_skipped() {
        let applicator = Applicator::new(
            fixed(OfferScope::Site, &[]),
            fixed(OfferScope::Voucher, &[]),
            fixed(OfferScope::User, &[]),
            fixed(OfferScope::Session, &[]),
        );
        let site = test_site();
        let mut basket = basket_with(&site, &[1000]);

        let mut restricted = Offer::new("Other course", OfferScope::Site, 10, Benefit::Percentage(5000));
        restricted.condition.course_run_ids = vec!["course-v1:edX+Other+2026".to_string()];
        let mut exhausted = Offer::new("Used up", OfferScope::Site, 5, Benefit::Percentage(5000));
        exhausted.max_applications = Some(1);
        exhausted.num_applications = 1;

        let applied = applicator.apply_offers(&mut basket, &[restricted, exhausted]);
        assert!(applied.is_empty());
        assert_eq!(basket.total(), 1000);
    }
}
