use crate::models::{Offer, OfferScope};
use crate::sources::OfferRepository;
use crate::OfferError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory offer store with expiry cleanup, for development and tests.
#[derive(Default)]
pub struct InMemoryOfferRepository {
    offers: RwLock<HashMap<Uuid, Offer>>,
}

impl InMemoryOfferRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offers(offers: impl IntoIterator<Item = Offer>) -> Self {
        let repo = Self::new();
        for offer in offers {
            repo.store_offer(offer);
        }
        repo
    }

    pub fn store_offer(&self, offer: Offer) {
        if let Ok(mut offers) = self.offers.write() {
            offers.insert(offer.id, offer);
        }
    }

    /// Get an offer if it's still available
    pub fn get_offer(&self, offer_id: &Uuid) -> Option<Offer> {
        self.offers
            .read()
            .ok()?
            .get(offer_id)
            .filter(|o| o.is_available())
            .cloned()
    }

    /// Drops offers whose end date has passed.
    pub fn cleanup_expired(&self) -> usize {
        let Ok(mut offers) = self.offers.write() else {
            return 0;
        };
        let initial_count = offers.len();
        offers.retain(|_, offer| !offer.is_expired());
        initial_count - offers.len()
    }

    pub fn active_count(&self) -> usize {
        self.offers
            .read()
            .map(|offers| offers.values().filter(|o| o.is_available()).count())
            .unwrap_or(0)
    }

    fn by_scope(&self, site_id: Uuid, scope: OfferScope) -> Result<Vec<Offer>, OfferError> {
        let offers = self.offers
            .read()
            .map_err(|e| OfferError::Storage(e.to_string()))?;
        let mut found: Vec<Offer> = offers
            .values()
            .filter(|o| o.scope == scope && o.applies_to_site(site_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }
}

#[async_trait]
impl OfferRepository for InMemoryOfferRepository {
    async fn site_offers(&self, site_id: Uuid) -> Result<Vec<Offer>, OfferError> {
        self.by_scope(site_id, OfferScope::Site)
    }

    async fn user_offers(&self, site_id: Uuid) -> Result<Vec<Offer>, OfferError> {
        self.by_scope(site_id, OfferScope::User)
    }

    async fn offers_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Offer>, OfferError> {
        let offers = self.offers
            .read()
            .map_err(|e| OfferError::Storage(e.to_string()))?;
        Ok(ids.iter().filter_map(|id| offers.get(id).cloned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Benefit;
    use chrono::{Duration, Utc};

    #[test]
    fn test_offer_expiry() {
        let repo = InMemoryOfferRepository::new();

        let mut offer = Offer::new("Flash sale", OfferScope::Site, 1, Benefit::Percentage(1000));
        let offer_id = offer.id;

        repo.store_offer(offer.clone());
        assert!(repo.get_offer(&offer_id).is_some());

        offer.end = Some(Utc::now() - Duration::minutes(1));
        repo.store_offer(offer);

        assert!(repo.get_offer(&offer_id).is_none());
        assert_eq!(repo.active_count(), 0);
        assert_eq!(repo.cleanup_expired(), 1);
        assert_eq!(repo.cleanup_expired(), 0);
    }

    #[tokio::test]
    async fn test_scoped_lookups() {
        let site_id = Uuid::new_v4();
        let mut other_site = Offer::new("Elsewhere", OfferScope::Site, 1, Benefit::Percentage(1000));
        other_site.site_id = Some(Uuid::new_v4());
        let everywhere = Offer::new("Everywhere", OfferScope::Site, 1, Benefit::Percentage(1000));
        let member = Offer::new("Members", OfferScope::User, 1, Benefit::Absolute(500));
        let referral = Offer::new("Referral", OfferScope::Session, 1, Benefit::Absolute(500));

        let repo = InMemoryOfferRepository::with_offers(vec![
            other_site,
            everywhere.clone(),
            member.clone(),
            referral.clone(),
        ]);

        assert_eq!(repo.site_offers(site_id).await.unwrap(), vec![everywhere]);
        assert_eq!(repo.user_offers(site_id).await.unwrap(), vec![member]);
        assert_eq!(
            repo.offers_by_ids(&[referral.id, Uuid::new_v4()]).await.unwrap(),
            vec![referral]
        );
    }
}
