use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;
use emporia_core::FeatureSwitches;
use emporia_offer::{EnterpriseGateway, OfferError};
use emporia_shared::{Site, User};
use crate::client::EnterpriseApiClient;

/// Customer uuid of the first learner record, if it has one.
pub fn learner_customer_uuid(learner_data: &Value) -> Option<Uuid> {
    learner_data
        .get("results")?
        .get(0)?
        .get("enterprise_customer")?
        .get("uuid")?
        .as_str()?
        .parse()
        .ok()
}

/// Ids of every learner record in an `enterprise-learner` response.
pub fn learner_ids(learner_data: &Value) -> Vec<u64> {
    learner_data
        .get("results")
        .and_then(Value::as_array)
        .map(|results| results.iter().filter_map(|r| r.get("id")?.as_u64()).collect())
        .unwrap_or_default()
}

#[async_trait]
impl EnterpriseGateway for EnterpriseApiClient {
    async fn enterprise_customer_for(
        &self,
        site: &Site,
        user: &User,
        switches: &FeatureSwitches,
    ) -> Result<Option<Uuid>, OfferError> {
        let learner_data = self
            .fetch_enterprise_learner_data(site, user, switches)
            .await
            .map_err(|e| OfferError::Enterprise(e.to_string()))?;
        Ok(learner_customer_uuid(&learner_data))
    }

    async fn catalog_contains_course_runs(
        &self,
        site: &Site,
        course_run_ids: &[String],
        customer_uuid: &Uuid,
        catalog_uuid: Option<&Uuid>,
    ) -> bool {
        EnterpriseApiClient::catalog_contains_course_runs(self, site, course_run_ids, customer_uuid, catalog_uuid).await
    }
}
