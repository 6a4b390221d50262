//! Client for the enterprise service: learner records, entitlements and
//! catalog membership, each cached in the tiered cache.

use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;
use emporia_core::switches::{FeatureSwitches, BACKOFF_FOR_API_CALLS_SWITCH};
use emporia_shared::{get_cache_key, Site, User};
use emporia_store::app_config::EnterpriseConfig;
use emporia_store::TieredCache;
use crate::backoff::Backoff;
use crate::error::EnterpriseError;
use crate::token::AccessTokenProvider;

pub struct EnterpriseApiClient {
    http: reqwest::Client,
    cache: TieredCache,
    tokens: AccessTokenProvider,
    backoff: Backoff,
    cache_timeout: Duration,
}

impl EnterpriseApiClient {
    pub fn new(config: &EnterpriseConfig, cache: TieredCache) -> Result<Self, EnterpriseError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| EnterpriseError::Configuration(e.to_string()))?;

        Ok(Self {
            tokens: AccessTokenProvider::new(http.clone(), cache.clone()),
            http,
            cache,
            backoff: Backoff::new(config.backoff_max_tries, Duration::from_millis(config.backoff_base_ms)),
            cache_timeout: Duration::from_secs(config.api_cache_timeout_seconds),
        })
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn learner_cache_key(site: &Site, username: &str) -> String {
        get_cache_key(&[
            ("site_domain", site.domain.as_str()),
            ("partner_code", site.partner_code()),
            ("resource", "enterprise-learner"),
            ("username", username),
        ])
    }

    pub fn entitlements_cache_key(site: &Site, learner_id: u64) -> String {
        let resource = format!("enterprise-learner/{}/entitlements", learner_id);
        let learner_id = learner_id.to_string();
        get_cache_key(&[
            ("site_domain", site.domain.as_str()),
            ("partner_code", site.partner_code()),
            ("resource", resource.as_str()),
            ("learner_id", learner_id.as_str()),
        ])
    }

    /// Learner records for `user` on `site`, the raw `enterprise-learner` response.
    pub async fn fetch_enterprise_learner_data(
        &self,
        site: &Site,
        user: &User,
        switches: &FeatureSwitches,
    ) -> Result<Value, EnterpriseError> {
        let key = Self::learner_cache_key(site, &user.username);
        if let Ok(value) = self.cache.get_cached_response(&key).await.into_value() {
            return Ok(value);
        }

        let url = format!("{}/enterprise-learner/", site.enterprise_api_root());
        let query = vec![("username", user.username.clone())];
        let response = self.get(site, &url, &query, switches).await?;

        self.cache.set_all_tiers(&key, response.clone(), self.cache_timeout).await;
        Ok(response)
    }

    pub async fn fetch_enterprise_learner_entitlements(
        &self,
        site: &Site,
        learner_id: u64,
        switches: &FeatureSwitches,
    ) -> Result<Value, EnterpriseError> {
        let key = Self::entitlements_cache_key(site, learner_id);
        if let Ok(value) = self.cache.get_cached_response(&key).await.into_value() {
            return Ok(value);
        }

        let url = format!("{}/enterprise-learner/{}/entitlements/", site.enterprise_api_root(), learner_id);
        let response = self.get(site, &url, &[], switches).await?;

        self.cache.set_all_tiers(&key, response.clone(), self.cache_timeout).await;
        Ok(response)
    }

    /// Whether the customer's catalog (or the given catalog) holds every run.
    ///
    /// Failures answer `false` and are not cached.
    pub async fn catalog_contains_course_runs(
        &self,
        site: &Site,
        course_run_ids: &[String],
        enterprise_customer_uuid: &Uuid,
        enterprise_customer_catalog_uuid: Option<&Uuid>,
    ) -> bool {
        let resource = match enterprise_customer_catalog_uuid {
            Some(catalog) => format!("enterprise_catalogs/{}", catalog),
            None => format!("enterprise-customer/{}", enterprise_customer_uuid),
        };
        let joined_runs = course_run_ids.join(",");
        // JSON keeps `["a", "b"]` and `["a,b"]` apart.
        let runs_component = Value::from(course_run_ids.to_vec()).to_string();
        let customer = enterprise_customer_uuid.to_string();
        let catalog = enterprise_customer_catalog_uuid.map(Uuid::to_string).unwrap_or_default();
        let key = get_cache_key(&[
            ("site_domain", site.domain.as_str()),
            ("partner_code", site.partner_code()),
            ("resource", resource.as_str()),
            ("course_run_ids", runs_component.as_str()),
            ("enterprise_customer_uuid", customer.as_str()),
            ("enterprise_customer_catalog_uuid", catalog.as_str()),
        ]);

        let cached = self.cache.get_cached_response(&key).await;
        if let Ok(value) = cached.value() {
            debug!(resource = %resource, "Catalog membership cache hit");
            return value.as_bool().unwrap_or(false);
        }

        let url = format!("{}/{}/contains_content_items/", site.enterprise_api_root(), resource);
        let query: Vec<(&str, String)> = course_run_ids
            .iter()
            .map(|run| ("course_run_ids", run.clone()))
            .collect();

        let contains = match self.get_once(site, &url, &query).await {
            Ok(body) => match body.get("contains_content_items").and_then(Value::as_bool) {
                Some(contains) => contains,
                None => {
                    error!(url = %url, "Catalog membership response has no contains_content_items");
                    return false;
                }
            },
            Err(e) => {
                error!(
                    "Failed to check if course_runs [{}] exist in catalog [{}]: {}",
                    joined_runs, resource, e
                );
                return false;
            }
        };

        self.cache.set_all_tiers(&key, Value::Bool(contains), self.cache_timeout).await;
        contains
    }

    /// GET through the backoff wrapper when the switch is on, directly otherwise.
    async fn get(
        &self,
        site: &Site,
        url: &str,
        query: &[(&str, String)],
        switches: &FeatureSwitches,
    ) -> Result<Value, EnterpriseError> {
        if switches.is_active(BACKOFF_FOR_API_CALLS_SWITCH) {
            self.backoff.retry(move || self.get_once(site, url, query)).await
        } else {
            self.get_once(site, url, query).await
        }
    }

    async fn get_once(
        &self,
        site: &Site,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Value, EnterpriseError> {
        let token = self.tokens.get_access_token(site).await?;
        let response = self.http
            .get(url)
            .query(query)
            .header(AUTHORIZATION, format!("JWT {}", token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnterpriseError::Status { status: status.as_u16(), url: url.to_string() });
        }

        let body = response.json::<Value>().await?;
        info!(url = %url, "Enterprise response received");
        Ok(body)
    }
}
