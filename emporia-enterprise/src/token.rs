use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use emporia_shared::{get_cache_key, Site};
use emporia_store::TieredCache;
use crate::error::EnterpriseError;

/// Tokens are dropped from the cache this long before they expire.
pub const TOKEN_EXPIRY_MARGIN_SECONDS: u64 = 300;

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Client-credentials JWTs from the site's OAuth2 provider, cached per client.
#[derive(Clone)]
pub struct AccessTokenProvider {
    http: reqwest::Client,
    cache: TieredCache,
}

impl AccessTokenProvider {
    pub fn new(http: reqwest::Client, cache: TieredCache) -> Self {
        Self { http, cache }
    }

    pub fn cache_key(site: &Site) -> String {
        get_cache_key(&[
            ("site_domain", site.domain.as_str()),
            ("resource", "oauth2_access_token"),
            ("client_id", site.configuration.oauth2_client_id.as_str()),
        ])
    }

    pub async fn get_access_token(&self, site: &Site) -> Result<String, EnterpriseError> {
        let key = Self::cache_key(site);
        let cached = self.cache.get_cached_response(&key).await;
        if let Ok(Value::String(token)) = cached.value() {
            debug!(site = %site.domain, "Using cached access token");
            return Ok(token.clone());
        }

        let url = format!("{}/access_token", site.oauth2_root());
        let config = &site.configuration;
        let response = self.http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", config.oauth2_client_id.as_str()),
                ("client_secret", config.oauth2_client_secret.expose().as_str()),
                ("token_type", "jwt"),
            ])
            .send()
            .await
            .map_err(|e| EnterpriseError::Token(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnterpriseError::Token(format!("{} returned {}", url, status)));
        }

        let body: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| EnterpriseError::Token(e.to_string()))?;

        let ttl = body.expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN_SECONDS).max(1);
        self.cache
            .set_all_tiers(&key, Value::String(body.access_token.clone()), Duration::from_secs(ttl))
            .await;
        info!(site = %site.domain, ttl_seconds = ttl, "Fetched new access token");

        Ok(body.access_token)
    }
}
