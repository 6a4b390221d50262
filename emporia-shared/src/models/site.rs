use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::pii::Masked;

/// A partner owns catalogue content and is identified by its short code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Partner {
    pub id: Uuid,
    pub short_code: String,
    pub name: String,
}

/// Per-site integration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfiguration {
    pub partner: Partner,
    pub enterprise_api_url: String,
    pub oauth2_provider_url: String,
    pub oauth2_client_id: String,
    pub oauth2_client_secret: Masked<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: Uuid,
    pub domain: String,
    pub configuration: SiteConfiguration,
}

impl Site {
    pub fn partner_code(&self) -> &str {
        &self.configuration.partner.short_code
    }

    /// Enterprise API root without a trailing slash.
    pub fn enterprise_api_root(&self) -> &str {
        self.configuration.enterprise_api_url.trim_end_matches('/')
    }

    pub fn oauth2_root(&self) -> &str {
        self.configuration.oauth2_provider_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_roots_drop_trailing_slash() {
        let site = Site {
            id: Uuid::new_v4(),
            domain: "shop.example.com".to_string(),
            configuration: SiteConfiguration {
                partner: Partner { id: Uuid::new_v4(), short_code: "edx".to_string(), name: "edX".to_string() },
                enterprise_api_url: "http://enterprise.local/api/v1/".to_string(),
                oauth2_provider_url: "http://lms.local/oauth2/".to_string(),
                oauth2_client_id: "ecommerce".to_string(),
                oauth2_client_secret: Masked::from("secret"),
            },
        };

        assert_eq!(site.enterprise_api_root(), "http://enterprise.local/api/v1");
        assert_eq!(site.oauth2_root(), "http://lms.local/oauth2");
        assert_eq!(site.partner_code(), "edx");
    }
}
