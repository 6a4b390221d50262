use std::sync::Arc;
use emporia_catalog::CourseRepository;
use emporia_core::payment::ProcessorRegistry;
use emporia_core::repository::SwitchRepository;
use emporia_core::FeatureSwitches;
use emporia_enterprise::EnterpriseApiClient;
use emporia_offer::{Applicator, BasketRepository};
use emporia_store::EventProducer;
use crate::metrics::ApiMetrics;
use crate::sites::SiteRegistry;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub courses: Arc<dyn CourseRepository>,
    pub baskets: Arc<dyn BasketRepository>,
    pub switch_repo: Arc<dyn SwitchRepository>,
    /// Configured switch values, overridden by the switch store.
    pub switch_defaults: FeatureSwitches,
    pub applicator: Arc<Applicator>,
    pub enterprise: Arc<EnterpriseApiClient>,
    pub processors: Arc<ProcessorRegistry>,
    pub sites: Arc<SiteRegistry>,
    /// `None` when no Kafka brokers are configured.
    pub kafka: Option<Arc<EventProducer>>,
    pub metrics: Arc<ApiMetrics>,
    pub auth: AuthConfig,
}
