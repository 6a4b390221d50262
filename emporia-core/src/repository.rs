use async_trait::async_trait;
use crate::switches::FeatureSwitches;

/// Source of persisted switch state, consulted once per request.
#[async_trait]
pub trait SwitchRepository: Send + Sync {
    async fn load_switches(
        &self,
    ) -> Result<FeatureSwitches, Box<dyn std::error::Error + Send + Sync>>;
}

/// Fixed switch set, used when no flag store is configured.
pub struct StaticSwitchRepository {
    switches: FeatureSwitches,
}

impl StaticSwitchRepository {
    pub fn new(switches: FeatureSwitches) -> Self {
        Self { switches }
    }
}

#[async_trait]
impl SwitchRepository for StaticSwitchRepository {
    async fn load_switches(
        &self,
    ) -> Result<FeatureSwitches, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.switches.clone())
    }
}
