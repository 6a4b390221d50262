use async_trait::async_trait;
use sqlx::PgPool;
use emporia_core::repository::SwitchRepository;
use emporia_core::FeatureSwitches;

/// Reads switch state from the `switches` table.
pub struct PostgresSwitchRepository {
    pub pool: PgPool,
}

#[async_trait]
impl SwitchRepository for PostgresSwitchRepository {
    async fn load_switches(
        &self,
    ) -> Result<FeatureSwitches, Box<dyn std::error::Error + Send + Sync>> {
        let rows: Vec<(String, bool)> = sqlx::query_as("SELECT name, active FROM switches")
            .fetch_all(&self.pool)
            .await?;

        let mut switches = FeatureSwitches::new();
        for (name, active) in rows {
            switches.set(&name, active);
        }
        Ok(switches)
    }
}
