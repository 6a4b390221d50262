use std::sync::Arc;
use std::net::SocketAddr;
use std::time::Duration;
use emporia_api::{app, metrics::ApiMetrics, sites::SiteRegistry, state::{AppState, AuthConfig}};
use emporia_core::payment::{HostedPageProcessor, ProcessorRegistry};
use emporia_core::FeatureSwitches;
use emporia_enterprise::EnterpriseApiClient;
use emporia_offer::{Applicator, EnterpriseGateway};
use emporia_store::{
    PostgresBasketRepository, PostgresCourseRepository, PostgresOfferRepository,
    PostgresSwitchRepository, RequestCache, TieredCache,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emporia_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = emporia_store::Config::load().expect("Failed to load config");
    tracing::info!("Starting Emporia API on port {}", config.server.port);

    // Postgres
    let db = emporia_store::DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .expect("Failed to connect to Postgres");
    db.ping().await.expect("Postgres is not answering");
    db.migrate().await.expect("Failed to run migrations");

    // Redis is the shared cache tier
    let redis_client = emporia_store::RedisClient::new(&config.redis.url, &config.cache.namespace)
        .await
        .expect("Invalid Redis configuration");
    redis_client.ping().await.expect("Failed to connect to Redis");
    let cache = TieredCache::new(
        RequestCache::new(
            config.cache.local_max_capacity,
            Duration::from_secs(config.cache.local_ttl_seconds),
        ),
        Arc::new(redis_client),
    );

    // Kafka is optional
    let kafka = config.kafka.brokers.as_deref().map(|brokers| {
        let producer = emporia_store::EventProducer::new(brokers, &config.kafka.basket_topic)
            .expect("Failed to create Kafka producer");
        Arc::new(producer)
    });
    if kafka.is_none() {
        tracing::info!("Kafka brokers not configured, basket events disabled");
    }

    let enterprise = Arc::new(
        EnterpriseApiClient::new(&config.enterprise, cache).expect("Failed to build enterprise client"),
    );

    let offers = Arc::new(PostgresOfferRepository { pool: db.pool.clone() });
    let gateway: Arc<dyn EnterpriseGateway> = enterprise.clone();
    let applicator = Arc::new(Applicator::from_repository(offers, Some(gateway)));

    let mut processors = ProcessorRegistry::new();
    for settings in &config.payment.processors {
        processors.register(Arc::new(HostedPageProcessor::new(
            &settings.name,
            &settings.payment_page_url,
            &settings.merchant_id,
        )));
    }

    let sites = SiteRegistry::new(config.sites());
    if sites.is_empty() {
        tracing::warn!("No sites configured, /v1 routes will be unavailable");
    }

    let app_state = AppState {
        courses: Arc::new(PostgresCourseRepository { pool: db.pool.clone() }),
        baskets: Arc::new(PostgresBasketRepository { pool: db.pool.clone() }),
        switch_repo: Arc::new(PostgresSwitchRepository { pool: db.pool.clone() }),
        switch_defaults: FeatureSwitches::from_defaults(&config.switches),
        applicator,
        enterprise,
        processors: Arc::new(processors),
        sites: Arc::new(sites),
        kafka,
        metrics: Arc::new(ApiMetrics::new().expect("Failed to register metrics")),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.expect("Failed to bind");
    axum::serve(listener, app).await.expect("Server error");
}
