pub mod app_config;
pub mod basket_repo;
pub mod cache;
pub mod course_repo;
pub mod database;
pub mod events;
pub mod offer_repo;
pub mod redis_repo;
pub mod switch_repo;

pub use app_config::Config;
pub use basket_repo::PostgresBasketRepository;
pub use cache::{
    CacheError, CachedResponse, CachedResponseError, InMemorySharedCache, RequestCache,
    SharedCache, TieredCache,
};
pub use course_repo::PostgresCourseRepository;
pub use database::DbClient;
pub use events::{EventError, EventProducer};
pub use offer_repo::PostgresOfferRepository;
pub use redis_repo::RedisClient;
pub use switch_repo::PostgresSwitchRepository;
