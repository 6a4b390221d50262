pub mod cache_key;
pub mod models;
pub mod pii;

pub use cache_key::get_cache_key;
pub use models::site::{Partner, Site, SiteConfiguration};
pub use models::user::User;
pub use pii::Masked;
