pub mod backoff;
pub mod client;
pub mod error;
pub mod gateway;
pub mod token;

pub use backoff::Backoff;
pub use client::EnterpriseApiClient;
pub use error::EnterpriseError;
pub use gateway::{learner_customer_uuid, learner_ids};
pub use token::AccessTokenProvider;
