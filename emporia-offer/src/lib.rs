pub mod applicator;
pub mod basket;
pub mod expiry;
pub mod models;
pub mod sources;

pub use applicator::{merge_offers, Applicator};
pub use basket::{
    Basket, BasketRepository, BasketStatus, InMemoryBasketRepository, Line, OfferApplication,
    Voucher, VoucherUsage,
};
pub use expiry::InMemoryOfferRepository;
pub use models::{Benefit, Condition, Offer, OfferScope, OfferStatus, UserCondition};
pub use sources::{
    BasketOfferSource, EnterpriseGateway, OfferContext, OfferRepository, OfferSource,
    Session, SessionOfferSource, SiteOfferSource, UserOfferSource,
};

#[derive(Debug, thiserror::Error)]
pub enum OfferError {
    #[error("Offer storage failed: {0}")]
    Storage(String),

    #[error("Enterprise lookup failed: {0}")]
    Enterprise(String),

    #[error("Basket [{basket_id}] is {status} and cannot be modified")]
    InvalidBasketState { basket_id: uuid::Uuid, status: String },
}
