pub mod events;
pub mod site;
pub mod user;
