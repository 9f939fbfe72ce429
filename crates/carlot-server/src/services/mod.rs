//! Business logic services

pub mod car_catalog;
pub mod channel_token;

pub use car_catalog::CarCatalog;
pub use channel_token::{ChannelTokenService, TokenSettings};
