//! Request extractors

pub mod bind;

pub use bind::Bind;
