//! HTTP handlers

pub mod cars;
pub mod health;
pub mod webhook;

pub use health::health;
