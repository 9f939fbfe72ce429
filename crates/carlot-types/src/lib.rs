//! Carlot Types - Pure type definitions
//!
//! This crate contains only plain data types shared between the server and
//! anything that talks to it. No async runtime, no storage.

pub mod car;
pub mod token;

pub use car::*;
pub use token::*;
