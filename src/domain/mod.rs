//! Domain models for Mailgate Core

pub mod email;

pub use email::*;
