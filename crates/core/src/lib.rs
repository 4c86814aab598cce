//! Shared configuration and dynamic parameter resolution for ponghub.
//!
//! This crate provides:
//! - YAML configuration types for monitored services and notifications
//! - `ParameterResolver` for `{{...}}` tokens (env, uuid, rand, date)
//! - Load-time resolution of endpoint fields and notification defaults

pub mod config;
pub mod error;
pub mod notification;
pub mod params;

pub use config::Config;
pub use error::*;
pub use notification::*;
pub use params::{resolve_parameters, ParameterResolver};
