//! Core business logic for the survey service.

pub mod services;

pub use services::*;
