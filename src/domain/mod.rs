//! Core domain types and logic.

pub mod axis;
pub mod config_validation;
pub mod engine;
pub mod error;
pub mod frame;
pub mod label;
pub mod layout;
pub mod performance;
pub mod portfolio;
pub mod rolling;
pub mod selector;
pub mod window_fns;
