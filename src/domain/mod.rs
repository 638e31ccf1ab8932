//! Core domain types and logic.

pub mod error;
pub mod rank;
pub mod config;
pub mod config_validation;
pub mod calendar;
pub mod universe;
pub mod fundamentals;
pub mod factor;
pub mod prices;
pub mod fund_holdings;
pub mod beta;
pub mod weighting;
pub mod position;
pub mod risk;
pub mod pipeline;
pub mod engine;
