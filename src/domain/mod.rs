//! Core domain types and logic.

pub mod error;
pub mod panel;
pub mod operator;
pub mod operators;
pub mod expression;
pub mod expression_parser;
pub mod evaluator;
pub mod ranker;
pub mod signal;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod simulator;
pub mod backtest;
pub mod metrics;
pub mod config_validation;
