pub mod backtest;
pub mod core;
pub mod dashboard;
pub mod exchange;
pub mod llm;
pub mod observability;
pub mod persistence;
pub mod spoofing;
