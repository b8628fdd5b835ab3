pub mod backtester;
pub mod commands;
pub mod config;
pub mod context;
pub mod execution;
pub mod models;
pub mod performance;
pub mod plan;
pub mod polygon;
pub mod providers;
pub mod report;
mod retry;
pub mod snapshot;
pub mod synthetic;
pub mod visualization;
