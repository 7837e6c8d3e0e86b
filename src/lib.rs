pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::engine::{AnalysisJob, AnalysisReport, AnalyticsEngine};
pub use config::EngineConfig;
