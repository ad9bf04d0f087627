pub mod backend;
pub mod config;
pub mod error;
pub mod listing;
pub mod onboarding;
pub mod session;
pub mod telemetry;
