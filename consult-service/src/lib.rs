pub mod config;
pub mod service;
pub mod telemetry;

pub use config::ServiceConfig;
pub use service::{AppState, build_router, create_app};
