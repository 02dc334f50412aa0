mod app;
mod config;
mod sink;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use sink::SinkError;
