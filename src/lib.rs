pub mod config;
pub mod display;
pub mod error;
pub mod hooks;
pub mod monitor;
pub mod notifier;
pub mod platform;
pub mod shutdown;
pub mod workspace;
