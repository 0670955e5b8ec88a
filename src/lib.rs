pub mod chord;
pub mod complete;
pub mod config;
pub mod cue;
pub mod event;
pub mod icon;
pub mod notify;
pub mod paste;
pub mod pipeline;
pub mod record;
pub mod session;
pub mod transcribe;

/// Application name
pub const APP_NAME: &str = "sotto";

/// Pretty application name for display
pub const APP_NAME_PRETTY: &str = "Sotto";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Version from this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
