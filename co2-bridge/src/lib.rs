pub mod api;
pub mod bridge;
pub mod config;
pub mod reader;
pub mod store;

pub use bridge::{BridgeError, run, supervise};
pub use config::{Config, ConfigError, SerialConfig, ServerConfig};
pub use reader::{ReaderError, ReaderOptions, run_reader, run_session};
pub use store::ReadingStore;
