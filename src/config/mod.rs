pub mod loader;
pub mod types;

pub use loader::ConfigError;
pub use types::{default_socket_path, Config, ResourceConfig, RpcConfig, TransportConfig};
