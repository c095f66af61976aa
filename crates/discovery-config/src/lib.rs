pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{Config, DiscoveryOptions, LoggingConfig, ResumeMode, TmdbConfig, TOKEN_ENV_VAR};
pub use credentials::CredentialStore;
pub use paths::{PathManager, container_base_path};
