//! Configuration Module
//!
//! Environment-driven configuration for the server and client binaries.

mod settings;

pub use settings::{
    ClientConfig, ConfigError, DEFAULT_LISTEN_ADDR, DEFAULT_LOCATIONS, DEFAULT_SERVER_URL,
    ServerConfig, parse_locations,
};

/// Load .env file from current or ancestor directories.
pub fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Load .env file from any ancestor of the current directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}
